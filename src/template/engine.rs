//! Script engine over the embedded fragment library
//!
//! Every script the operator ships is compiled into the binary. Role scripts
//! live at the top level and pull shared pieces from `fragments/` with
//! `{% include %}`. The library is fixed at build time; rendering only ever
//! varies by the [`ScriptContext`].

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use tracing::debug;

use super::context::ScriptContext;
use super::error::TemplateError;
use crate::crd::CondorCluster;
use crate::Error;

/// Static fragment library: (template name, source)
pub const FRAGMENTS: &[(&str, &str)] = &[
    ("start-manager.sh", include_str!("scripts/manager.sh")),
    ("start-submit.sh", include_str!("scripts/submit.sh")),
    ("start-execute.sh", include_str!("scripts/execute.sh")),
    ("token-generate.sh", include_str!("scripts/token.sh")),
    ("fragments/init.sh", include_str!("scripts/fragments/init.sh")),
    ("fragments/hosts.sh", include_str!("scripts/fragments/hosts.sh")),
    ("fragments/password.sh", include_str!("scripts/fragments/password.sh")),
    ("fragments/config.sh", include_str!("scripts/fragments/config.sh")),
    ("fragments/wait.sh", include_str!("scripts/fragments/wait.sh")),
];

/// A renderable top-level script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Script {
    /// Central manager entrypoint
    Manager,
    /// Submit node entrypoint
    Submit,
    /// Execute node entrypoint
    Execute,
    /// One-shot pool token generator
    Token,
}

impl Script {
    /// The three role entrypoints stored in the entrypoint ConfigMap
    pub const ENTRYPOINTS: [Script; 3] = [Script::Manager, Script::Execute, Script::Submit];

    /// Name of the script in the fragment library (also its file name when mounted)
    pub fn template_name(self) -> &'static str {
        match self {
            Script::Manager => "start-manager.sh",
            Script::Submit => "start-submit.sh",
            Script::Execute => "start-execute.sh",
            Script::Token => "token-generate.sh",
        }
    }

    /// ConfigMap data key the rendered script is stored under
    pub fn config_key(self) -> &'static str {
        match self {
            Script::Manager => "start-manager",
            Script::Submit => "start-submit",
            Script::Execute => "start-execute",
            Script::Token => "token-generate",
        }
    }
}

/// Renders entrypoint scripts from the embedded library
pub struct ScriptEngine {
    env: Environment<'static>,
}

impl ScriptEngine {
    /// Load the fragment library.
    ///
    /// Fails only if an embedded script does not parse.
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        for &(name, source) in FRAGMENTS {
            env.add_template(name, source).map_err(TemplateError::from)?;
        }

        Ok(Self { env })
    }

    /// Render exactly one top-level script
    pub fn render(&self, script: Script, ctx: &ScriptContext) -> Result<String, Error> {
        let template = self
            .env
            .get_template(script.template_name())
            .map_err(TemplateError::from)?;
        let rendered = template.render(ctx).map_err(TemplateError::from)?;
        debug!(
            script = script.template_name(),
            cluster = %ctx.cluster_name,
            bytes = rendered.len(),
            "rendered script"
        );
        Ok(rendered)
    }

    /// Render the three role entrypoints of a defaulted cluster, keyed by ConfigMap key
    pub fn render_entrypoints(
        &self,
        cluster: &CondorCluster,
    ) -> Result<BTreeMap<String, String>, Error> {
        let mut data = BTreeMap::new();
        for script in Script::ENTRYPOINTS {
            let node = match script {
                Script::Manager | Script::Token => &cluster.spec.manager,
                Script::Submit => &cluster.spec.submit,
                Script::Execute => &cluster.spec.execute,
            };
            let ctx = ScriptContext::for_node(cluster, node)?;
            data.insert(script.config_key().to_string(), self.render(script, &ctx)?);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CondorClusterSpec;

    fn cluster(spec: CondorClusterSpec) -> CondorCluster {
        let mut cluster = CondorCluster::new("c1", spec);
        cluster.metadata.namespace = Some("ns".to_string());
        cluster.defaulted()
    }

    fn sized(size: i32) -> CondorClusterSpec {
        CondorClusterSpec {
            size,
            ..Default::default()
        }
    }

    fn render(script: Script, cluster: &CondorCluster) -> String {
        let engine = ScriptEngine::new().unwrap();
        let node = match script {
            Script::Submit => &cluster.spec.submit,
            Script::Execute => &cluster.spec.execute,
            _ => &cluster.spec.manager,
        };
        let ctx = ScriptContext::for_node(cluster, node).unwrap();
        engine.render(script, &ctx).unwrap()
    }

    // =========================================================================
    // Story: Library Loading
    // =========================================================================

    #[test]
    fn every_fragment_parses() {
        assert!(ScriptEngine::new().is_ok());
    }

    #[test]
    fn every_script_names_a_library_entry() {
        for script in [Script::Manager, Script::Submit, Script::Execute, Script::Token] {
            assert!(FRAGMENTS
                .iter()
                .any(|(name, _)| *name == script.template_name()));
        }
    }

    // =========================================================================
    // Story: Role Scripts
    // =========================================================================

    /// Story: every member finds the manager through the headless service
    #[test]
    fn story_scripts_point_at_manager_hostname() {
        let cluster = cluster(sized(3));
        for script in Script::ENTRYPOINTS {
            let out = render(script, &cluster);
            assert!(out.contains("export CONDOR_SERVICE=\"htc-service.ns.svc.cluster.local\""));
            assert!(out.contains("export CONDOR_HOST=\"c1-manager-0-0.${CONDOR_SERVICE}\""));
            assert!(out.contains("condor_store_cred -p \"password\""));
        }
    }

    #[test]
    fn roles_start_their_own_daemons() {
        let cluster = cluster(sized(3));
        assert!(render(Script::Manager, &cluster).contains("MASTER, COLLECTOR, NEGOTIATOR"));
        assert!(render(Script::Submit, &cluster).contains("MASTER, SCHEDD"));
        assert!(render(Script::Execute, &cluster).contains("MASTER, STARTD"));
    }

    #[test]
    fn workers_wait_for_manager_but_manager_does_not() {
        let cluster = cluster(sized(3));
        assert!(render(Script::Execute, &cluster).contains("getent hosts"));
        assert!(render(Script::Submit, &cluster).contains("getent hosts"));
        assert!(!render(Script::Manager, &cluster).contains("getent hosts"));
    }

    /// Story: an interactive pool keeps the manager alive after its command
    #[test]
    fn story_interactive_pool_sleeps_after_command() {
        let batch = render(Script::Manager, &cluster(sized(1)));
        assert!(!batch.contains("sleep infinity"));

        let interactive = render(
            Script::Manager,
            &cluster(CondorClusterSpec {
                interactive: true,
                ..sized(1)
            }),
        );
        assert!(interactive.contains("sleep infinity"));
    }

    #[test]
    fn init_hook_runs_only_when_set() {
        let mut spec = sized(2);
        spec.execute.commands.init = "yum install -y git".to_string();
        let cluster = cluster(spec);

        assert!(render(Script::Execute, &cluster).contains("yum install -y git"));
        assert!(!render(Script::Manager, &cluster).contains("Init hook"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let cluster = cluster(sized(4));
        assert_eq!(
            render(Script::Manager, &cluster),
            render(Script::Manager, &cluster)
        );
    }

    #[test]
    fn token_script_prints_marker_before_token() {
        let out = render(Script::Token, &cluster(sized(1)));
        let marker = out.find(crate::bootstrap::TOKEN_MARKER).unwrap();
        let token = out.find("echo \"${TOKEN}\"").unwrap();
        assert!(marker < token);
    }

    #[test]
    fn entrypoints_are_keyed_by_config_key() {
        let engine = ScriptEngine::new().unwrap();
        let data = engine.render_entrypoints(&cluster(sized(2))).unwrap();
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["start-execute", "start-manager", "start-submit"]);
    }
}
