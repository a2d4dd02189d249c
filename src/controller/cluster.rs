//! CondorCluster reconciliation
//!
//! A pass moves a record through config, network and workload in that order:
//! 1. the `<name>-entrypoint` ConfigMap with the three role scripts
//! 2. the headless Service pods resolve each other through
//! 3. the JobSet running every role
//!
//! Each step is create-if-missing. A failing step aborts the pass; steps that
//! already succeeded are found again on the next pass.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::CondorCluster;
use crate::jobset::JobSet;
use crate::store::{ensure, KubeStore, ObjectStore};
use crate::template::ScriptEngine;
use crate::workload::{
    build_config_map, build_headless_service, build_jobset, entrypoint_volume_name,
    EXECUTE_REPLICA_POLICY,
};
use crate::Error;

/// Default delay before re-checking a record after creating something
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(5);

/// Default periodic resync once everything exists
pub const DEFAULT_RESYNC: Duration = Duration::from_secs(300);

/// Default retry delay after a transient error
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Controller context shared by every reconcile pass
pub struct Context {
    /// Entrypoint script renderer
    pub engine: Arc<ScriptEngine>,
    /// ConfigMap access (entrypoint scripts)
    pub config_maps: Arc<dyn ObjectStore<ConfigMap>>,
    /// Service access (headless pool service)
    pub services: Arc<dyn ObjectStore<Service>>,
    /// JobSet access (pool workload)
    pub jobsets: Arc<dyn ObjectStore<JobSet>>,
    /// Requeue delay when a pass created something
    pub requeue_after: Duration,
    /// Requeue delay when a pass found everything in place
    pub resync_after: Duration,
    /// Requeue delay after a transient error
    pub error_requeue_after: Duration,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing over explicit stores
    #[cfg(test)]
    pub fn for_testing(
        config_maps: Arc<dyn ObjectStore<ConfigMap>>,
        services: Arc<dyn ObjectStore<Service>>,
        jobsets: Arc<dyn ObjectStore<JobSet>>,
    ) -> Self {
        Self {
            engine: Arc::new(ScriptEngine::new().expect("embedded scripts parse")),
            config_maps,
            services,
            jobsets,
            requeue_after: DEFAULT_REQUEUE,
            resync_after: DEFAULT_RESYNC,
            error_requeue_after: DEFAULT_ERROR_REQUEUE,
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .resync_after(Duration::from_secs(60))
///     .build()?;
/// ```
pub struct ContextBuilder {
    client: Client,
    config_maps: Option<Arc<dyn ObjectStore<ConfigMap>>>,
    services: Option<Arc<dyn ObjectStore<Service>>>,
    jobsets: Option<Arc<dyn ObjectStore<JobSet>>>,
    requeue_after: Duration,
    resync_after: Duration,
    error_requeue_after: Duration,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            config_maps: None,
            services: None,
            jobsets: None,
            requeue_after: DEFAULT_REQUEUE,
            resync_after: DEFAULT_RESYNC,
            error_requeue_after: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Delay before re-checking after a pass that created something
    pub fn requeue_after(mut self, delay: Duration) -> Self {
        self.requeue_after = delay;
        self
    }

    /// Periodic resync delay once everything exists
    pub fn resync_after(mut self, delay: Duration) -> Self {
        self.resync_after = delay;
        self
    }

    /// Retry delay after a transient error
    pub fn error_requeue_after(mut self, delay: Duration) -> Self {
        self.error_requeue_after = delay;
        self
    }

    /// Override ConfigMap access (primarily for testing)
    pub fn config_maps(mut self, store: Arc<dyn ObjectStore<ConfigMap>>) -> Self {
        self.config_maps = Some(store);
        self
    }

    /// Override Service access (primarily for testing)
    pub fn services(mut self, store: Arc<dyn ObjectStore<Service>>) -> Self {
        self.services = Some(store);
        self
    }

    /// Override JobSet access (primarily for testing)
    pub fn jobsets(mut self, store: Arc<dyn ObjectStore<JobSet>>) -> Self {
        self.jobsets = Some(store);
        self
    }

    /// Build the Context, loading the script library
    pub fn build(self) -> Result<Context, Error> {
        Ok(Context {
            engine: Arc::new(ScriptEngine::new()?),
            config_maps: self
                .config_maps
                .unwrap_or_else(|| Arc::new(KubeStore::<ConfigMap>::new(self.client.clone()))),
            services: self
                .services
                .unwrap_or_else(|| Arc::new(KubeStore::<Service>::new(self.client.clone()))),
            jobsets: self
                .jobsets
                .unwrap_or_else(|| Arc::new(KubeStore::<JobSet>::new(self.client.clone()))),
            requeue_after: self.requeue_after,
            resync_after: self.resync_after,
            error_requeue_after: self.error_requeue_after,
        })
    }
}

/// Entrypoint ConfigMap with the rendered manager, submit and execute scripts
pub fn build_entrypoint_config_map(
    engine: &ScriptEngine,
    cluster: &CondorCluster,
) -> Result<ConfigMap, Error> {
    let data = engine.render_entrypoints(cluster)?;
    build_config_map(cluster, &entrypoint_volume_name(cluster), data)
}

/// Reconcile a CondorCluster resource
///
/// Returns a short requeue when this pass created anything, otherwise the
/// periodic resync.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<CondorCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling cluster");

    let cluster = cluster.defaulted();
    if let Err(e) = cluster.spec.validate() {
        warn!(error = %e, "cluster validation failed");
        return Err(e);
    }

    let namespace = cluster.namespace().ok_or(Error::MissingNamespace)?;
    let name = cluster.name_any();
    let mut created = false;

    // Config
    let entrypoint = entrypoint_volume_name(&cluster);
    let config = ensure(ctx.config_maps.as_ref(), &namespace, &entrypoint, || {
        build_entrypoint_config_map(&ctx.engine, &cluster)
    })
    .await?;
    created |= config.created;

    // Network
    ensure(
        ctx.services.as_ref(),
        &namespace,
        &cluster.spec.service_name,
        || build_headless_service(&cluster),
    )
    .await?;

    // Workload
    let workload = ensure(ctx.jobsets.as_ref(), &namespace, &name, || {
        build_jobset(&cluster, EXECUTE_REPLICA_POLICY)
    })
    .await?;
    created |= workload.created;

    if created {
        debug!("created derived objects, requeueing");
        Ok(Action::requeue(ctx.requeue_after))
    } else {
        debug!("all derived objects present");
        Ok(Action::requeue(ctx.resync_after))
    }
}

/// Error policy for the controller
///
/// Record and script defects wait for the record to change; everything else
/// is retried after `error_requeue_after`.
pub fn error_policy(cluster: Arc<CondorCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        cluster = %cluster.name_any(),
        namespace = %cluster.namespace().unwrap_or_default(),
        permanent = error.is_permanent(),
        "reconciliation failed"
    );

    if error.is_permanent() {
        Action::await_change()
    } else {
        Action::requeue(ctx.error_requeue_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use crate::crd::CondorClusterSpec;
    use crate::store::testing::{api_error, Journal, MemoryStore};
    use crate::store::MockObjectStore;

    fn sample_cluster(name: &str, size: i32) -> CondorCluster {
        let mut cluster = CondorCluster::new(
            name,
            CondorClusterSpec {
                size,
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("ns".to_string());
        cluster.metadata.uid = Some(format!("{name}-uid"));
        cluster
    }

    struct Stores {
        config_maps: Arc<MemoryStore<ConfigMap>>,
        services: Arc<MemoryStore<Service>>,
        jobsets: Arc<MemoryStore<JobSet>>,
        journal: Journal,
    }

    fn memory_context() -> (Arc<Context>, Stores) {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let stores = Stores {
            config_maps: Arc::new(MemoryStore::journaled(journal.clone())),
            services: Arc::new(MemoryStore::journaled(journal.clone())),
            jobsets: Arc::new(MemoryStore::journaled(journal.clone())),
            journal,
        };
        let ctx = Context::for_testing(
            stores.config_maps.clone(),
            stores.services.clone(),
            stores.jobsets.clone(),
        );
        (Arc::new(ctx), stores)
    }

    // =========================================================================
    // Lifecycle Flow Stories
    // =========================================================================

    /// Story: a new record gets its scripts, its network and its workload,
    /// in that order, and the reconciler asks to look again soon
    #[tokio::test]
    async fn story_new_cluster_materializes_config_network_workload() {
        let mut cluster = sample_cluster("c1", 3);
        cluster
            .spec
            .execute
            .environment
            .insert("FOO".to_string(), "bar".to_string());
        let (ctx, stores) = memory_context();

        let action = reconcile(Arc::new(cluster), ctx)
            .await
            .expect("reconcile should succeed");

        assert_eq!(action, Action::requeue(DEFAULT_REQUEUE));
        assert_eq!(
            *stores.journal.lock().unwrap(),
            vec![
                "ConfigMap/c1-entrypoint".to_string(),
                format!("Service/{}", crate::DEFAULT_SERVICE_NAME),
                "JobSet/c1".to_string(),
            ]
        );

        let config = stores.config_maps.get("ns", "c1-entrypoint").unwrap();
        let keys: Vec<_> = config.data.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["start-execute", "start-manager", "start-submit"]);

        let jobset = stores.jobsets.get("ns", "c1").unwrap();
        let roles: BTreeMap<_, _> = jobset
            .spec
            .replicated_jobs
            .iter()
            .map(|rj| (rj.name.clone(), rj))
            .collect();
        assert_eq!(roles.len(), 3);

        let parallelism = |role: &str| {
            roles[role]
                .template
                .spec
                .as_ref()
                .and_then(|spec| spec.parallelism)
        };
        assert_eq!(parallelism("manager"), Some(1));
        assert_eq!(parallelism("submit"), Some(1));
        assert_eq!(parallelism("execute"), Some(3));

        let execute_pod = roles["execute"]
            .template
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .unwrap();
        for container in &execute_pod.containers {
            let env = container.env.as_ref().unwrap();
            assert!(env
                .iter()
                .any(|var| var.name == "FOO" && var.value.as_deref() == Some("bar")));
        }

        let manager_pod = roles["manager"]
            .template
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .unwrap();
        assert_eq!(
            manager_pod.containers[0].image.as_deref(),
            Some(crate::DEFAULT_MANAGER_IMAGE)
        );
    }

    /// Story: once everything exists, a pass creates nothing and settles
    /// into the periodic resync
    #[tokio::test]
    async fn story_converged_cluster_resyncs_without_creating() {
        let cluster = Arc::new(sample_cluster("c1", 2));
        let (ctx, stores) = memory_context();

        reconcile(cluster.clone(), ctx.clone()).await.unwrap();
        let action = reconcile(cluster, ctx).await.unwrap();

        assert_eq!(action, Action::requeue(DEFAULT_RESYNC));
        assert_eq!(stores.journal.lock().unwrap().len(), 3);
        assert_eq!(stores.config_maps.len(), 1);
        assert_eq!(stores.services.len(), 1);
        assert_eq!(stores.jobsets.len(), 1);
    }

    /// Story: a record edited after creation does not change existing objects
    #[tokio::test]
    async fn story_spec_changes_do_not_touch_existing_objects() {
        let (ctx, stores) = memory_context();
        reconcile(Arc::new(sample_cluster("c1", 2)), ctx.clone())
            .await
            .unwrap();

        let action = reconcile(Arc::new(sample_cluster("c1", 8)), ctx)
            .await
            .unwrap();
        assert_eq!(action, Action::requeue(DEFAULT_RESYNC));

        let jobset = stores.jobsets.get("ns", "c1").unwrap();
        let execute = jobset
            .spec
            .replicated_jobs
            .iter()
            .find(|rj| rj.name == "execute")
            .unwrap();
        assert_eq!(
            execute.template.spec.as_ref().unwrap().completions,
            Some(2)
        );
    }

    #[tokio::test]
    async fn service_creation_alone_resyncs() {
        let (ctx, stores) = memory_context();
        let cluster = sample_cluster("c1", 1).defaulted();
        stores
            .config_maps
            .create("ns", &build_entrypoint_config_map(&ctx.engine, &cluster).unwrap())
            .await
            .unwrap();
        stores
            .jobsets
            .create("ns", &build_jobset(&cluster, EXECUTE_REPLICA_POLICY).unwrap())
            .await
            .unwrap();

        let action = reconcile(Arc::new(cluster), ctx).await.unwrap();
        assert_eq!(action, Action::requeue(DEFAULT_RESYNC));
        assert_eq!(stores.services.len(), 1);
    }

    // =========================================================================
    // Error Propagation Stories
    // =========================================================================

    /// Story: a failing network lookup aborts the pass before the workload
    #[tokio::test]
    async fn story_service_lookup_failure_aborts_pass() {
        let config_maps = Arc::new(MemoryStore::<ConfigMap>::new());
        let mut services = MockObjectStore::<Service>::new();
        services
            .expect_get_opt()
            .returning(|_, _| Err(api_error(500, "InternalError")));
        let mut jobsets = MockObjectStore::<JobSet>::new();
        jobsets.expect_get_opt().never();
        jobsets.expect_create().never();

        let ctx = Arc::new(Context::for_testing(
            config_maps.clone(),
            Arc::new(services),
            Arc::new(jobsets),
        ));

        let err = reconcile(Arc::new(sample_cluster("c1", 2)), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Kube(_)));
        // Config step already succeeded and is found again next pass
        assert_eq!(config_maps.len(), 1);
    }

    #[tokio::test]
    async fn invalid_size_fails_before_any_lookup() {
        let mut config_maps = MockObjectStore::<ConfigMap>::new();
        config_maps.expect_get_opt().never();
        let ctx = Arc::new(Context::for_testing(
            Arc::new(config_maps),
            Arc::new(MockObjectStore::<Service>::new()),
            Arc::new(MockObjectStore::<JobSet>::new()),
        ));

        let err = reconcile(Arc::new(sample_cluster("c1", 0)), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn malformed_quantity_fails_workload_step() {
        let mut cluster = sample_cluster("c1", 2);
        cluster.spec.execute.resources.limits.insert(
            "memory".to_string(),
            k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::String("1Qi".to_string()),
        );
        let (ctx, stores) = memory_context();

        let err = reconcile(Arc::new(cluster), ctx).await.unwrap_err();
        assert!(matches!(err, Error::Quantity { .. }));
        assert_eq!(stores.jobsets.len(), 0);
        assert_eq!(stores.services.len(), 1);
    }

    // =========================================================================
    // Error Policy
    // =========================================================================

    #[test]
    fn permanent_errors_wait_for_a_change() {
        let (ctx, _) = memory_context();
        let action = error_policy(
            Arc::new(sample_cluster("c1", 0)),
            &Error::validation("size must be at least 1"),
            ctx,
        );
        assert_eq!(action, Action::await_change());
    }

    #[test]
    fn transient_errors_requeue_after_error_delay() {
        let (ctx, _) = memory_context();
        let action = error_policy(
            Arc::new(sample_cluster("c1", 2)),
            &Error::Kube(api_error(503, "ServiceUnavailable")),
            ctx,
        );
        assert_eq!(action, Action::requeue(DEFAULT_ERROR_REQUEUE));
    }
}
