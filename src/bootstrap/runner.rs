//! Token helper ConfigMap and Pod

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, KeyToPath, LocalObjectReference, Pod, PodSpec,
    Volume, VolumeMount,
};
use kube::ResourceExt;

use crate::crd::CondorCluster;
use crate::template::{Script, ScriptContext, ScriptEngine};
use crate::workload::{build_config_map, owned_metadata};
use crate::{Error, SCRIPT_MOUNT_PATH, TOKEN_SUFFIX};

/// Container name the token is read from
pub const TOKEN_CONTAINER: &str = "token-generator";

/// Name shared by the token ConfigMap, its volume and the helper Pod
pub fn token_object_name(cluster: &CondorCluster) -> String {
    format!("{}{}", cluster.name_any(), TOKEN_SUFFIX)
}

/// ConfigMap holding the token script rendered for the manager node
pub fn build_token_config_map(
    engine: &ScriptEngine,
    cluster: &CondorCluster,
) -> Result<ConfigMap, Error> {
    let ctx = ScriptContext::for_node(cluster, &cluster.spec.manager)?;
    let script = engine.render(Script::Token, &ctx)?;
    let data = BTreeMap::from([(Script::Token.config_key().to_string(), script)]);
    build_config_map(cluster, &token_object_name(cluster), data)
}

/// One-shot Pod running the token script on the manager image
pub fn build_token_pod(cluster: &CondorCluster) -> Result<Pod, Error> {
    let node = &cluster.spec.manager;
    let name = token_object_name(cluster);
    let script = Script::Token;

    let container = Container {
        name: TOKEN_CONTAINER.to_string(),
        image: Some(node.image.clone()),
        image_pull_policy: Some(if node.pull_always { "Always" } else { "IfNotPresent" }.to_string()),
        working_dir: (!node.working_dir.is_empty()).then(|| node.working_dir.clone()),
        command: Some(vec![
            "/bin/bash".to_string(),
            format!("{}{}", SCRIPT_MOUNT_PATH, script.template_name()),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: name.clone(),
            mount_path: SCRIPT_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        stdin: Some(true),
        tty: Some(true),
        ..Default::default()
    };

    let volume = Volume {
        name: name.clone(),
        config_map: Some(ConfigMapVolumeSource {
            name: name.clone(),
            items: Some(vec![KeyToPath {
                key: script.config_key().to_string(),
                path: script.template_name().to_string(),
                mode: Some(0o777),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(Pod {
        metadata: owned_metadata(cluster, &name)?,
        spec: Some(PodSpec {
            restart_policy: Some("OnFailure".to_string()),
            containers: vec![container],
            volumes: Some(vec![volume]),
            image_pull_secrets: (!node.pull_secret.is_empty()).then(|| {
                vec![LocalObjectReference {
                    name: node.pull_secret.clone(),
                }]
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}
