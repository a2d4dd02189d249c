//! Per-role replicated job construction

use k8s_openapi::api::batch::v1::{JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, KeyToPath, LocalObjectReference,
    PodSpec, PodTemplateSpec, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::debug;

use super::resources::{container_resources, resource_list};
use super::{pod_labels, ReplicatedRole};
use crate::crd::{CondorCluster, Node};
use crate::jobset::ReplicatedJob;
use crate::template::Script;
use crate::{Error, ENTRYPOINT_SUFFIX, SCRIPT_MOUNT_PATH};

/// Job retries before a role's Job is marked failed
const BACKOFF_LIMIT: i32 = 100;

/// Mode of every mounted entrypoint script
const SCRIPT_MODE: i32 = 0o777;

/// Name of the entrypoint ConfigMap and of the volume mounting it
pub fn entrypoint_volume_name(cluster: &CondorCluster) -> String {
    format!("{}{}", cluster.name_any(), ENTRYPOINT_SUFFIX)
}

/// Build the replicated job running `replicas` pods of `role`.
///
/// `indexed` selects Indexed completion so pod hostnames carry a stable index.
pub fn build_replicated_job(
    cluster: &CondorCluster,
    node: &Node,
    replicas: i32,
    role: ReplicatedRole,
    indexed: bool,
) -> Result<ReplicatedJob, Error> {
    let namespace = cluster.namespace().ok_or(Error::MissingNamespace)?;
    let metadata = ObjectMeta {
        name: Some(cluster.name_any()),
        namespace: Some(namespace),
        ..Default::default()
    };

    let overhead = resource_list(&cluster.spec.resources)?;
    let container = build_container(cluster, node, role)?;

    let image_pull_secrets = (!node.pull_secret.is_empty()).then(|| {
        vec![LocalObjectReference {
            name: node.pull_secret.clone(),
        }]
    });

    let completion_mode = if indexed { "Indexed" } else { "NonIndexed" };

    let job_spec = JobSpec {
        backoff_limit: Some(BACKOFF_LIMIT),
        completions: Some(replicas),
        parallelism: Some(replicas),
        completion_mode: Some(completion_mode.to_string()),
        active_deadline_seconds: Some(cluster.spec.deadline_seconds),
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(pod_labels(cluster)),
                ..metadata.clone()
            }),
            spec: Some(PodSpec {
                subdomain: Some(cluster.spec.service_name.clone()),
                volumes: Some(vec![entrypoint_volume(cluster)]),
                restart_policy: Some("OnFailure".to_string()),
                image_pull_secrets,
                overhead,
                containers: vec![container],
                ..Default::default()
            }),
        },
        ..Default::default()
    };

    debug!(
        cluster = %cluster.name_any(),
        role = role.name(),
        replicas,
        "built replicated job"
    );

    Ok(ReplicatedJob {
        name: role.name().to_string(),
        replicas: 1,
        template: JobTemplateSpec {
            metadata: Some(metadata),
            spec: Some(job_spec),
        },
    })
}

fn build_container(
    cluster: &CondorCluster,
    node: &Node,
    role: ReplicatedRole,
) -> Result<Container, Error> {
    let pull_policy = if node.pull_always {
        "Always"
    } else {
        "IfNotPresent"
    };

    let script = format!("{}{}", SCRIPT_MOUNT_PATH, role.script().template_name());
    let mut command = vec!["/bin/bash".to_string(), script];
    // Only the manager takes a user command
    if role == ReplicatedRole::Manager {
        command.push(node.command.clone());
    }

    let ports: Vec<ContainerPort> = node
        .ports
        .iter()
        .map(|port| ContainerPort {
            container_port: *port,
            protocol: Some("TCP".to_string()),
            ..Default::default()
        })
        .collect();

    let env: Vec<EnvVar> = node
        .environment
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    Ok(Container {
        name: role.container_name(),
        image: Some(node.image.clone()),
        image_pull_policy: Some(pull_policy.to_string()),
        working_dir: (!node.working_dir.is_empty()).then(|| node.working_dir.clone()),
        volume_mounts: Some(vec![VolumeMount {
            name: entrypoint_volume_name(cluster),
            mount_path: SCRIPT_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        stdin: Some(true),
        tty: Some(true),
        resources: Some(container_resources(&node.resources)?),
        command: Some(command),
        security_context: Some(SecurityContext {
            privileged: Some(cluster.spec.security_context.privileged),
            ..Default::default()
        }),
        ports: (!ports.is_empty()).then_some(ports),
        env: (!env.is_empty()).then_some(env),
        ..Default::default()
    })
}

/// Every pod gets all three role scripts; each container runs only its own
fn entrypoint_volume(cluster: &CondorCluster) -> Volume {
    let items = Script::ENTRYPOINTS
        .iter()
        .map(|script| KeyToPath {
            key: script.config_key().to_string(),
            path: script.template_name().to_string(),
            mode: Some(SCRIPT_MODE),
        })
        .collect();

    Volume {
        name: entrypoint_volume_name(cluster),
        config_map: Some(ConfigMapVolumeSource {
            name: entrypoint_volume_name(cluster),
            items: Some(items),
            ..Default::default()
        }),
        ..Default::default()
    }
}
