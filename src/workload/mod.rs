//! JobSet, Service and container construction
//!
//! Everything here is pure: a defaulted [`CondorCluster`] goes in, typed
//! Kubernetes objects come out. Nothing talks to the API server.
//!
//! Pods of one cluster share the `cluster-name` label. The headless Service
//! selects on it and every pod sets `subdomain = serviceName`, which gives each
//! replica the stable hostname `<cluster>-<role>-<job>-<pod>.<serviceName>`.

mod job;
mod resources;
mod service;

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use tracing::warn;

use crate::crd::{CondorCluster, CondorClusterSpec, Node};
use crate::jobset::{FailurePolicy, JobSet, JobSetSpec, Network};
use crate::template::Script;
use crate::{Error, LABEL_CLUSTER_NAME};

pub use job::{build_replicated_job, entrypoint_volume_name};
pub use resources::{container_resources, parse_quantity, resource_list};
pub use service::build_headless_service;

/// A role within the pool; one replicated job each
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplicatedRole {
    /// Central manager (collector + negotiator)
    Manager,
    /// Submit node (schedd)
    Submit,
    /// Execute workers (startd)
    Execute,
}

impl ReplicatedRole {
    /// Replicated job name, also the prefix of the container name
    pub fn name(self) -> &'static str {
        match self {
            ReplicatedRole::Manager => "manager",
            ReplicatedRole::Submit => "submit",
            ReplicatedRole::Execute => "execute",
        }
    }

    /// Entrypoint script run by the role's container
    pub fn script(self) -> Script {
        match self {
            ReplicatedRole::Manager => Script::Manager,
            ReplicatedRole::Submit => Script::Submit,
            ReplicatedRole::Execute => Script::Execute,
        }
    }

    /// Container name inside the role's pods
    pub fn container_name(self) -> String {
        format!("{}-node", self.name())
    }

    /// Node configuration of this role
    pub fn node(self, spec: &CondorClusterSpec) -> &Node {
        match self {
            ReplicatedRole::Manager => &spec.manager,
            ReplicatedRole::Submit => &spec.submit,
            ReplicatedRole::Execute => &spec.execute,
        }
    }

    /// Map a role identifier; anything unknown is treated as the manager
    pub fn from_name(name: &str) -> Self {
        match name {
            "manager" => ReplicatedRole::Manager,
            "submit" => ReplicatedRole::Submit,
            "execute" => ReplicatedRole::Execute,
            other => {
                warn!(role = other, "unknown role, using manager entrypoint");
                ReplicatedRole::Manager
            }
        }
    }
}

/// How the execute role's replica count is derived from `size`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteReplicaPolicy {
    /// One execute replica per unit of size
    TotalSize,
    /// `size` counts the manager, so execute gets `size - 1`
    ReserveManager,
}

/// Policy used when the reconciler builds the JobSet
pub const EXECUTE_REPLICA_POLICY: ExecuteReplicaPolicy = ExecuteReplicaPolicy::TotalSize;

/// Number of execute replicas for `spec` under `policy`
pub fn execute_replicas(spec: &CondorClusterSpec, policy: ExecuteReplicaPolicy) -> i32 {
    match policy {
        ExecuteReplicaPolicy::TotalSize => spec.size.max(0),
        ExecuteReplicaPolicy::ReserveManager => (spec.size - 1).max(0),
    }
}

/// Labels carried by every pod of the cluster
pub fn pod_labels(cluster: &CondorCluster) -> BTreeMap<String, String> {
    let name = cluster.name_any();
    BTreeMap::from([
        (LABEL_CLUSTER_NAME.to_string(), name.clone()),
        (
            "namespace".to_string(),
            cluster.namespace().unwrap_or_default(),
        ),
        ("app.kubernetes.io/name".to_string(), name),
    ])
}

/// Controller owner reference so derived objects are garbage collected with the cluster
pub fn owner_reference(cluster: &CondorCluster) -> Result<OwnerReference, Error> {
    cluster
        .controller_owner_ref(&())
        .ok_or_else(|| Error::MissingOwnerMetadata(cluster.name_any()))
}

/// Metadata for an object owned by `cluster`
pub(crate) fn owned_metadata(cluster: &CondorCluster, name: &str) -> Result<ObjectMeta, Error> {
    let namespace = cluster.namespace().ok_or(Error::MissingNamespace)?;
    Ok(ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace),
        labels: Some(BTreeMap::from([(
            LABEL_CLUSTER_NAME.to_string(),
            cluster.name_any(),
        )])),
        owner_references: Some(vec![owner_reference(cluster)?]),
        ..Default::default()
    })
}

/// ConfigMap owned by `cluster` holding rendered scripts
pub fn build_config_map(
    cluster: &CondorCluster,
    name: &str,
    data: BTreeMap<String, String>,
) -> Result<ConfigMap, Error> {
    Ok(ConfigMap {
        metadata: owned_metadata(cluster, name)?,
        data: Some(data),
        ..Default::default()
    })
}

/// Build the JobSet for a defaulted cluster.
///
/// Manager and submit always run one replica. The execute role is left out
/// entirely when the policy yields zero replicas.
pub fn build_jobset(cluster: &CondorCluster, policy: ExecuteReplicaPolicy) -> Result<JobSet, Error> {
    let spec = &cluster.spec;
    let mut replicated_jobs = vec![
        build_replicated_job(cluster, &spec.manager, 1, ReplicatedRole::Manager, true)?,
        build_replicated_job(cluster, &spec.submit, 1, ReplicatedRole::Submit, true)?,
    ];

    let workers = execute_replicas(spec, policy);
    if workers > 0 {
        replicated_jobs.push(build_replicated_job(
            cluster,
            &spec.execute,
            workers,
            ReplicatedRole::Execute,
            true,
        )?);
    }

    let mut jobset = JobSet::new(
        &cluster.name_any(),
        JobSetSpec {
            replicated_jobs,
            network: Some(Network {
                enable_dns_hostnames: Some(false),
                subdomain: None,
            }),
            failure_policy: Some(FailurePolicy { max_restarts: 0 }),
            suspend: Some(false),
        },
    );
    jobset.metadata = owned_metadata(cluster, &cluster.name_any())?;
    Ok(jobset)
}
