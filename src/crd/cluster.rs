//! CondorCluster Custom Resource Definition
//!
//! A CondorCluster describes one HTCondor pool: a single manager, a single
//! submit node and a scalable group of execute nodes.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterConfig, Node, ResourceList, SecurityContext};
use crate::{
    DEFAULT_DEADLINE_SECONDS, DEFAULT_EXECUTE_IMAGE, DEFAULT_MANAGER_IMAGE, DEFAULT_PASSWORD,
    DEFAULT_SERVICE_NAME, DEFAULT_SUBMIT_IMAGE,
};

/// Specification for a CondorCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "condor.lattice.dev",
    version = "v1alpha1",
    kind = "CondorCluster",
    plural = "condorclusters",
    shortname = "cc",
    status = "CondorClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CondorClusterSpec {
    /// Central manager (collector + negotiator)
    #[serde(default)]
    pub manager: Node,

    /// Submission node
    #[serde(default)]
    pub submit: Node,

    /// Execution workers
    #[serde(default)]
    pub execute: Node,

    /// Headless service name, also used as the pod subdomain
    #[serde(default)]
    pub service_name: String,

    /// Pool configuration values
    #[serde(default)]
    pub config: ClusterConfig,

    /// Size of the pool (1 manager + N-1 workers)
    pub size: i32,

    /// Keep the pool running after the manager command exits
    #[serde(default)]
    pub interactive: bool,

    /// Time limit for every replica, in seconds
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: i64,

    /// Pod overhead applied to every role
    #[serde(default)]
    pub resources: ResourceList,

    /// Security settings applied to all nodes
    #[serde(default)]
    pub security_context: SecurityContext,
}

fn default_deadline_seconds() -> i64 {
    DEFAULT_DEADLINE_SECONDS
}

impl CondorClusterSpec {
    /// Return a copy with every unset field replaced by its documented fallback
    pub fn with_defaults(&self) -> Self {
        let mut spec = self.clone();
        fill(&mut spec.manager.image, DEFAULT_MANAGER_IMAGE);
        fill(&mut spec.submit.image, DEFAULT_SUBMIT_IMAGE);
        fill(&mut spec.execute.image, DEFAULT_EXECUTE_IMAGE);
        fill(&mut spec.service_name, DEFAULT_SERVICE_NAME);
        fill(&mut spec.config.password, DEFAULT_PASSWORD);
        if spec.deadline_seconds == 0 {
            spec.deadline_seconds = DEFAULT_DEADLINE_SECONDS;
        }
        spec
    }

    /// Validate the cluster specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.size < 1 {
            return Err(crate::Error::validation(format!(
                "size must be at least 1, got {}",
                self.size
            )));
        }
        if self.deadline_seconds <= 0 {
            return Err(crate::Error::validation(
                "deadlineSeconds must be positive or the jobs never start",
            ));
        }
        Ok(())
    }
}

fn fill(field: &mut String, fallback: &str) {
    if field.is_empty() {
        *field = fallback.to_string();
    }
}

impl CondorCluster {
    /// Clone of this record with its spec defaulted
    pub fn defaulted(&self) -> Self {
        let mut cluster = self.clone();
        cluster.spec = self.spec.with_defaults();
        cluster
    }
}

/// Status for a CondorCluster
///
/// Nothing is reported yet; derived objects carry their own status.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CondorClusterStatus {}
