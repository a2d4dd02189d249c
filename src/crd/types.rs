//! Shared types for the CondorCluster CRD

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Resource quantities keyed by resource name (`cpu`, `memory`, ...).
///
/// Values may be written as integers or Kubernetes quantity strings.
pub type ResourceList = BTreeMap<String, IntOrString>;

/// Configuration for one pool role; corresponds to the pods of that role
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Container image (falls back to a role-specific default)
    #[serde(default)]
    pub image: String,

    /// Resource limits and requests for the role's container
    #[serde(default)]
    pub resources: NodeResources,

    /// Image pull secret, if the registry needs one
    #[serde(default)]
    pub pull_secret: String,

    /// Custom command, honored by the manager role only
    #[serde(default)]
    pub command: String,

    /// Commands run around the pool setup
    #[serde(default)]
    pub commands: Commands,

    /// Working directory for the container
    #[serde(default)]
    pub working_dir: String,

    /// Always pull the image instead of using a cached copy
    #[serde(default)]
    pub pull_always: bool,

    /// Ports exposed to other pool members (container port == exposed port)
    #[serde(default)]
    pub ports: Vec<i32>,

    /// Environment variables for the role's container
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Hooks run by the entrypoint scripts
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Commands {
    /// Runs before anything else in every role script
    #[serde(default)]
    pub init: String,
}

/// Container limits and requests
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeResources {
    /// Upper bounds
    #[serde(default)]
    pub limits: ResourceList,

    /// Scheduling requests
    #[serde(default)]
    pub requests: ResourceList,
}

/// Pool-wide configuration values
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Pool password shared by every daemon
    #[serde(default)]
    pub password: String,
}

/// Security settings applied to every container of every role
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    /// Run containers privileged
    #[serde(default)]
    pub privileged: bool,
}
