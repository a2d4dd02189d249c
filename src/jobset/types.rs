//! JobSet serialization types
//!
//! Typed representation of the `jobset.x-k8s.io/v1alpha2` JobSet resource,
//! limited to the fields this operator writes. Job templates reuse the
//! k8s-openapi batch types so pod construction stays fully typed.

use k8s_openapi::api::batch::v1::JobTemplateSpec;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// JobSet spec
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "jobset.x-k8s.io",
    version = "v1alpha2",
    kind = "JobSet",
    plural = "jobsets",
    namespaced,
    status = "JobSetStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct JobSetSpec {
    /// One entry per role
    pub replicated_jobs: Vec<ReplicatedJob>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
}

/// A group of identical Jobs within a JobSet
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedJob {
    pub name: String,
    /// Number of Jobs created from `template`
    pub replicas: i32,
    pub template: JobTemplateSpec,
}

/// Pod DNS settings for the whole JobSet
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(
        rename = "enableDNSHostnames",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_dns_hostnames: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailurePolicy {
    /// Whole-JobSet restarts allowed before it is marked failed
    pub max_restarts: i32,
}

/// Status subresource, read back only for display
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_state: Option<String>,
}
