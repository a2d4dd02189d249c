//! Condor Operator - CRD-driven Kubernetes operator for HTCondor pools
//!
//! A `CondorCluster` record is materialized into a small, fixed set of owned
//! Kubernetes objects:
//! - a ConfigMap holding the role entrypoint scripts
//! - a headless Service so pool members resolve each other by hostname
//! - a JobSet with one replicated job per role (manager, submit, execute)
//!
//! A one-shot helper Pod can additionally be run to mint the pool token that
//! execute nodes authenticate with.
//!
//! # Modules
//!
//! - [`crd`] - The `CondorCluster` Custom Resource Definition
//! - [`controller`] - Reconciliation logic and controller context
//! - [`store`] - Create-if-missing access to derived objects
//! - [`workload`] - JobSet, Service and container construction
//! - [`jobset`] - Typed `jobset.x-k8s.io` resources
//! - [`template`] - Entrypoint script rendering
//! - [`bootstrap`] - Pool token bootstrap via a helper Pod
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod bootstrap;
pub mod controller;
pub mod crd;
pub mod error;
pub mod jobset;
pub mod store;
pub mod template;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Naming Constants
// =============================================================================
// Every derived object is named from the owning cluster's name plus one of
// these suffixes, so lookups on later passes find what earlier passes created.

/// Suffix of the ConfigMap holding the role entrypoint scripts
pub const ENTRYPOINT_SUFFIX: &str = "-entrypoint";

/// Suffix of the token ConfigMap and the token helper Pod
pub const TOKEN_SUFFIX: &str = "-token";

/// Directory the entrypoint ConfigMaps are mounted at inside every container
pub const SCRIPT_MOUNT_PATH: &str = "/condor_operator/";

/// Pod label selecting every member of one cluster
pub const LABEL_CLUSTER_NAME: &str = "cluster-name";

/// Field manager / controller name reported to the API server
pub const CONTROLLER_NAME: &str = "condor-operator";

// =============================================================================
// Defaults
// =============================================================================

/// Image used by the manager role when the node does not set one
pub const DEFAULT_MANAGER_IMAGE: &str = "htcondor/cm:el7";

/// Image used by the submit role when the node does not set one
pub const DEFAULT_SUBMIT_IMAGE: &str = "htcondor/submit:el7";

/// Image used by the execute role when the node does not set one
pub const DEFAULT_EXECUTE_IMAGE: &str = "htcondor/execute:el7";

/// Headless service name (and pod subdomain) when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "htc-service";

/// Pool password when none is configured
pub const DEFAULT_PASSWORD: &str = "password";

/// Active deadline for every replica, approximately one year.
///
/// A zero deadline would prevent the jobs from ever starting.
pub const DEFAULT_DEADLINE_SECONDS: i64 = 31_500_000;
