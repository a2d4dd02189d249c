//! Typed `jobset.x-k8s.io` resources
//!
//! The JobSet controller is installed separately; this operator only creates
//! JobSet objects and never reads their status for decisions.

#![allow(missing_docs)]

mod types;

pub use types::{FailurePolicy, JobSet, JobSetSpec, JobSetStatus, Network, ReplicatedJob};
