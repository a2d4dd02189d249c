//! Custom Resource Definitions for the Condor operator

mod cluster;
mod types;

pub use cluster::{CondorCluster, CondorClusterSpec, CondorClusterStatus};
pub use types::{ClusterConfig, Commands, Node, NodeResources, ResourceList, SecurityContext};
