//! Values visible to the entrypoint scripts
//!
//! Scripts see four top-level names:
//! - `node` - the role's node configuration (camelCase, as in the record)
//! - `spec` - the whole defaulted cluster spec
//! - `cluster_name` - name of the owning CondorCluster
//! - `namespace` - namespace of the owning CondorCluster

use kube::ResourceExt;
use serde::Serialize;

use crate::crd::{CondorCluster, CondorClusterSpec, Node};
use crate::Error;

/// Render context for one role script
#[derive(Clone, Debug, Serialize)]
pub struct ScriptContext {
    /// Node configuration of the role being rendered
    pub node: Node,
    /// Full cluster spec, for pool-wide values
    pub spec: CondorClusterSpec,
    /// Owning cluster name
    pub cluster_name: String,
    /// Owning cluster namespace
    pub namespace: String,
}

impl ScriptContext {
    /// Build the context for `node` of `cluster`.
    ///
    /// The cluster is expected to be defaulted already; nothing is filled in here.
    pub fn for_node(cluster: &CondorCluster, node: &Node) -> Result<Self, Error> {
        let namespace = cluster.namespace().ok_or(Error::MissingNamespace)?;
        Ok(Self {
            node: node.clone(),
            spec: cluster.spec.clone(),
            cluster_name: cluster.name_any(),
            namespace,
        })
    }
}
