//! Headless Service for pool member DNS

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use kube::ResourceExt;

use super::owned_metadata;
use crate::crd::CondorCluster;
use crate::{Error, LABEL_CLUSTER_NAME};

/// Build the headless Service named `serviceName` selecting every pod of the cluster
pub fn build_headless_service(cluster: &CondorCluster) -> Result<Service, Error> {
    let selector = BTreeMap::from([(LABEL_CLUSTER_NAME.to_string(), cluster.name_any())]);

    Ok(Service {
        metadata: owned_metadata(cluster, &cluster.spec.service_name)?,
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    })
}
