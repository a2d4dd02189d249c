//! Pool token bootstrap via a helper Pod
//!
//! Execute nodes authenticate to the manager with a token minted by
//! `condor_token_create`. The token is produced by a one-shot Pod running the
//! token script on the manager image, which prints [`TOKEN_MARKER`] followed by
//! the token. The token is recovered from that Pod's log.
//!
//! Every step is create-if-missing, so calling [`TokenBootstrap::obtain`]
//! again after a [`Error::TokenMarkerNotFound`] reuses the same Pod and simply
//! reads its log again.

mod runner;
mod token;

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{Api, LogParams};
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

#[cfg(test)]
use mockall::automock;

use crate::crd::CondorCluster;
use crate::store::{ensure, KubeStore, ObjectStore};
use crate::template::ScriptEngine;
use crate::Error;

pub use runner::{build_token_config_map, build_token_pod, token_object_name, TOKEN_CONTAINER};
pub use token::{extract_token, TOKEN_MARKER};

/// Reads the complete log of one container
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Full log of `container` in Pod `pod`
    async fn read_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<String, kube::Error>;
}

/// [`LogReader`] over the Pod log subresource
pub struct KubeLogReader {
    client: Client,
}

impl KubeLogReader {
    /// Create a reader using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogReader for KubeLogReader {
    async fn read_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<String, kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };
        api.logs(pod, &params).await
    }
}

/// Obtains the pool token for a cluster
pub struct TokenBootstrap {
    engine: Arc<ScriptEngine>,
    config_maps: Arc<dyn ObjectStore<ConfigMap>>,
    pods: Arc<dyn ObjectStore<Pod>>,
    logs: Arc<dyn LogReader>,
}

impl TokenBootstrap {
    /// Create a bootstrap over explicit stores and log reader
    pub fn new(
        engine: Arc<ScriptEngine>,
        config_maps: Arc<dyn ObjectStore<ConfigMap>>,
        pods: Arc<dyn ObjectStore<Pod>>,
        logs: Arc<dyn LogReader>,
    ) -> Self {
        Self {
            engine,
            config_maps,
            pods,
            logs,
        }
    }

    /// Create a bootstrap talking to the API server
    pub fn from_client(client: Client, engine: Arc<ScriptEngine>) -> Self {
        Self::new(
            engine,
            Arc::new(KubeStore::<ConfigMap>::new(client.clone())),
            Arc::new(KubeStore::<Pod>::new(client.clone())),
            Arc::new(KubeLogReader::new(client)),
        )
    }

    /// Ensure the helper objects exist and read the token from the helper's log.
    ///
    /// Whichever API call is in flight when `cancel` fires is abandoned with
    /// [`Error::Cancelled`]. A log without the marker yields
    /// [`Error::TokenMarkerNotFound`].
    #[instrument(skip(self, cluster, cancel), fields(cluster = %cluster.name_any()))]
    pub async fn obtain(
        &self,
        cluster: &CondorCluster,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let cluster = cluster.defaulted();
        let namespace = cluster.namespace().ok_or(Error::MissingNamespace)?;
        let name = token_object_name(&cluster);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(Error::Cancelled(format!("token bootstrap for {namespace}/{name}")))
            }
            result = self.fetch_token(&cluster, &namespace, &name) => result,
        }
    }

    async fn fetch_token(
        &self,
        cluster: &CondorCluster,
        namespace: &str,
        name: &str,
    ) -> Result<String, Error> {
        ensure(self.config_maps.as_ref(), namespace, name, || {
            build_token_config_map(&self.engine, cluster)
        })
        .await?;

        let pod = ensure(self.pods.as_ref(), namespace, name, || {
            build_token_pod(cluster)
        })
        .await?;
        if pod.created {
            info!(pod = %name, "started token helper pod");
        }

        let output = self.logs.read_logs(namespace, name, TOKEN_CONTAINER).await?;
        let token = extract_token(&output)?;
        info!("obtained pool token");
        Ok(token)
    }
}
