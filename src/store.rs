//! Create-if-missing access to derived objects
//!
//! Derived objects are only ever created, never updated or patched. A later
//! change to the cluster record does not touch objects that already exist.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Namespaced lookup and creation of one object kind
///
/// Mocked in tests; [`KubeStore`] talks to the API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore<K: Send + Sync + 'static>: Send + Sync {
    /// Fetch an object, `None` if it does not exist
    async fn get_opt(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error>;

    /// Create an object, returning what the server stored
    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error>;
}

/// [`ObjectStore`] over a `kube::Api<K>`
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get_opt(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).await
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(crate::CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        api.create(&params, object).await
    }
}

/// Outcome of [`ensure`]
#[derive(Clone, Debug)]
pub struct Ensured<K> {
    /// The existing or newly created object
    pub object: K,
    /// Whether this call created it
    pub created: bool,
}

/// Return the object named `name`, creating it from `build` if absent.
///
/// `build` runs only when the object is missing. Lookup and create failures
/// come back as [`Error::Kube`] unchanged.
pub async fn ensure<K, S, F>(
    store: &S,
    namespace: &str,
    name: &str,
    build: F,
) -> Result<Ensured<K>, Error>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    S: ObjectStore<K> + ?Sized,
    F: FnOnce() -> Result<K, Error>,
{
    let kind = K::kind(&());

    if let Some(object) = store.get_opt(namespace, name).await? {
        debug!(%kind, %namespace, %name, "found existing object");
        return Ok(Ensured {
            object,
            created: false,
        });
    }

    let object = store.create(namespace, &build()?).await?;
    info!(%kind, %namespace, %name, "created object");
    Ok(Ensured {
        object,
        created: true,
    })
}
