//! # Stores
//!
//! Typed read/write access to the two stores a reconciliation pass touches:
//! the desired-state store (`CustomSecret` objects and their status) and the
//! credential store (managed `Secret` objects).
//!
//! Both are traits so the state machine can run against the Kubernetes API
//! in production and against in-memory fakes in tests. The reconciler keeps
//! no cache of its own; every pass re-reads both stores.

use crate::crd::{CustomSecret, CustomSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use std::fmt;
use thiserror::Error;

/// Namespace and name of a `CustomSecret` and of the credential it owns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object, `None` if it has no namespace or name
    pub fn of<K: Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self::new(meta.namespace.clone()?, meta.name.clone()?))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} was modified concurrently")]
    Conflict(ResourceKey),
    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
}

/// Result of a create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// An object with the same identity already exists; nothing was written
    AlreadyExists,
}

/// Access to `CustomSecret` objects
#[async_trait]
pub trait DesiredStateStore: Send + Sync {
    /// Fetch the object, `None` if it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<CustomSecret>, StoreError>;

    /// Write the status sub-resource
    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &CustomSecretStatus,
    ) -> Result<(), StoreError>;
}

/// Access to generated credential objects
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential, `None` if it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<Secret>, StoreError>;

    /// Create the credential
    async fn create(&self, secret: &Secret) -> Result<CreateOutcome, StoreError>;

    /// Replace the credential
    ///
    /// Fails with `StoreError::Conflict` when the object changed since it was read.
    async fn update(&self, secret: &Secret) -> Result<(), StoreError>;
}

/// `CustomSecret` store backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeDesiredStateStore {
    client: Client,
    field_manager: String,
}

impl fmt::Debug for KubeDesiredStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeDesiredStateStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeDesiredStateStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, namespace: &str) -> Api<CustomSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl DesiredStateStore for KubeDesiredStateStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<CustomSecret>, StoreError> {
        Ok(self.api(&key.namespace).get_opt(&key.name).await?)
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &CustomSecretStatus,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        self.api(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await?;
        Ok(())
    }
}

/// Credential store backed by core/v1 `Secret`s
#[derive(Clone)]
pub struct KubeCredentialStore {
    client: Client,
}

impl fmt::Debug for KubeCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeCredentialStore").finish_non_exhaustive()
    }
}

impl KubeCredentialStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn secret_key(secret: &Secret) -> Result<ResourceKey, StoreError> {
    let namespace = secret
        .namespace()
        .ok_or(StoreError::MissingMetadata("namespace"))?;
    let name = secret
        .metadata
        .name
        .clone()
        .ok_or(StoreError::MissingMetadata("name"))?;
    Ok(ResourceKey::new(namespace, name))
}

#[async_trait]
impl CredentialStore for KubeCredentialStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Secret>, StoreError> {
        Ok(self.api(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create(&self, secret: &Secret) -> Result<CreateOutcome, StoreError> {
        let key = secret_key(secret)?;
        match self
            .api(&key.namespace)
            .create(&PostParams::default(), secret)
            .await
        {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, secret: &Secret) -> Result<(), StoreError> {
        let key = secret_key(secret)?;
        match self
            .api(&key.namespace)
            .replace(&key.name, &PostParams::default(), secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                Err(StoreError::Conflict(key))
            }
            Err(e) => Err(e.into()),
        }
    }
}
