//! Common test utilities for reconciliation tests
//!
//! In-memory stores with write counters and failure injection, a manual
//! clock, a failing generator, and builders for sample resources.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use custom_secret_controller::controller::reconciler::{
    Clock, CreateOutcome, CredentialReconciler, CredentialStore, DesiredStateStore,
    GenerationError, ReconcileOutcome, ReconcilerError, ResourceKey, SecretGenerator, StoreError,
};
use custom_secret_controller::crd::{CustomSecret, CustomSecretSpec, CustomSecretStatus};
use k8s_openapi::api::core::v1::Secret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub fn injected_failure(what: &str) -> StoreError {
    StoreError::Api(kube::Error::Service(Box::new(std::io::Error::other(
        format!("injected {what} failure"),
    ))))
}

/// `CustomSecret` store backed by a map
#[derive(Default)]
pub struct InMemoryDesiredStore {
    objects: Mutex<HashMap<ResourceKey, CustomSecret>>,
    pub gets: AtomicUsize,
    pub status_writes: AtomicUsize,
    fail_status: AtomicBool,
}

impl InMemoryDesiredStore {
    pub fn insert(&self, obj: CustomSecret) {
        let key = ResourceKey::of(&obj).unwrap();
        self.objects.lock().unwrap().insert(key, obj);
    }

    pub fn remove(&self, key: &ResourceKey) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn object(&self, key: &ResourceKey) -> Option<CustomSecret> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn status(&self, key: &ResourceKey) -> Option<CustomSecretStatus> {
        self.object(key).and_then(|obj| obj.status)
    }

    pub fn set_status(&self, key: &ResourceKey, status: Option<CustomSecretStatus>) {
        if let Some(obj) = self.objects.lock().unwrap().get_mut(key) {
            obj.status = status;
        }
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesiredStateStore for InMemoryDesiredStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<CustomSecret>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.object(key))
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &CustomSecretStatus,
    ) -> Result<(), StoreError> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(injected_failure("status update"));
        }
        let mut objects = self.objects.lock().unwrap();
        let obj = objects.get_mut(key).ok_or_else(|| injected_failure("missing object"))?;
        obj.status = Some(status.clone());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Credential store backed by a map, with optimistic concurrency on
/// `resourceVersion`
#[derive(Default)]
pub struct InMemoryCredentialStore {
    secrets: Mutex<HashMap<ResourceKey, Secret>>,
    next_version: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    hide_next_get: AtomicBool,
    race_next_get: AtomicBool,
    hang_gets: AtomicBool,
}

impl InMemoryCredentialStore {
    fn stamp(&self, secret: &mut Secret) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        secret.metadata.resource_version = Some(version.to_string());
    }

    /// Store `secret` as if another actor wrote it
    pub fn insert(&self, mut secret: Secret) {
        self.stamp(&mut secret);
        let key = ResourceKey::of(&secret).unwrap();
        self.secrets.lock().unwrap().insert(key, secret);
    }

    pub fn remove(&self, key: &ResourceKey) {
        self.secrets.lock().unwrap().remove(key);
    }

    pub fn secret(&self, key: &ResourceKey) -> Option<Secret> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        self.secrets.lock().unwrap().keys().cloned().collect()
    }

    /// Bump the stored object's version so the next update conflicts
    pub fn touch(&self, key: &ResourceKey) {
        let mut secrets = self.secrets.lock().unwrap();
        if let Some(secret) = secrets.get_mut(key) {
            let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
            secret.metadata.resource_version = Some(version.to_string());
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    /// The next `get` reports the credential as absent (stale read)
    pub fn hide_next_get(&self) {
        self.hide_next_get.store(true, Ordering::SeqCst);
    }

    /// Another writer bumps the object right after the next `get` returns
    pub fn race_next_get(&self) {
        self.race_next_get.store(true, Ordering::SeqCst);
    }

    /// Every `get` blocks forever
    pub fn hang_gets(&self) {
        self.hang_gets.store(true, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.updates()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Secret>, StoreError> {
        if self.hang_gets.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.hide_next_get.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let secret = self.secret(key);
        if self.race_next_get.swap(false, Ordering::SeqCst) {
            self.touch(key);
        }
        Ok(secret)
    }

    async fn create(&self, secret: &Secret) -> Result<CreateOutcome, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected_failure("create"));
        }
        let key = ResourceKey::of(secret).ok_or(StoreError::MissingMetadata("namespace"))?;
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let mut stored = secret.clone();
        self.stamp(&mut stored);
        secrets.insert(key, stored);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(CreateOutcome::Created)
    }

    async fn update(&self, secret: &Secret) -> Result<(), StoreError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected_failure("update"));
        }
        let key = ResourceKey::of(secret).ok_or(StoreError::MissingMetadata("namespace"))?;
        let mut secrets = self.secrets.lock().unwrap();
        let current = secrets.get(&key).ok_or_else(|| injected_failure("missing secret"))?;
        if current.metadata.resource_version != secret.metadata.resource_version {
            return Err(StoreError::Conflict(key));
        }
        let mut stored = secret.clone();
        self.stamp(&mut stored);
        secrets.insert(key, stored);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Clock that only moves when told to, in whole seconds
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Generator whose entropy source always fails
#[derive(Default)]
pub struct FailingGenerator {
    pub calls: AtomicUsize,
}

impl SecretGenerator for FailingGenerator {
    fn generate(&self, length: u32) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Entropy {
            requested: length,
            source: rand::Error::new(std::io::Error::other("entropy source unavailable")),
        })
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn spec(
    profile: &str,
    subject: &str,
    secret_length: u32,
    rotation_interval_seconds: u32,
) -> CustomSecretSpec {
    CustomSecretSpec {
        profile: profile.to_string(),
        subject: subject.to_string(),
        secret_length,
        rotation_interval_seconds,
    }
}

/// The one shape the default registry accepts
pub fn basic_auth_spec(rotation_interval_seconds: u32) -> CustomSecretSpec {
    spec("basic-auth", "admin", 40, rotation_interval_seconds)
}

pub fn custom_secret(namespace: &str, name: &str, spec: CustomSecretSpec) -> CustomSecret {
    let mut obj = CustomSecret::new(name, spec);
    obj.metadata.namespace = Some(namespace.to_string());
    obj.metadata.uid = Some(format!("uid-{namespace}-{name}"));
    obj
}

pub fn data_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| String::from_utf8(value.0.clone()).unwrap())
}

pub fn is_lower_hex(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Reconciler wired to in-memory stores and a manual clock starting at `t0()`
pub struct Harness {
    pub desired: Arc<InMemoryDesiredStore>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub reconciler: CredentialReconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(|reconciler| reconciler)
    }

    /// Harness with extra configuration applied to the reconciler
    pub fn build(configure: impl FnOnce(CredentialReconciler) -> CredentialReconciler) -> Self {
        let desired = Arc::new(InMemoryDesiredStore::default());
        let credentials = Arc::new(InMemoryCredentialStore::default());
        let clock = Arc::new(ManualClock::at(t0()));
        let reconciler = configure(
            CredentialReconciler::new(
                Arc::clone(&desired) as Arc<dyn DesiredStateStore>,
                Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            )
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>),
        );
        Self {
            desired,
            credentials,
            clock,
            reconciler,
        }
    }

    pub async fn pass(&self, key: &ResourceKey) -> Result<ReconcileOutcome, ReconcilerError> {
        self.reconciler
            .reconcile(key, &CancellationToken::new())
            .await
    }
}
