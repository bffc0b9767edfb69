//! # Reconciliation Logic
//!
//! The credential state machine and its kube-runtime entry point.
//!
//! Every pass re-reads both stores and derives one of four states:
//!
//! | State         | Condition                                   | Writes                    |
//! |---------------|---------------------------------------------|---------------------------|
//! | `Unqualified` | no registered profile accepts the spec      | none                      |
//! | `Missing`     | qualified, no credential with the same name | create credential, status |
//! | `Due`         | credential exists, rotation interval passed | replace password, status  |
//! | `Current`     | credential exists, rotation not yet due     | none                      |
//!
//! A credential whose owner has no recorded `lastRotationTime` is treated as
//! `Due`: it is rotated in place so its age becomes known again. The status
//! is written only after the credential write it describes has succeeded.

use crate::constants::{CONTROLLER_NAME, MANAGED_BY_LABEL};
use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::generator::{OsSecretGenerator, SecretGenerator};
use crate::controller::reconciler::profile::{CredentialProfile, ProfileRegistry};
use crate::controller::reconciler::requeue::RequeuePolicy;
use crate::controller::reconciler::rotation::{
    is_rotation_due, time_until_rotation, Clock, SystemClock,
};
use crate::controller::reconciler::store::{
    CreateOutcome, CredentialStore, DesiredStateStore, ResourceKey, StoreError,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{CustomSecret, CustomSecretStatus};
use crate::observability;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::runtime::events::EventType;
use kube::Resource;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// State a pass ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// The `CustomSecret` no longer exists
    Deleted,
    /// No profile accepts the spec; nothing was written
    Unqualified,
    /// A new credential was created
    Created,
    /// The existing credential's secret was regenerated
    Rotated,
    /// The credential is not yet due for rotation
    Current { remaining: Duration },
}

impl PassState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Unqualified => "unqualified",
            Self::Created => "created",
            Self::Rotated => "rotated",
            Self::Current { .. } => "current",
        }
    }
}

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub state: PassState,
    /// When to run the next pass; `None` waits for the next change event
    pub requeue_after: Option<Duration>,
}

/// Drives one `CustomSecret` toward its desired credential
pub struct CredentialReconciler {
    desired: Arc<dyn DesiredStateStore>,
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<ProfileRegistry>,
    generator: Arc<dyn SecretGenerator>,
    clock: Arc<dyn Clock>,
    requeue: RequeuePolicy,
}

impl std::fmt::Debug for CredentialReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialReconciler")
            .field("profiles", &self.profiles.tags())
            .field("requeue", &self.requeue)
            .finish_non_exhaustive()
    }
}

impl CredentialReconciler {
    /// Reconciler with the default profile registry, the OS generator, the
    /// system clock and precise requeues
    pub fn new(desired: Arc<dyn DesiredStateStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            desired,
            credentials,
            profiles: Arc::new(ProfileRegistry::default()),
            generator: Arc::new(OsSecretGenerator),
            clock: Arc::new(SystemClock),
            requeue: RequeuePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = Arc::new(profiles);
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn SecretGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_requeue_policy(mut self, requeue: RequeuePolicy) -> Self {
        self.requeue = requeue;
        self
    }

    /// Run one pass for `key`
    ///
    /// Store calls race `cancel`; once it fires the pass stops issuing
    /// requests and returns `ReconcilerError::Cancelled`.
    pub async fn reconcile(
        &self,
        key: &ResourceKey,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let Some(desired) = guarded(cancel, key, "get CustomSecret", self.desired.get(key)).await?
        else {
            debug!("CustomSecret no longer exists, nothing to do");
            return Ok(ReconcileOutcome {
                state: PassState::Deleted,
                requeue_after: None,
            });
        };

        let profile = match self.profiles.qualify(&desired.spec) {
            Ok(profile) => profile,
            Err(reason) => {
                debug!(%reason, "Skipping CustomSecret that no profile accepts");
                return Ok(ReconcileOutcome {
                    state: PassState::Unqualified,
                    requeue_after: None,
                });
            }
        };

        let interval = desired.spec.rotation_interval();
        let now = self.clock.now();

        let existing = match guarded(
            cancel,
            key,
            "get credential",
            self.credentials.get(key),
        )
        .await?
        {
            Some(existing) => existing,
            None => {
                let secret = self.generator.generate(desired.spec.secret_length)?;
                let credential = build_credential(&desired, key, profile, secret);
                match guarded(
                    cancel,
                    key,
                    "create credential",
                    self.credentials.create(&credential),
                )
                .await?
                {
                    CreateOutcome::Created => {
                        self.record_rotation(key, now, cancel).await?;
                        info!(profile = profile.tag(), "Created credential");
                        return Ok(ReconcileOutcome {
                            state: PassState::Created,
                            requeue_after: Some(self.requeue.after_write(interval)),
                        });
                    }
                    CreateOutcome::AlreadyExists => {
                        debug!("Credential already exists, continuing with the stored object");
                        guarded(cancel, key, "get credential", self.credentials.get(key))
                            .await?
                            .ok_or_else(|| ReconcilerError::Store {
                                operation: "create credential",
                                key: key.clone(),
                                source: StoreError::Conflict(key.clone()),
                            })?
                    }
                }
            }
        };

        match desired
            .status
            .as_ref()
            .and_then(CustomSecretStatus::last_rotation)
        {
            Some(last) if !is_rotation_due(last, interval, now) => {
                let remaining = time_until_rotation(last, interval, now);
                debug!(
                    remaining_secs = remaining.as_secs(),
                    "Credential is current, rotation not yet due"
                );
                return Ok(ReconcileOutcome {
                    state: PassState::Current { remaining },
                    requeue_after: Some(self.requeue.after_current(remaining, interval)),
                });
            }
            Some(last) => {
                debug!(last_rotation = %last, "Credential is due for rotation");
            }
            None => {
                warn!("Credential exists without a recorded rotation time, rotating it");
            }
        }

        if !is_managed(&existing) {
            warn!(
                "Credential is not labelled {}={}, overwriting its secret anyway",
                MANAGED_BY_LABEL, CONTROLLER_NAME
            );
        }

        let secret = self.generator.generate(desired.spec.secret_length)?;
        let rotated = with_rotated_secret(existing, profile, secret);
        guarded(
            cancel,
            key,
            "update credential",
            self.credentials.update(&rotated),
        )
        .await?;
        self.record_rotation(key, now, cancel).await?;
        info!(profile = profile.tag(), "Rotated credential");

        Ok(ReconcileOutcome {
            state: PassState::Rotated,
            requeue_after: Some(self.requeue.after_write(interval)),
        })
    }

    async fn record_rotation(
        &self,
        key: &ResourceKey,
        at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcilerError> {
        let status = CustomSecretStatus::rotated_at(at);
        guarded(
            cancel,
            key,
            "update CustomSecret status",
            self.desired.update_status(key, &status),
        )
        .await
    }
}

/// Await a store call unless `cancel` fires first
async fn guarded<T, F>(
    cancel: &CancellationToken,
    key: &ResourceKey,
    operation: &'static str,
    call: F,
) -> Result<T, ReconcilerError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ReconcilerError::Cancelled(key.clone())),
        result = call => result.map_err(|source| ReconcilerError::Store {
            operation,
            key: key.clone(),
            source,
        }),
    }
}

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), CONTROLLER_NAME.to_string())])
}

fn is_managed(secret: &Secret) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_BY_LABEL))
        .is_some_and(|v| v == CONTROLLER_NAME)
}

/// The credential for `owner`: same identity, profile type, subject and secret
pub fn build_credential(
    owner: &CustomSecret,
    key: &ResourceKey,
    profile: &CredentialProfile,
    secret: String,
) -> Secret {
    let data = BTreeMap::from([
        (
            profile.subject_key().to_string(),
            ByteString(owner.spec.subject.clone().into_bytes()),
        ),
        (
            profile.secret_key().to_string(),
            ByteString(secret.into_bytes()),
        ),
    ]);

    Secret {
        metadata: ObjectMeta {
            name: Some(key.name.clone()),
            namespace: Some(key.namespace.clone()),
            labels: Some(managed_labels()),
            owner_references: owner.controller_owner_ref(&()).map(|owner_ref| vec![owner_ref]),
            ..ObjectMeta::default()
        },
        type_: Some(profile.secret_type().to_string()),
        data: Some(data),
        ..Secret::default()
    }
}

/// `existing` with only its secret key replaced
///
/// Metadata is kept as read, including `resourceVersion`, so the update is
/// rejected if the object changed in between.
pub fn with_rotated_secret(
    mut existing: Secret,
    profile: &CredentialProfile,
    secret: String,
) -> Secret {
    existing
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(profile.secret_key().to_string(), ByteString(secret.into_bytes()));
    if let Some(string_data) = existing.string_data.as_mut() {
        string_data.remove(profile.secret_key());
    }
    existing
}

/// Entry point called by the kube-runtime controller
pub async fn reconcile(
    obj: Arc<CustomSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = match ResourceKey::of(obj.as_ref()) {
        Some(key) => key,
        None if obj.meta().name.is_none() => return Err(ReconcilerError::MissingMetadata("name")),
        None => return Err(ReconcilerError::MissingMetadata("namespace")),
    };

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.namespace = key.namespace.as_str(),
        resource.name = key.name.as_str(),
    );

    async move {
        observability::metrics::increment_reconciliations();
        let start = Instant::now();
        let result = ctx.credentials.reconcile(&key, &ctx.shutdown).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, ReconcilerError::Generation(_)) {
                    observability::metrics::increment_generation_errors();
                }
                return Err(e);
            }
        };

        ctx.reset_backoff(&key.to_string());
        observability::metrics::increment_pass_outcome(outcome.state.as_str());

        let resource_ref = obj.object_ref(&());
        match outcome.state {
            PassState::Created => {
                observability::metrics::increment_credentials_created();
                ctx.events
                    .publish(
                        &resource_ref,
                        EventType::Normal,
                        reasons::CREDENTIAL_CREATED,
                        actions::CREATE,
                        Some(format!("Created Secret {key}")),
                    )
                    .await;
            }
            PassState::Rotated => {
                observability::metrics::increment_credentials_rotated();
                ctx.events
                    .publish(
                        &resource_ref,
                        EventType::Normal,
                        reasons::CREDENTIAL_ROTATED,
                        actions::ROTATE,
                        Some(format!("Rotated the secret of Secret {key}")),
                    )
                    .await;
            }
            PassState::Deleted | PassState::Unqualified | PassState::Current { .. } => {}
        }

        debug!(state = outcome.state.as_str(), requeue_after = ?outcome.requeue_after, "Reconciliation finished");

        Ok(match outcome.requeue_after {
            Some(delay) => {
                let reason = match outcome.state {
                    PassState::Current { .. } => "rotation-pending",
                    _ => "rotation-scheduled",
                };
                observability::metrics::increment_requeues_total(reason);
                Action::requeue(delay)
            }
            None => Action::await_change(),
        })
    }
    .instrument(span)
    .await
}
