//! # CustomSecret Spec
//!
//! Desired state of a generated credential.

use crate::constants::{
    ROTATION_INTERVAL_MAX_SECS, ROTATION_INTERVAL_MIN_SECS, SECRET_LENGTH_MAX, SECRET_LENGTH_MIN,
    SUBJECT_MAX_LEN, SUBJECT_MIN_LEN,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// CustomSecret Custom Resource Definition
///
/// Declares a credential the controller should generate and keep rotated.
/// The controller never writes the spec, only the status sub-resource.
///
/// # Example
///
/// ```yaml
/// apiVersion: api.example.com/v1alpha1
/// kind: CustomSecret
/// metadata:
///   name: db-admin
///   namespace: default
/// spec:
///   profile: basic-auth
///   subject: admin
///   secretLength: 40
///   rotationIntervalSeconds: 60
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "CustomSecret",
    group = "api.example.com",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::CustomSecretStatus",
    shortname = "cs",
    printcolumn = r#"{"name":"Profile", "type":"string", "jsonPath":".spec.profile"}, {"name":"Subject", "type":"string", "jsonPath":".spec.subject"}, {"name":"Interval", "type":"integer", "jsonPath":".spec.rotationIntervalSeconds"}, {"name":"LastRotation", "type":"date", "jsonPath":".status.lastRotationTime"}, {"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CustomSecretSpec {
    /// Credential profile tag, e.g. "basic-auth"
    /// Unknown profiles are ignored by the controller
    pub profile: String,
    /// Principal name embedded in the credential (stored under `username`)
    #[schemars(length(min = 1, max = 63))]
    pub subject: String,
    /// Number of random bytes drawn before hex encoding
    /// The generated value is twice this many characters long
    #[schemars(range(min = 1, max = 100))]
    pub secret_length: u32,
    /// Seconds after the last rotation before the value is regenerated
    #[schemars(range(min = 1, max = 86400))]
    pub rotation_interval_seconds: u32,
}

/// A spec field outside the bounds published in the CRD schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecViolation {
    SubjectLength(usize),
    SecretLength(u32),
    RotationInterval(u32),
}

impl fmt::Display for SpecViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubjectLength(len) => write!(
                f,
                "subject length {len} outside {SUBJECT_MIN_LEN}..={SUBJECT_MAX_LEN}"
            ),
            Self::SecretLength(len) => write!(
                f,
                "secretLength {len} outside {SECRET_LENGTH_MIN}..={SECRET_LENGTH_MAX}"
            ),
            Self::RotationInterval(secs) => write!(
                f,
                "rotationIntervalSeconds {secs} outside {ROTATION_INTERVAL_MIN_SECS}..={ROTATION_INTERVAL_MAX_SECS}"
            ),
        }
    }
}

impl CustomSecretSpec {
    /// Every field that falls outside its schema bounds
    ///
    /// The API server enforces these bounds on admission, but objects written
    /// before the schema existed (or with validation disabled) can still carry
    /// out-of-range values.
    pub fn violations(&self) -> Vec<SpecViolation> {
        let mut violations = Vec::new();
        let subject_len = self.subject.chars().count();
        if !(SUBJECT_MIN_LEN..=SUBJECT_MAX_LEN).contains(&subject_len) {
            violations.push(SpecViolation::SubjectLength(subject_len));
        }
        if !(SECRET_LENGTH_MIN..=SECRET_LENGTH_MAX).contains(&self.secret_length) {
            violations.push(SpecViolation::SecretLength(self.secret_length));
        }
        if !(ROTATION_INTERVAL_MIN_SECS..=ROTATION_INTERVAL_MAX_SECS)
            .contains(&self.rotation_interval_seconds)
        {
            violations.push(SpecViolation::RotationInterval(
                self.rotation_interval_seconds,
            ));
        }
        violations
    }

    /// Rotation interval as a whole-second duration
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.rotation_interval_seconds))
    }
}
