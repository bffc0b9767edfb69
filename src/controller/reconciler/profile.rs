//! # Qualification Gate
//!
//! Registry of supported credential profiles keyed by the `profile` tag.
//!
//! A `CustomSecret` is acted upon only when its tag names a registered
//! profile, its fields are within the schema bounds, and the profile's
//! rules accept its subject and secret length. Anything else is inert:
//! the reconciler skips it on every pass without writing or erroring.

use crate::constants::{PASSWORD_KEY, USERNAME_KEY};
use crate::crd::{CustomSecretSpec, SpecViolation};
use std::collections::HashMap;
use std::fmt;

/// Constraint on the `subject` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRule {
    /// Any subject within the schema bounds
    Any,
    /// Only this exact subject
    Exact(String),
}

/// Constraint on the `secretLength` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Any length within the schema bounds
    Any,
    /// Only this exact length
    Exact(u32),
}

/// Shape of the credential a profile produces and the specs it accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialProfile {
    tag: String,
    secret_type: String,
    subject_key: String,
    secret_key: String,
    subject: SubjectRule,
    secret_length: LengthRule,
}

impl CredentialProfile {
    pub fn new(tag: impl Into<String>, secret_type: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            secret_type: secret_type.into(),
            subject_key: USERNAME_KEY.to_string(),
            secret_key: PASSWORD_KEY.to_string(),
            subject: SubjectRule::Any,
            secret_length: LengthRule::Any,
        }
    }

    /// The `basic-auth` profile: subject `admin`, 40 random bytes
    pub fn basic_auth() -> Self {
        Self::new("basic-auth", "kubernetes.io/basic-auth")
            .with_subject(SubjectRule::Exact("admin".to_string()))
            .with_secret_length(LengthRule::Exact(40))
    }

    #[must_use]
    pub fn with_subject(mut self, rule: SubjectRule) -> Self {
        self.subject = rule;
        self
    }

    #[must_use]
    pub fn with_secret_length(mut self, rule: LengthRule) -> Self {
        self.secret_length = rule;
        self
    }

    #[must_use]
    pub fn with_keys(mut self, subject_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.subject_key = subject_key.into();
        self.secret_key = secret_key.into();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Kubernetes Secret `type` of the generated credential
    pub fn secret_type(&self) -> &str {
        &self.secret_type
    }

    /// Data key holding the subject
    pub fn subject_key(&self) -> &str {
        &self.subject_key
    }

    /// Data key holding the generated value
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    fn check(&self, spec: &CustomSecretSpec) -> Result<(), Disqualification> {
        if let SubjectRule::Exact(expected) = &self.subject {
            if spec.subject != *expected {
                return Err(Disqualification::SubjectNotAllowed {
                    profile: self.tag.clone(),
                });
            }
        }
        if let LengthRule::Exact(expected) = self.secret_length {
            if spec.secret_length != expected {
                return Err(Disqualification::SecretLengthNotAllowed {
                    profile: self.tag.clone(),
                    length: spec.secret_length,
                });
            }
        }
        Ok(())
    }
}

/// Why a spec was not accepted
///
/// Used for diagnostics only; a disqualified object is skipped, not failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disqualification {
    UnknownProfile(String),
    OutOfBounds(Vec<SpecViolation>),
    SubjectNotAllowed { profile: String },
    SecretLengthNotAllowed { profile: String, length: u32 },
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProfile(tag) => write!(f, "profile {tag:?} is not supported"),
            Self::OutOfBounds(violations) => {
                let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
                write!(f, "spec out of bounds: {}", details.join(", "))
            }
            Self::SubjectNotAllowed { profile } => {
                write!(f, "subject is not allowed by profile {profile:?}")
            }
            Self::SecretLengthNotAllowed { profile, length } => {
                write!(f, "secretLength {length} is not allowed by profile {profile:?}")
            }
        }
    }
}

/// Supported profiles keyed by tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRegistry {
    profiles: HashMap<String, CredentialProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(CredentialProfile::basic_auth());
        registry
    }
}

impl ProfileRegistry {
    /// Registry accepting nothing
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Add a profile, returning the one it replaced
    pub fn register(&mut self, profile: CredentialProfile) -> Option<CredentialProfile> {
        self.profiles.insert(profile.tag.clone(), profile)
    }

    pub fn get(&self, tag: &str) -> Option<&CredentialProfile> {
        self.profiles.get(tag)
    }

    /// Tags of all registered profiles, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// The profile that manages `spec`, if any
    pub fn qualify(&self, spec: &CustomSecretSpec) -> Result<&CredentialProfile, Disqualification> {
        let profile = self
            .profiles
            .get(&spec.profile)
            .ok_or_else(|| Disqualification::UnknownProfile(spec.profile.clone()))?;
        let violations = spec.violations();
        if !violations.is_empty() {
            return Err(Disqualification::OutOfBounds(violations));
        }
        profile.check(spec)?;
        Ok(profile)
    }
}
