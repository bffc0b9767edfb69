//! # CustomSecret Status
//!
//! Observed state written by the controller after each create or rotation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Status of the CustomSecret resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomSecretStatus {
    /// Time the credential was last created or rotated (RFC3339)
    /// Absent until the first credential has been created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotation_time: Option<String>,
}

impl CustomSecretStatus {
    /// Status recording a rotation at `at`
    pub fn rotated_at(at: DateTime<Utc>) -> Self {
        Self {
            last_rotation_time: Some(format_rotation_time(at)),
        }
    }

    /// Parsed `lastRotationTime`
    ///
    /// An unparseable value is treated the same as an absent one.
    pub fn last_rotation(&self) -> Option<DateTime<Utc>> {
        self.last_rotation_time
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Render a timestamp the way the API server renders `metav1.Time`
pub fn format_rotation_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
