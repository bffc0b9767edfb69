//! # Credential Generator
//!
//! Produces secret values from the operating system's CSPRNG.
//!
//! A value for a requested length `n` is `n` random bytes rendered as a
//! lowercase hexadecimal string of `2n` characters.

use crate::constants::{SECRET_LENGTH_MAX, SECRET_LENGTH_MIN};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("requested secret length {requested} is outside {min}..={max} bytes")]
    InvalidLength { requested: u32, min: u32, max: u32 },
    #[error("entropy source could not supply {requested} random bytes: {source}")]
    Entropy {
        requested: u32,
        #[source]
        source: rand::Error,
    },
}

/// Source of fresh secret values
///
/// Implementations must either return a complete value or fail; a partial
/// value is never returned.
pub trait SecretGenerator: Send + Sync {
    /// Generate a secret from `length` random bytes
    fn generate(&self, length: u32) -> Result<String, GenerationError>;
}

/// Generator backed by `OsRng`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecretGenerator;

impl SecretGenerator for OsSecretGenerator {
    fn generate(&self, length: u32) -> Result<String, GenerationError> {
        let mut bytes = vec![0u8; checked_length(length)?];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|source| GenerationError::Entropy {
                requested: length,
                source,
            })?;
        Ok(hex::encode(bytes))
    }
}

/// Validate a requested length against the schema bounds
pub(crate) fn checked_length(length: u32) -> Result<usize, GenerationError> {
    if (SECRET_LENGTH_MIN..=SECRET_LENGTH_MAX).contains(&length) {
        // bounded by SECRET_LENGTH_MAX, always fits
        Ok(length as usize)
    } else {
        Err(GenerationError::InvalidLength {
            requested: length,
            min: SECRET_LENGTH_MIN,
            max: SECRET_LENGTH_MAX,
        })
    }
}
