//! Password handling

use crate::error::Result;
use std::fmt;

/// A credential that never shows up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Hook for stored passwords that are encrypted at rest.
pub trait SecretDecoder: Send + Sync {
    fn decode(&self, stored: &str) -> Result<Secret>;
}

/// Stored value is the password
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSecret;

impl SecretDecoder for PlainSecret {
    fn decode(&self, stored: &str) -> Result<Secret> {
        Ok(Secret::new(stored))
    }
}
