//! # Verifier Configuration
//!
//! Loads the verifier's `.properties` file, layers `FIXVERIFY_*` environment
//! variables and CLI overrides on top, applies defaults and validates the
//! result into a typed [`VerifierConfig`].
//!
//! ## Usage
//!
//! ```rust
//! use config::{LagPolicy, VerifierConfig};
//!
//! let config = VerifierConfig::from_properties(
//!     "originalLogPath=/var/log/oms.log\ntopic_oms=fix/replay\nlagPolicy=disconnect",
//! )?;
//! assert_eq!(config.correlation_tag, "55");
//! assert_eq!(config.publisher.lag_policy, LagPolicy::Disconnect);
//! # Ok::<(), config::ConfigError>(())
//! ```

pub mod error;
pub mod properties;
pub mod secret;
pub mod verifier;

pub use error::{ConfigError, Result};
pub use properties::PropertiesFile;
pub use secret::{PlainSecret, Secret, SecretDecoder};
pub use verifier::{
    BusConfig, CoordinatorConfig, IndexMode, LagPolicy, PublisherConfig, ReconnectSettings,
    ServerConfig, StreamConfig, VerifierConfig, DEFAULT_STREAM, ENV_PREFIX,
};
