//! Error types for the replay verifier

use std::path::PathBuf;
use thiserror::Error;

/// Original index build and lookup failures
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot open original log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while scanning original log: {0}")]
    Io(#[from] std::io::Error),

    #[error("entry for `{key}` points outside the mapped log ({offset}+{len} > {size})")]
    OutOfRange {
        key: String,
        offset: usize,
        len: usize,
        size: usize,
    },
}

/// Message bus transport failures
#[derive(Debug, Error)]
pub enum BusError {
    #[error("cannot connect to broker {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("broker rejected credentials: {0}")]
    Auth(String),

    #[error("broker rejected subscription to `{topic}`: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("unexpected broker reply: {0}")]
    Protocol(String),

    #[error("bus IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("broker closed the connection")]
    Closed,

    #[error("gave up after {attempts} reconnect attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl BusError {
    /// Whether the reconnect loop may try again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BusError::Connect { .. } | BusError::Io(_) | BusError::Closed | BusError::Protocol(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] warp::Error),

    #[error("Subscriber limit reached ({0})")]
    SubscriberLimit(usize),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, VerifierError>;
