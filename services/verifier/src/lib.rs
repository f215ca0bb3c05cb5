//! # FIX Replay Verifier
//!
//! Compares every replayed FIX message from the bus against its recorded
//! original and streams per-order verdicts to WebSocket subscribers.
//!
//! ```text
//! original log ──► index ─┐
//!                         ▼
//! bus ──► consumer ──► coordinator workers ──► publisher ──► subscriber queues ──► WebSocket / file
//! ```
//!
//! - [`index`]: original index built at startup (in-memory or byte-offset)
//! - [`bus`]: replay sources and acknowledgement
//! - [`coordinator`]: per-message join, compare and publish protocol
//! - [`publisher`] / [`subscriber`]: isolated fan-out with per-subscriber lag policy
//! - [`server`]: `/ws` upgrade, `/health`, `/status`
//! - [`service`]: startup and ordered shutdown

pub mod bus;
pub mod coordinator;
pub mod counters;
pub mod error;
pub mod index;
pub mod publisher;
pub mod server;
pub mod service;
pub mod sink;
pub mod state;
pub mod subscriber;

pub use coordinator::{Coordinator, Outcome};
pub use error::{BusError, IndexError, Result, VerifierError};
pub use index::{build_index, IndexStats, MemoryIndex, OffsetIndex, OriginalIndex};
pub use service::{RunningService, ServiceOptions, VerifierService};
pub use subscriber::{PublisherStats, SubscriberRegistry};
