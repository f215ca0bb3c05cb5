//! # Verifier Types
//!
//! Pure data structures shared by the codec, the verification pipeline and
//! the dashboard-facing server:
//!
//! - [`Verdict`] / [`VerdictStatus`] / [`TagMismatch`]: the outcome of one replay comparison
//! - [`Frame`]: everything the server pushes to a subscriber, with its JSON encoding
//! - [`StreamStats`]: read-only counter snapshot for one verification stream
//!
//! ## Wire shapes
//!
//! ```text
//! {"type":"RESULT","orderId":"VOD.L","status":"MISMATCH","tagMismatches":{"44":["12.5","12.6"]}}
//! {"type":"stats","processed":10,"mismatches":2,"remaining":7}
//! {"status":"COMPLETE"}
//! ```
//!
//! `tagMismatches` is always an object, empty for `MATCH` and `MISSING_IN_ORIGINAL`.

pub mod frame;
pub mod stats;
pub mod verdict;

pub use frame::{Frame, StatsFrame};
pub use stats::StreamStats;
pub use verdict::{TagMismatch, Verdict, VerdictStatus, MISSING};
