//! # FIX Codec
//!
//! The "rules" layer of the verifier: how a raw FIX payload is found,
//! split into fields, keyed, and compared.
//!
//! ## Contents
//! - [`normalize`]: delimiter dialects (`SOH`, `|`, literal `^A`, CR/LF) and the `8=FIX` locator
//! - [`TagMap`]: insertion-ordered `tag -> value` view, reusable across messages
//! - [`Tokenizer`]: raw bytes to [`TagMap`] plus the configured correlation key (default tag 55)
//! - [`Comparator`]: union-of-tags diff with an ignore set (default 9, 10, 52)
//!
//! ## What This Crate Does NOT Contain
//! - Checksum, body-length or session-level validation
//! - Repeating-group semantics (a duplicate tag keeps its last value)
//! - Any I/O
//!
//! ```
//! use codec::{Comparator, Tokenizer};
//!
//! let tokenizer = Tokenizer::default();
//! let (original, key) = tokenizer.tokenize(b"8=FIX.4.2^A35=D^A55=VOD.L^A44=12.5^A");
//! let (replay, _) = tokenizer.tokenize(b"8=FIX.4.2|35=D|55=VOD.L|44=12.6|");
//!
//! let verdict = Comparator::default().verdict(&key.unwrap(), &original, &replay);
//! assert_eq!(verdict.diff("44").unwrap().replay, "12.6");
//! ```

pub mod compare;
pub mod normalize;
pub mod tag_map;
pub mod tokenizer;

pub use compare::{tag_order, Comparator, DEFAULT_IGNORED_TAGS};
pub use normalize::{
    find_begin_string, find_message_start, fix_payload, normalize_delimiters, trim_segment,
    BEGIN_STRING, SOH,
};
pub use tag_map::TagMap;
pub use tokenizer::{Tokenizer, DEFAULT_CORRELATION_TAG};
