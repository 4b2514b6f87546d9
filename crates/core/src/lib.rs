//! Shared data model for the macOS ingestion core.
//!
//! - `event`: one decoded OpenBSM audit record (`AuditEvent`)
//! - `bounded`: fixed-capacity sequences whose overflow rejects the record
//! - `string_vec`: compact argv/env vectors captured from exec tokens
//! - `codesign`: code-signature verdicts and trust origins

pub mod bounded;
pub mod codesign;
pub mod error;
pub mod event;
pub mod string_vec;

pub use bounded::Bounded;
pub use codesign::{CodesignResult, Origin, Verdict};
pub use error::{CapacityExceeded, EventError, StringVecError};
pub use event::{
    AuditEvent, ExitPair, FileAttr, Identity, ReturnPair, SocketEndpoint, Timestamp, MAX_ARGS,
    MAX_ATTRS, MAX_PATHS, MAX_TEXTS, MAX_UNKNOWN_TOKENS,
};
pub use string_vec::CompactStrings;
