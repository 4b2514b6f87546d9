// core/error.rs
// Error types shared by the event model and its builders

use thiserror::Error;

/// A bounded sequence was already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("capacity of {capacity} exceeded")]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// Failure while packing a compact string vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StringVecError {
    #[error("out of memory while packing {entries} entries ({bytes} bytes)")]
    OutOfMemory { entries: usize, bytes: usize },
}

/// A token tried to populate an event in a way the record format forbids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A singleton section (subject, process, return, ...) appeared twice.
    #[error("duplicate {0} token")]
    Duplicate(&'static str),
    /// An argument token addressed a slot outside the argument array.
    #[error("argument index {index} out of range (max {max})")]
    ArgIndexOutOfRange { index: u8, max: usize },
    /// An argument slot was populated twice.
    #[error("argument {0} already present")]
    ArgAlreadyPresent(u8),
    /// A bounded section overflowed.
    #[error("too many {section} tokens ({source})")]
    TooMany {
        section: &'static str,
        #[source]
        source: CapacityExceeded,
    },
}
