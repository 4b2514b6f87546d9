// macos/sensors/codesign/mod.rs
// Code-signature verification for executables seen by the sensors

pub mod api;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod requirements;
pub mod verifier;


use edr_core::Origin;
use thiserror::Error;

pub use api::{CodeSigningApi, OpenError, OsStatus, SigningInformation, ValidityFlags};
pub use requirements::{TrustRegistry, TRUST_REQUIREMENTS};
pub use verifier::CodesignVerifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodesignError {
    #[error("failed to compile {origin} trust requirement (status {status})")]
    Registry { origin: Origin, status: OsStatus },
    #[error("path cannot be converted to a file URL")]
    InvalidPath,
    #[error("out of memory while collecting signing information")]
    OutOfMemory,
}
