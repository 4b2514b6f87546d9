// agent-macos lib.rs
// macOS sensor library - OpenBSM audit decoding and code-signature verification

pub mod sensors;

// Re-export key types
pub use sensors::bsm;
pub use sensors::bsm::{BsmReader, DecoderConfig, EnvCapture, EventFilter, Outcome};
pub use sensors::codesign;
pub use sensors::codesign::CodesignVerifier;
