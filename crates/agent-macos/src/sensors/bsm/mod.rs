// macos/sensors/bsm/mod.rs
// BSM (OpenBSM) audit trail decoding
// Turns records from /dev/auditpipe or a trail file into edr_core::AuditEvent

pub mod bsm_events;
pub mod bsm_reader;
pub mod bsm_render;
pub mod bsm_socket;
pub mod bsm_tokens;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use bsm_events::{aue_code, aue_name};
pub use bsm_reader::{BsmReader, DecodeError, DecoderConfig, EnvCapture, EventFilter, Outcome};
pub use bsm_render::{render, render_to_string};
pub use bsm_socket::{sock_domain, sock_type};
