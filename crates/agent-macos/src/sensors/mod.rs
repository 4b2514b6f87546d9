/// macOS sensor modules
///
/// - bsm/: OpenBSM audit records → edr_core::AuditEvent
/// - codesign/: executable signature → edr_core::CodesignResult
pub mod bsm;
pub mod codesign;
