// macos/sensors/codesign/requirements.rs
// Trust requirements that classify a valid signature's origin

use crate::sensors::codesign::api::CodeSigningApi;
use crate::sensors::codesign::CodesignError;
use edr_core::Origin;
use tracing::info;

/// Requirement source text per origin, most specific authority first.
pub const TRUST_REQUIREMENTS: [(Origin, &str); 4] = [
    (Origin::AppleSystem, "anchor apple"),
    (
        Origin::MacAppStore,
        "anchor apple generic and certificate leaf[field.1.2.840.113635.100.6.1.9] exists",
    ),
    (
        Origin::DeveloperId,
        "anchor apple generic and certificate 1[field.1.2.840.113635.100.6.2.6] exists \
         and certificate leaf[field.1.2.840.113635.100.6.1.13] exists",
    ),
    (Origin::AppleGeneric, "anchor apple generic"),
];

/// Compiled requirements in priority order. Immutable once built.
pub struct TrustRegistry<R> {
    entries: Vec<(Origin, R)>,
}

impl<R> TrustRegistry<R> {
    /// Compile every requirement; the first failure aborts.
    pub fn compile<A>(api: &A) -> Result<Self, CodesignError>
    where
        A: CodeSigningApi<Requirement = R>,
    {
        let entries = TRUST_REQUIREMENTS
            .iter()
            .map(|&(origin, text)| {
                api.compile_requirement(text)
                    .map(|req| (origin, req))
                    .map_err(|status| CodesignError::Registry { origin, status })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = entries.len(), "code signing trust requirements compiled");
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Origin, &R)> {
        self.entries.iter().map(|(origin, req)| (*origin, req))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
