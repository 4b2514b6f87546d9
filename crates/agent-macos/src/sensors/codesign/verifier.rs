// macos/sensors/codesign/verifier.rs
// Static code-signature verification and origin classification

use crate::sensors::codesign::api::{
    CodeSigningApi, OpenError, ValidityFlags, ERR_SEC_CS_UNSIGNED,
};
use crate::sensors::codesign::requirements::TrustRegistry;
use crate::sensors::codesign::CodesignError;
use edr_core::{CodesignResult, Origin};
use std::path::Path;
use tracing::debug;

/// Verifies executables against their own designated requirement and then
/// classifies them through the trust registry.
///
/// Holds no per-call state; share it by reference.
pub struct CodesignVerifier<A: CodeSigningApi> {
    api: A,
    registry: TrustRegistry<A::Requirement>,
}

impl<A: CodeSigningApi> CodesignVerifier<A> {
    /// Compile the trust registry with `api` and take ownership of both.
    pub fn new(api: A) -> Result<Self, CodesignError> {
        let registry = TrustRegistry::compile(&api)?;
        Ok(Self { api, registry })
    }

    pub fn with_registry(api: A, registry: TrustRegistry<A::Requirement>) -> Self {
        Self { api, registry }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn registry(&self) -> &TrustRegistry<A::Requirement> {
        &self.registry
    }

    /// Evaluate the code at `path`.
    ///
    /// Every platform outcome becomes a verdict in the returned result.
    /// `Err` is reserved for a path that cannot be handed to the platform and
    /// for a developer certificate whose summary cannot be rendered; no
    /// partial result is returned then.
    pub fn verify(&self, path: &Path) -> Result<CodesignResult, CodesignError> {
        let code = match self.api.create_static_code(path) {
            Ok(code) => code,
            Err(OpenError::Status(status)) => {
                debug!(path = %path.display(), status, "cannot open static code");
                return Ok(CodesignResult::error(status));
            }
            Err(OpenError::InvalidPath) => return Err(CodesignError::InvalidPath),
        };

        let designated = match self.api.designated_requirement(&code) {
            Ok(req) => req,
            Err(ERR_SEC_CS_UNSIGNED) => return Ok(CodesignResult::unsigned()),
            Err(status) => return Ok(CodesignResult::error(status)),
        };

        if let Err(status) = self
            .api
            .check_validity(&code, ValidityFlags::FULL, &designated)
        {
            debug!(path = %path.display(), status, "signature invalid");
            return Ok(CodesignResult::bad());
        }

        let info = match self.api.signing_information(&code) {
            Ok(info) => info,
            Err(status) => return Ok(CodesignResult::error(status)),
        };
        let Some(identifier) = info.identifier else {
            return Ok(CodesignResult::bad());
        };

        // Ad-hoc signatures satisfy none of these and end up bad.
        let Some(origin) = self
            .registry
            .iter()
            .find(|(_, req)| {
                self.api
                    .check_validity(&code, ValidityFlags::REQUIREMENT_ONLY, req)
                    .is_ok()
            })
            .map(|(origin, _)| origin)
        else {
            debug!(path = %path.display(), %identifier, "no trust requirement matched");
            return Ok(CodesignResult::bad());
        };

        let mut result = CodesignResult::good(origin, identifier);
        result.cdhash = info.unique;
        if origin == Origin::AppleSystem {
            return Ok(result);
        }

        result.team_id = info.team_identifier;
        if origin == Origin::DeveloperId {
            if let Some(leaf) = &info.leaf_certificate {
                let summary = self
                    .api
                    .certificate_summary(leaf)
                    .ok_or(CodesignError::OutOfMemory)?;
                result.developer_id = Some(summary);
            }
        }
        Ok(result)
    }
}
