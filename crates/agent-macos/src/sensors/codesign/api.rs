// macos/sensors/codesign/api.rs
// Platform code-signing primitives the verifier is written against

use bitflags::bitflags;
use std::path::Path;

/// Security framework status code (`OSStatus`).
pub type OsStatus = i32;

/// `errSecCSUnsigned`: the code carries no signature at all.
pub const ERR_SEC_CS_UNSIGNED: OsStatus = -67062;
/// `errSecCSInternalError`
pub const ERR_SEC_CS_INTERNAL: OsStatus = -67048;

bitflags! {
    /// `SecCSFlags` bits used for static validity checks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ValidityFlags: u32 {
        const CHECK_ALL_ARCHITECTURES = 1 << 0;
        const CHECK_NESTED_CODE = 1 << 3;
        const STRICT_VALIDATE = 1 << 4;
        const ENFORCE_REVOCATION_CHECKS = 1 << 30;
        const CONSIDER_EXPIRATION = 1 << 31;
    }
}

impl ValidityFlags {
    /// Full validation against the designated requirement.
    pub const FULL: Self = Self::CHECK_ALL_ARCHITECTURES
        .union(Self::STRICT_VALIDATE)
        .union(Self::CHECK_NESTED_CODE)
        .union(Self::ENFORCE_REVOCATION_CHECKS)
        .union(Self::CONSIDER_EXPIRATION);

    /// Requirement matching only; the expensive checks already ran with `FULL`.
    pub const REQUIREMENT_ONLY: Self = Self::CHECK_ALL_ARCHITECTURES.union(Self::STRICT_VALIDATE);
}

/// Why static code could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    Status(OsStatus),
    /// The path cannot be expressed as a platform file URL.
    InvalidPath,
}

/// Fields the verifier reads from the signing-information dictionary.
/// Values of the wrong type are reported as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningInformation<C> {
    pub identifier: Option<String>,
    /// CDHash
    pub unique: Option<Vec<u8>>,
    pub team_identifier: Option<String>,
    /// First certificate of the chain, `None` when the chain is absent or empty.
    pub leaf_certificate: Option<C>,
}

impl<C> Default for SigningInformation<C> {
    fn default() -> Self {
        Self {
            identifier: None,
            unique: None,
            team_identifier: None,
            leaf_certificate: None,
        }
    }
}

/// Code-signing backend. `macos::SecurityFramework` is the real one; tests
/// script their own.
pub trait CodeSigningApi {
    type StaticCode;
    type Requirement;
    type Certificate;

    fn compile_requirement(&self, text: &str) -> Result<Self::Requirement, OsStatus>;

    fn create_static_code(&self, path: &Path) -> Result<Self::StaticCode, OpenError>;

    fn designated_requirement(&self, code: &Self::StaticCode)
        -> Result<Self::Requirement, OsStatus>;

    fn check_validity(
        &self,
        code: &Self::StaticCode,
        flags: ValidityFlags,
        requirement: &Self::Requirement,
    ) -> Result<(), OsStatus>;

    fn signing_information(
        &self,
        code: &Self::StaticCode,
    ) -> Result<SigningInformation<Self::Certificate>, OsStatus>;

    /// Human-readable subject summary; `None` if it cannot be rendered.
    fn certificate_summary(&self, certificate: &Self::Certificate) -> Option<String>;
}
