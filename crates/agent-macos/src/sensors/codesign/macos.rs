// macos/sensors/codesign/macos.rs
// Security.framework binding for CodeSigningApi

use crate::sensors::codesign::api::{
    CodeSigningApi, OpenError, OsStatus, SigningInformation, ValidityFlags, ERR_SEC_CS_INTERNAL,
};
use core_foundation::array::CFArray;
use core_foundation::base::{CFType, TCFType};
use core_foundation::data::CFData;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_foundation::url::CFURL;
use core_foundation::{declare_TCFType, impl_TCFType};
use core_foundation_sys::base::CFTypeID;
use core_foundation_sys::dictionary::CFDictionaryRef;
use core_foundation_sys::string::CFStringRef;
use core_foundation_sys::url::CFURLRef;
use std::path::Path;
use std::ptr;

pub enum __SecStaticCode {}
pub type SecStaticCodeRef = *mut __SecStaticCode;
pub enum __SecRequirement {}
pub type SecRequirementRef = *mut __SecRequirement;
pub enum __SecCertificate {}
pub type SecCertificateRef = *mut __SecCertificate;

const ERR_SEC_SUCCESS: OsStatus = 0;
const SEC_CS_DEFAULT_FLAGS: u32 = 0;

// SecCSFlags for SecCodeCopySigningInformation
const SEC_CS_INTERNAL_INFORMATION: u32 = 1 << 0;
const SEC_CS_SIGNING_INFORMATION: u32 = 1 << 1;
const SEC_CS_REQUIREMENT_INFORMATION: u32 = 1 << 2;

#[link(name = "Security", kind = "framework")]
extern "C" {
    static kSecCodeInfoIdentifier: CFStringRef;
    static kSecCodeInfoUnique: CFStringRef;
    static kSecCodeInfoTeamIdentifier: CFStringRef;
    static kSecCodeInfoCertificates: CFStringRef;

    fn SecStaticCodeGetTypeID() -> CFTypeID;
    fn SecRequirementGetTypeID() -> CFTypeID;
    fn SecCertificateGetTypeID() -> CFTypeID;

    fn SecStaticCodeCreateWithPath(
        path: CFURLRef,
        flags: u32,
        static_code: *mut SecStaticCodeRef,
    ) -> OsStatus;
    fn SecCodeCopyDesignatedRequirement(
        code: SecStaticCodeRef,
        flags: u32,
        requirement: *mut SecRequirementRef,
    ) -> OsStatus;
    fn SecStaticCodeCheckValidity(
        code: SecStaticCodeRef,
        flags: u32,
        requirement: SecRequirementRef,
    ) -> OsStatus;
    fn SecCodeCopySigningInformation(
        code: SecStaticCodeRef,
        flags: u32,
        information: *mut CFDictionaryRef,
    ) -> OsStatus;
    fn SecRequirementCreateWithString(
        text: CFStringRef,
        flags: u32,
        requirement: *mut SecRequirementRef,
    ) -> OsStatus;
    fn SecCertificateCopySubjectSummary(certificate: SecCertificateRef) -> CFStringRef;
}

declare_TCFType!(SecStaticCode, SecStaticCodeRef);
impl_TCFType!(SecStaticCode, SecStaticCodeRef, SecStaticCodeGetTypeID);

declare_TCFType!(SecRequirement, SecRequirementRef);
impl_TCFType!(SecRequirement, SecRequirementRef, SecRequirementGetTypeID);

declare_TCFType!(SecCertificate, SecCertificateRef);
impl_TCFType!(SecCertificate, SecCertificateRef, SecCertificateGetTypeID);

// Requirement objects are immutable after creation.
unsafe impl Send for SecRequirement {}
unsafe impl Sync for SecRequirement {}

/// Code-signing backend over the system Security framework.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityFramework;

fn status(rv: OsStatus) -> Result<(), OsStatus> {
    if rv == ERR_SEC_SUCCESS {
        Ok(())
    } else {
        Err(rv)
    }
}

/// Wrap an out-parameter returned by a `Copy`/`Create` call.
fn created<T: TCFType>(raw: T::Ref, is_null: bool) -> Result<T, OsStatus> {
    if is_null {
        Err(ERR_SEC_CS_INTERNAL)
    } else {
        Ok(unsafe { T::wrap_under_create_rule(raw) })
    }
}

impl CodeSigningApi for SecurityFramework {
    type StaticCode = SecStaticCode;
    type Requirement = SecRequirement;
    type Certificate = SecCertificate;

    fn compile_requirement(&self, text: &str) -> Result<SecRequirement, OsStatus> {
        let text = CFString::new(text);
        let mut req: SecRequirementRef = ptr::null_mut();
        status(unsafe {
            SecRequirementCreateWithString(text.as_concrete_TypeRef(), SEC_CS_DEFAULT_FLAGS, &mut req)
        })?;
        created(req, req.is_null())
    }

    fn create_static_code(&self, path: &Path) -> Result<SecStaticCode, OpenError> {
        let url = CFURL::from_path(path, false).ok_or(OpenError::InvalidPath)?;
        let mut code: SecStaticCodeRef = ptr::null_mut();
        status(unsafe {
            SecStaticCodeCreateWithPath(url.as_concrete_TypeRef(), SEC_CS_DEFAULT_FLAGS, &mut code)
        })
        .map_err(OpenError::Status)?;
        created(code, code.is_null()).map_err(OpenError::Status)
    }

    fn designated_requirement(&self, code: &SecStaticCode) -> Result<SecRequirement, OsStatus> {
        let mut req: SecRequirementRef = ptr::null_mut();
        status(unsafe {
            SecCodeCopyDesignatedRequirement(
                code.as_concrete_TypeRef(),
                SEC_CS_DEFAULT_FLAGS,
                &mut req,
            )
        })?;
        created(req, req.is_null())
    }

    fn check_validity(
        &self,
        code: &SecStaticCode,
        flags: ValidityFlags,
        requirement: &SecRequirement,
    ) -> Result<(), OsStatus> {
        status(unsafe {
            SecStaticCodeCheckValidity(
                code.as_concrete_TypeRef(),
                flags.bits(),
                requirement.as_concrete_TypeRef(),
            )
        })
    }

    fn signing_information(
        &self,
        code: &SecStaticCode,
    ) -> Result<SigningInformation<SecCertificate>, OsStatus> {
        let mut raw: CFDictionaryRef = ptr::null();
        status(unsafe {
            SecCodeCopySigningInformation(
                code.as_concrete_TypeRef(),
                SEC_CS_SIGNING_INFORMATION
                    | SEC_CS_INTERNAL_INFORMATION
                    | SEC_CS_REQUIREMENT_INFORMATION,
                &mut raw,
            )
        })?;
        if raw.is_null() {
            return Err(ERR_SEC_CS_INTERNAL);
        }
        let dict: CFDictionary<CFString, CFType> = unsafe { TCFType::wrap_under_create_rule(raw) };

        let lookup = |key: CFStringRef| -> Option<CFType> {
            let key = unsafe { CFString::wrap_under_get_rule(key) };
            dict.find(&key).map(|value| (*value).clone())
        };

        let identifier = unsafe { lookup(kSecCodeInfoIdentifier) }
            .and_then(|v| v.downcast::<CFString>())
            .map(|s| s.to_string());
        let unique = unsafe { lookup(kSecCodeInfoUnique) }
            .and_then(|v| v.downcast::<CFData>())
            .map(|d| d.bytes().to_vec());
        let team_identifier = unsafe { lookup(kSecCodeInfoTeamIdentifier) }
            .and_then(|v| v.downcast::<CFString>())
            .map(|s| s.to_string());
        let leaf_certificate = unsafe { lookup(kSecCodeInfoCertificates) }
            .and_then(|v| v.downcast::<CFArray>())
            .and_then(|chain| {
                let leaf = *chain.get(0)?;
                unsafe { CFType::wrap_under_get_rule(leaf) }.downcast::<SecCertificate>()
            });

        Ok(SigningInformation {
            identifier,
            unique,
            team_identifier,
            leaf_certificate,
        })
    }

    fn certificate_summary(&self, certificate: &SecCertificate) -> Option<String> {
        let summary = unsafe { SecCertificateCopySubjectSummary(certificate.as_concrete_TypeRef()) };
        if summary.is_null() {
            return None;
        }
        let summary = unsafe { CFString::wrap_under_create_rule(summary) };
        Some(summary.to_string())
    }
}
