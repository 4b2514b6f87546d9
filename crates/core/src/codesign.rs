// core/codesign.rs
// Outcome of verifying one executable's static code signature

use serde::{Serialize, Serializer};
use std::fmt;

/// Overall signature verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Unsigned,
    Good,
    Bad,
    Error,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Unsigned => "unsigned",
            Verdict::Good => "good",
            Verdict::Bad => "bad",
            Verdict::Error => "error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signing authority whose requirement the signature satisfied,
/// in registry priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    #[serde(rename = "system")]
    AppleSystem,
    #[serde(rename = "appstore")]
    MacAppStore,
    #[serde(rename = "devid")]
    DeveloperId,
    #[serde(rename = "generic")]
    AppleGeneric,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::AppleSystem => "system",
            Origin::MacAppStore => "appstore",
            Origin::DeveloperId => "devid",
            Origin::AppleGeneric => "generic",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one code-signature evaluation.
///
/// `origin` is only ever set on a good verdict. Ad-hoc signatures match no
/// trust requirement and are reported as bad, not unsigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodesignResult {
    #[serde(rename = "signature")]
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
    /// Platform status code behind an error verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<i32>,
    #[serde(rename = "ident", skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_cdhash"
    )]
    pub cdhash: Option<Vec<u8>>,
    #[serde(rename = "teamid", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(rename = "devid", skip_serializing_if = "Option::is_none")]
    pub developer_id: Option<String>,
}

impl CodesignResult {
    fn with_verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            origin: None,
            error: None,
            identifier: None,
            cdhash: None,
            team_id: None,
            developer_id: None,
        }
    }

    pub fn unsigned() -> Self {
        Self::with_verdict(Verdict::Unsigned)
    }

    pub fn bad() -> Self {
        Self::with_verdict(Verdict::Bad)
    }

    pub fn error(status: i32) -> Self {
        Self {
            error: Some(status),
            ..Self::with_verdict(Verdict::Error)
        }
    }

    pub fn good(origin: Origin, identifier: String) -> Self {
        Self {
            origin: Some(origin),
            identifier: Some(identifier),
            ..Self::with_verdict(Verdict::Good)
        }
    }

    /// Deep, independent copy for callers that keep a result beyond the
    /// verifying call.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn cdhash_hex(&self) -> Option<String> {
        self.cdhash.as_deref().map(hex::encode)
    }
}

fn serialize_cdhash<S: Serializer>(cdhash: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match cdhash {
        Some(bytes) => s.serialize_str(&hex::encode(bytes)),
        None => s.serialize_none(),
    }
}

impl fmt::Display for CodesignResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "signature: {}", self.verdict)?;
        if let Some(origin) = self.origin {
            writeln!(f, "origin: {}", origin)?;
        }
        if let Some(error) = self.error {
            writeln!(f, "error: {}", error)?;
        }
        if let Some(ident) = &self.identifier {
            writeln!(f, "ident: {}", ident)?;
        }
        if let Some(cdhash) = self.cdhash_hex() {
            writeln!(f, "cdhash: {}", cdhash)?;
        }
        if let Some(team_id) = &self.team_id {
            writeln!(f, "teamid: {}", team_id)?;
        }
        if let Some(devid) = &self.developer_id {
            writeln!(f, "devid: {}", devid)?;
        }
        Ok(())
    }
}
