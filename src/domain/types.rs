//! Core identifier types
//!
//! The two supported CMPs use different id namespaces: LiveRamp addresses
//! vendors and purposes by small integers (IAB TCF numbering), Sourcepoint by
//! opaque object ids. Which scheme applies is always decided by the backend,
//! never guessed from the shape of a value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConsentError, Result};

/// Supported consent management platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmpBackend {
    /// LiveRamp (numeric ids, library-side AND over purposes)
    LiveRamp,
    /// Sourcepoint (opaque ids, caller-side OR over vendor/purposes)
    Sourcepoint,
}

impl CmpBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpBackend::LiveRamp => "liveramp",
            CmpBackend::Sourcepoint => "sourcepoint",
        }
    }

    /// Parse a vendor id in this backend's namespace.
    pub fn parse_vendor_id(&self, raw: &str) -> Result<VendorId> {
        self.parse_id(raw, "vendor").map(|id| match id {
            RawId::Numeric(n) => VendorId::Numeric(n),
            RawId::Opaque(s) => VendorId::Opaque(s),
        })
    }

    /// Parse a purpose id in this backend's namespace.
    pub fn parse_purpose_id(&self, raw: &str) -> Result<PurposeId> {
        self.parse_id(raw, "purpose").map(|id| match id {
            RawId::Numeric(n) => PurposeId::Numeric(n),
            RawId::Opaque(s) => PurposeId::Opaque(s),
        })
    }

    /// Parse a comma-separated purpose list as carried by markup attributes.
    ///
    /// Empty segments are skipped; any malformed entry fails the whole list.
    pub fn parse_purpose_list(&self, raw: &str) -> Result<Vec<PurposeId>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.parse_purpose_id(s))
            .collect()
    }

    fn parse_id(&self, raw: &str, kind: &'static str) -> Result<RawId> {
        let trimmed = raw.trim();
        let invalid = || ConsentError::InvalidId {
            backend: *self,
            kind,
            value: raw.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid());
        }
        match self {
            CmpBackend::LiveRamp => trimmed
                .parse::<u32>()
                .map(RawId::Numeric)
                .map_err(|_| invalid()),
            CmpBackend::Sourcepoint => Ok(RawId::Opaque(trimmed.to_string())),
        }
    }
}

enum RawId {
    Numeric(u32),
    Opaque(String),
}

impl fmt::Display for CmpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CmpBackend {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "liveramp" => Ok(CmpBackend::LiveRamp),
            "sourcepoint" => Ok(CmpBackend::Sourcepoint),
            other => Err(ConsentError::Configuration(format!(
                "unknown cmp backend {other:?} (expected liveramp or sourcepoint)"
            ))),
        }
    }
}

/// Backend-specific vendor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VendorId {
    Numeric(u32),
    Opaque(String),
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorId::Numeric(n) => write!(f, "{n}"),
            VendorId::Opaque(s) => f.write_str(s),
        }
    }
}

/// Backend-specific purpose identifier
///
/// Ordering is numeric for the legacy scheme and lexicographic for opaque
/// ids, which is what "ascending" means for each registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PurposeId {
    Numeric(u32),
    Opaque(String),
}

impl fmt::Display for PurposeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurposeId::Numeric(n) => write!(f, "{n}"),
            PurposeId::Opaque(s) => f.write_str(s),
        }
    }
}

/// Join purpose ids the way markup attributes carry them.
pub fn join_purpose_ids(ids: &[PurposeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Reference to a vendor, either by stable name or by backend id.
///
/// Callers state which one they mean; nothing is inferred from whether the
/// value looks numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum VendorRef {
    ByName(String),
    ById(String),
}

impl VendorRef {
    pub fn name(name: impl Into<String>) -> Self {
        VendorRef::ByName(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        VendorRef::ById(id.into())
    }

    /// Decode an explicitly tagged reference (`name:<key>` or `id:<value>`).
    ///
    /// Untagged values are ids, because that is what the gated markup
    /// contract carries in its vendor attribute.
    pub fn parse_attr(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix("name:") {
            VendorRef::ByName(name.trim().to_string())
        } else if let Some(id) = raw.strip_prefix("id:") {
            VendorRef::ById(id.trim().to_string())
        } else {
            VendorRef::ById(raw.to_string())
        }
    }
}

impl fmt::Display for VendorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorRef::ByName(n) => write!(f, "name:{n}"),
            VendorRef::ById(i) => write!(f, "id:{i}"),
        }
    }
}

/// Stable identity of a mounted page element, supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey(pub String);

impl ElementKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of the `index`-th element nested inside this one.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}/{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
