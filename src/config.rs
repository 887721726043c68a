//! Resolved gate configuration

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::activation::ScriptEntry;
use crate::domain::{CmpBackend, PurposeId, VendorId, VendorRef};
use crate::error::{ConsentError, Result};
use crate::markup::DEFAULT_ATTRIBUTE_PREFIX;
use crate::registry::VendorPurposeRegistry;

/// Default broadcast capacity for CMP events and state changes.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// External configuration surface of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// CMP backend in use on the site.
    pub backend: CmpBackend,
    /// LiveRamp loader script URL.
    pub script_url: Option<String>,
    /// Sourcepoint privacy manager id.
    pub privacy_manager_id: Option<u64>,
    /// Suppress the consent UI on this page (imprint, privacy policy).
    pub disable_privacy_manager: bool,
    /// Prefix of the markup contract attributes.
    pub attribute_prefix: String,
    /// Broadcast channel capacity.
    pub event_buffer: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            backend: CmpBackend::LiveRamp,
            script_url: None,
            privacy_manager_id: None,
            disable_privacy_manager: false,
            attribute_prefix: DEFAULT_ATTRIBUTE_PREFIX.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl GateConfig {
    pub fn new(backend: CmpBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable values are errors; absent ones take defaults.
    pub fn from_env() -> Result<Self> {
        let backend = match std::env::var("CMP_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => CmpBackend::LiveRamp,
        };

        let script_url = std::env::var("CMP_SCRIPT_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let privacy_manager_id = match std::env::var("CMP_PRIVACY_MANAGER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                ConsentError::Configuration(format!("invalid CMP_PRIVACY_MANAGER_ID: {raw:?}"))
            })?),
            _ => None,
        };

        let disable_privacy_manager = std::env::var("CMP_DISABLE_PRIVACY_MANAGER")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let attribute_prefix = std::env::var("CMP_ATTRIBUTE_PREFIX")
            .unwrap_or_else(|_| DEFAULT_ATTRIBUTE_PREFIX.to_string());

        let event_buffer = std::env::var("CMP_EVENT_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_EVENT_BUFFER);

        let config = Self {
            backend,
            script_url,
            privacy_manager_id,
            disable_privacy_manager,
            attribute_prefix,
            event_buffer,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == CmpBackend::Sourcepoint && self.privacy_manager_id.is_none() {
            return Err(ConsentError::Configuration(
                "sourcepoint requires a privacy manager id".into(),
            ));
        }
        if let Some(url) = &self.script_url {
            if !is_script_url(url) {
                return Err(ConsentError::Configuration(format!(
                    "invalid script url: {url:?}"
                )));
            }
        }
        if self.attribute_prefix.trim_end_matches('-').is_empty() {
            return Err(ConsentError::Configuration(
                "attribute prefix must not be empty".into(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConsentError::Configuration(
                "event buffer must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Absolute http(s) or protocol-relative URL with a host.
fn is_script_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("//"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !url.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Vendor or purpose as written in the script table: a JSON number or string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TableId {
    Number(u64),
    Text(String),
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableId::Number(n) => write!(f, "{n}"),
            TableId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptOptions {
    pub vendor: Option<TableId>,
    #[serde(default)]
    pub purposes: Vec<TableId>,
    #[serde(default = "default_recheck")]
    pub recheck_on_change: bool,
}

fn default_recheck() -> bool {
    true
}

/// Declarative `{group → {url → {vendor, purposes}}}` script table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ScriptTable {
    groups: BTreeMap<String, BTreeMap<String, ScriptOptions>>,
}

impl ScriptTable {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every entry against `registry`.
    ///
    /// Numbers and untagged strings are ids in the registry's backend
    /// namespace; `name:<key>` must name a catalogued vendor.
    pub fn resolve(&self, registry: &VendorPurposeRegistry) -> Result<Vec<ScriptEntry>> {
        let backend = registry.backend();
        let mut entries = Vec::with_capacity(self.len());
        for (group, files) in &self.groups {
            for (url, options) in files {
                let vendor_id = options
                    .vendor
                    .as_ref()
                    .map(|v| resolve_vendor(registry, v))
                    .transpose()?;
                let purpose_ids = options
                    .purposes
                    .iter()
                    .map(|p| backend.parse_purpose_id(&p.to_string()))
                    .collect::<Result<Vec<PurposeId>>>()?;
                entries.push(ScriptEntry {
                    group: group.clone(),
                    url: url.clone(),
                    vendor_id,
                    purpose_ids,
                    recheck_on_change: options.recheck_on_change,
                });
            }
        }
        Ok(entries)
    }
}

fn resolve_vendor(registry: &VendorPurposeRegistry, raw: &TableId) -> Result<VendorId> {
    let reference = match raw {
        TableId::Number(n) => VendorRef::id(n.to_string()),
        TableId::Text(s) => VendorRef::parse_attr(s),
    };
    match &reference {
        VendorRef::ByName(_) => Ok(registry.require(&reference)?.id.clone()),
        // Uncatalogued ids are still valid query targets.
        VendorRef::ById(id) => match registry.resolve(&reference) {
            Some(vendor) => Ok(vendor.id.clone()),
            None => registry.backend().parse_vendor_id(id),
        },
    }
}
