//! Vendor and purpose definitions

use serde::{Deserialize, Serialize};

use super::{PurposeId, VendorId};

/// A third party whose content or scripts are gated behind consent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Stable machine name, unique within a registry
    pub name: String,
    /// Backend id, unique within a registry
    pub id: VendorId,
    /// Human-readable label
    pub label: String,
    /// Label for the in-page consent toggle, if the vendor has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_label: Option<String>,
    /// Required purposes, sorted and de-duplicated, baseline included
    pub purpose_ids: Vec<PurposeId>,
}

impl Vendor {
    pub fn new(
        name: impl Into<String>,
        id: VendorId,
        label: impl Into<String>,
        toggle_label: Option<&str>,
        purpose_ids: Vec<PurposeId>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            label: label.into(),
            toggle_label: toggle_label.map(str::to_string),
            purpose_ids,
        }
    }
}

/// A declared data-processing purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purpose {
    pub id: PurposeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Purpose {
    pub fn new(id: PurposeId, label: &str) -> Self {
        Self {
            id,
            label: Some(label.to_string()),
        }
    }
}
