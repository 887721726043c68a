//! Markup contracts shared by the rewrite transform and the controllers
//!
//! - [`GatedContentMarkup`]: the canonical gated-content structure
//!   (placeholder, toggle, injected-content slot)
//! - [`StagedScriptTag`]: non-executing script tags waiting for consent
//! - [`Tag`]: minimal opening-tag parser/serializer used by both
//!
//! Scanning is regex based and only understands the shapes this crate emits
//! or gates (iframes, gated containers, staged scripts); it is not a general
//! HTML parser.

use crate::domain::{CmpBackend, PurposeId, VendorId};
use crate::error::Result;

mod gated;
mod script_tag;
mod tag;

pub use gated::{GatedContentMarkup, MarkupAttributes, ParsedGatedContent};
pub use script_tag::{LiveScriptTag, StagedScriptTag};
pub use tag::{escape_attr, escape_text, unescape, Tag};

/// Default prefix of every data attribute in the markup contract
pub const DEFAULT_ATTRIBUTE_PREFIX: &str = "data-cmp";

/// Resolve raw vendor/purpose attributes in a backend's id namespace.
///
/// An empty vendor attribute means "no vendor"; a malformed one is an
/// error, never silently reinterpreted.
pub(crate) fn parse_criteria(
    backend: CmpBackend,
    vendor: Option<&str>,
    purposes: Option<&str>,
) -> Result<(Option<VendorId>, Vec<PurposeId>)> {
    let vendor = match vendor.map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(backend.parse_vendor_id(raw)?),
    };
    let purposes = match purposes {
        None => Vec::new(),
        Some(raw) => backend.parse_purpose_list(raw)?,
    };
    Ok((vendor, purposes))
}
