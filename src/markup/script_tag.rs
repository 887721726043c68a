//! Staged (non-executing) script tags
//!
//! Browsers pre-fetch any `<script src>` they see, so gated scripts are
//! shipped as `<script type="text/plain" data-src="...">` and only turned
//! into live tags once consent is granted.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{CmpBackend, PurposeId, VendorId};
use crate::error::{ConsentError, Result};

use super::gated::MarkupAttributes;
use super::tag::Tag;

static SCRIPT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<script\b[^>]*>)(.*?)</script\s*>").expect("invalid script pattern")
});

/// Attribute carrying the real source of a staged script
pub const STAGED_SOURCE_ATTRIBUTE: &str = "data-src";

/// Script type that makes a tag executable
pub const LIVE_SCRIPT_TYPE: &str = "application/javascript";

/// A gated script tag as found in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedScriptTag {
    tag: Tag,
    body: String,
    vendor: Option<String>,
    purposes: Option<String>,
}

impl StagedScriptTag {
    /// Find every staged script carrying the conditional-scripts marker.
    pub fn scan(html: &str, attrs: &MarkupAttributes) -> (Vec<Self>, Vec<ConsentError>) {
        let mut found = Vec::new();
        let mut errors = Vec::new();
        for caps in SCRIPT_ELEMENT.captures_iter(html) {
            match Tag::parse(&caps[1]) {
                Ok(tag) if tag.has(&attrs.scripts) => {
                    found.push(Self::from_tag(tag, caps[2].to_string(), attrs));
                }
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }
        (found, errors)
    }

    pub fn from_tag(tag: Tag, body: String, attrs: &MarkupAttributes) -> Self {
        let vendor = tag.get(&attrs.script_vendor).map(str::to_string);
        let purposes = tag.get(&attrs.script_purposes).map(str::to_string);
        Self {
            tag,
            body,
            vendor,
            purposes,
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// The stashed real source, if this is an external script.
    pub fn staged_source(&self) -> Option<&str> {
        self.tag
            .get(STAGED_SOURCE_ATTRIBUTE)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn raw_vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    /// Vendor and purposes in a backend's namespace.
    pub fn criteria(&self, backend: CmpBackend) -> Result<(Option<VendorId>, Vec<PurposeId>)> {
        super::parse_criteria(backend, self.vendor.as_deref(), self.purposes.as_deref())
    }

    /// Clone into a live tag: promote the staged source and make it
    /// executable. The staged tag itself is left untouched.
    pub fn promote(&self) -> LiveScriptTag {
        let mut tag = self.tag.clone();
        if let Some(src) = self.staged_source() {
            tag.set("src", src.to_string());
        }
        tag.set("type", LIVE_SCRIPT_TYPE);
        LiveScriptTag {
            tag,
            body: self.body.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!("{}{}</script>", self.tag.render(), self.body)
    }
}

/// An executable script tag produced from a staged one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveScriptTag {
    tag: Tag,
    body: String,
}

impl LiveScriptTag {
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn src(&self) -> Option<&str> {
        self.tag.get("src")
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn render(&self) -> String {
        format!("{}{}</script>", self.tag.render(), self.body)
    }
}
