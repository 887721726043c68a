//! Canonical gated-content structure
//!
//! ```text
//! <div data-cmp-conditional-content="<captured markup>" data-cmp-vendor="ID"
//!      data-cmp-purposes="P1,P2" aria-expanded="false">
//!   <div data-cmp-conditional-content-placeholder>
//!     notice, [toggle], [open manager]
//!   </div>
//!   <div data-cmp-injected-content></div>
//! </div>
//! ```

use regex::Regex;

use crate::domain::{join_purpose_ids, CmpBackend, PurposeId, Vendor, VendorId};
use crate::error::{ConsentError, Result};

use super::tag::{escape_text, Tag};
use super::DEFAULT_ATTRIBUTE_PREFIX;

/// Attribute names of the markup contract, derived from one prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttributes {
    pub content: String,
    pub vendor: String,
    pub purposes: String,
    pub placeholder: String,
    pub injected: String,
    pub toggle: String,
    pub show_manager: String,
    pub open_privacy_manager: String,
    pub scripts: String,
    pub script_vendor: String,
    pub script_purposes: String,
}

impl MarkupAttributes {
    pub fn with_prefix(prefix: &str) -> Self {
        let p = prefix.trim_end_matches('-');
        Self {
            content: format!("{p}-conditional-content"),
            vendor: format!("{p}-vendor"),
            purposes: format!("{p}-purposes"),
            placeholder: format!("{p}-conditional-content-placeholder"),
            injected: format!("{p}-injected-content"),
            toggle: format!("{p}-toggle"),
            show_manager: format!("{p}-show-consent-manager"),
            open_privacy_manager: format!("{p}-open-privacy-manager"),
            scripts: format!("{p}-conditional-scripts"),
            script_vendor: format!("{p}-vendorid"),
            script_purposes: format!("{p}-purposeids"),
        }
    }
}

impl Default for MarkupAttributes {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ATTRIBUTE_PREFIX)
    }
}

/// A gated container found in markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGatedContent {
    /// Raw vendor attribute, if present
    pub vendor: Option<String>,
    /// Raw comma-separated purposes attribute, if present
    pub purposes: Option<String>,
    /// Captured markup, already entity-decoded
    pub content: String,
}

impl ParsedGatedContent {
    /// Resolve vendor and purposes in a backend's id namespace.
    pub fn criteria(&self, backend: CmpBackend) -> Result<(Option<VendorId>, Vec<PurposeId>)> {
        super::parse_criteria(backend, self.vendor.as_deref(), self.purposes.as_deref())
    }
}

/// Renders and scans the canonical gated-content structure
#[derive(Debug, Clone)]
pub struct GatedContentMarkup {
    attrs: MarkupAttributes,
    manager_label: String,
    container: Regex,
}

impl GatedContentMarkup {
    pub fn new(prefix: &str) -> Self {
        let attrs = MarkupAttributes::with_prefix(prefix);
        let container = Regex::new(&format!(
            r#"<[A-Za-z][A-Za-z0-9-]*\s[^>]*?\b{}\s*=[^>]*>"#,
            regex::escape(&attrs.content)
        ))
        .expect("escaped container pattern is valid");
        Self {
            attrs,
            manager_label: "Privacy settings".to_string(),
            container,
        }
    }

    /// Label of the per-element "open privacy manager" button.
    pub fn with_manager_label(mut self, label: impl Into<String>) -> Self {
        self.manager_label = label.into();
        self
    }

    pub fn attributes(&self) -> &MarkupAttributes {
        &self.attrs
    }

    /// Render the gated structure around `content` for `vendor`.
    pub fn render(&self, vendor: &Vendor, purposes: &[PurposeId], content: &str) -> String {
        let a = &self.attrs;

        let mut container = Tag::new("div");
        container.set("class", "cmp-conditional-content");
        container.set(&a.content, content);
        container.set(&a.vendor, vendor.id.to_string());
        container.set(&a.purposes, join_purpose_ids(purposes));
        container.set("aria-expanded", "false");

        let mut placeholder = Tag::new("div");
        placeholder.set("class", "cmp-conditional-content__placeholder");
        placeholder.set_flag(&a.placeholder);

        let mut out = String::with_capacity(content.len() * 2 + 512);
        out.push_str(&container.render());
        out.push_str(&placeholder.render());
        out.push_str("<p class=\"cmp-conditional-content__notice\">");
        out.push_str(&escape_text(&vendor.label));
        out.push_str("</p>");

        if let Some(label) = &vendor.toggle_label {
            let mut toggle = Tag::new("button");
            toggle.set("type", "button");
            toggle.set("class", "cmp-conditional-content__toggle");
            toggle.set_flag(&a.toggle);
            out.push_str(&toggle.render());
            out.push_str(&escape_text(label));
            out.push_str("</button>");
        }

        let mut manager = Tag::new("button");
        manager.set("type", "button");
        manager.set("class", "cmp-conditional-content__settings");
        manager.set_flag(&a.show_manager);
        out.push_str(&manager.render());
        out.push_str(&escape_text(&self.manager_label));
        out.push_str("</button></div>");

        let mut slot = Tag::new("div");
        slot.set("class", "cmp-conditional-content__content");
        slot.set_flag(&a.injected);
        out.push_str(&slot.render());
        out.push_str("</div></div>");
        out
    }

    /// Find every gated container in `html`, in document order.
    ///
    /// A container whose opening tag cannot be parsed is skipped and
    /// reported in the error list; the rest are still returned.
    pub fn scan(&self, html: &str) -> (Vec<ParsedGatedContent>, Vec<ConsentError>) {
        let mut found = Vec::new();
        let mut errors = Vec::new();
        for m in self.container.find_iter(html) {
            match self.parse_container(m.as_str()) {
                Ok(parsed) => found.push(parsed),
                Err(e) => errors.push(e),
            }
        }
        (found, errors)
    }

    fn parse_container(&self, open_tag: &str) -> Result<ParsedGatedContent> {
        let tag = Tag::parse(open_tag)?;
        let content = tag
            .get(&self.attrs.content)
            .ok_or_else(|| ConsentError::markup("gated container without captured content"))?
            .to_string();
        Ok(ParsedGatedContent {
            vendor: tag.get(&self.attrs.vendor).map(str::to_string),
            purposes: tag.get(&self.attrs.purposes).map(str::to_string),
            content,
        })
    }
}

impl Default for GatedContentMarkup {
    fn default() -> Self {
        Self::new(DEFAULT_ATTRIBUTE_PREFIX)
    }
}
