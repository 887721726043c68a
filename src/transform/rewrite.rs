//! Iframe rewriting

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

use crate::domain::VendorRef;
use crate::error::{ConsentError, Result};
use crate::markup::{GatedContentMarkup, Tag};
use crate::registry::VendorPurposeRegistry;

use super::policy::{EmbedAction, EmbedPolicy};

static IFRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<iframe\b[^>]*?/>|<iframe\b[^>]*>.*?</iframe\s*>|<iframe\b[^>]*>")
        .expect("invalid iframe pattern")
});

static IFRAME_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^<iframe\b[^>]*>").expect("invalid iframe open pattern"));

static IFRAME_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</iframe\s*>$").expect("invalid iframe close pattern"));

/// Result of one rewrite pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewriteOutput {
    pub html: String,
    pub gated: usize,
    pub allowed: usize,
    pub removed: usize,
}

impl RewriteOutput {
    /// The output contains gated structures; the hosting renderer must
    /// attach content activation to it.
    pub fn requires_content_activation(&self) -> bool {
        self.gated > 0
    }
}

/// Rewrites raw markup so that no unconsented third-party iframe remains
///
/// The input is never mutated; every call produces a new string.
#[derive(Debug, Clone)]
pub struct EmbedRewriteTransform {
    policy: EmbedPolicy,
    registry: Arc<VendorPurposeRegistry>,
    markup: GatedContentMarkup,
}

impl EmbedRewriteTransform {
    pub fn new(
        policy: EmbedPolicy,
        registry: Arc<VendorPurposeRegistry>,
        markup: GatedContentMarkup,
    ) -> Self {
        Self {
            policy,
            registry,
            markup,
        }
    }

    pub fn policy(&self) -> &EmbedPolicy {
        &self.policy
    }

    /// Rewrite every iframe in `html`.
    ///
    /// A node that cannot be parsed or rebuilt is dropped; the rest of the
    /// document is still processed.
    #[instrument(skip_all, fields(len = html.len()))]
    pub fn rewrite(&self, html: &str) -> RewriteOutput {
        let mut out = RewriteOutput::default();
        if !contains_iframe(html) {
            out.html = html.to_string();
            return out;
        }

        out.html.reserve(html.len());
        let mut last = 0;
        for node in IFRAME.find_iter(html) {
            out.html.push_str(&html[last..node.start()]);
            last = node.end();

            match self.rewrite_node(node.as_str()) {
                Ok(NodeOutcome::Gated(markup)) => {
                    out.html.push_str(&markup);
                    out.gated += 1;
                }
                Ok(NodeOutcome::Allowed) => {
                    out.html.push_str(node.as_str());
                    out.allowed += 1;
                }
                Ok(NodeOutcome::Removed) => out.removed += 1,
                Err(error) => {
                    warn!(%error, offset = node.start(), "Dropping embed that could not be rewritten");
                    out.removed += 1;
                }
            }
        }
        out.html.push_str(&html[last..]);

        debug!(
            gated = out.gated,
            allowed = out.allowed,
            removed = out.removed,
            "Embeds rewritten"
        );
        out
    }

    fn rewrite_node(&self, node: &str) -> Result<NodeOutcome> {
        let open = IFRAME_OPEN
            .find(node)
            .ok_or_else(|| ConsentError::markup("iframe without opening tag"))?;
        let mut tag = Tag::parse(open.as_str())?;
        let src = tag.get("src").unwrap_or_default().trim().to_string();

        match self.policy.classify(&src) {
            None => Ok(NodeOutcome::Removed),
            Some(EmbedAction::Allow) => Ok(NodeOutcome::Allowed),
            Some(EmbedAction::Gate(vendor)) => {
                let inner = node[open.end()..].to_string();
                let inner = IFRAME_CLOSE.replace(&inner, "");
                tag.self_closing = false;
                let captured = format!("{}{}</iframe>", tag.render(), inner);
                self.gate(vendor, &captured).map(NodeOutcome::Gated)
            }
        }
    }

    fn gate(&self, vendor: &VendorRef, captured: &str) -> Result<String> {
        let resolved = self.registry.require(vendor)?;
        let purposes = self.registry.required_purpose_ids(vendor);
        Ok(self.markup.render(resolved, &purposes, captured))
    }
}

enum NodeOutcome {
    Gated(String),
    Allowed,
    Removed,
}

fn contains_iframe(html: &str) -> bool {
    html.as_bytes()
        .windows(7)
        .any(|w| w.eq_ignore_ascii_case(b"<iframe"))
}
