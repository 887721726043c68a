//! Embed classification rules

use regex::Regex;

use crate::domain::VendorRef;
use crate::error::{ConsentError, Result};
use crate::registry::{vendor, VendorPurposeRegistry};

/// What to do with an embed whose source matched a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedAction {
    /// Replace with the gated-content structure for this vendor
    Gate(VendorRef),
    /// Keep unchanged
    Allow,
}

/// A rule matches when every one of its patterns matches the source
#[derive(Debug, Clone)]
pub struct EmbedRule {
    patterns: Vec<Regex>,
    action: EmbedAction,
}

impl EmbedRule {
    pub fn new(patterns: &[&str], action: EmbedAction) -> Result<Self> {
        if patterns.is_empty() {
            return Err(ConsentError::Configuration(
                "embed rule needs at least one pattern".into(),
            ));
        }
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ConsentError::Configuration(format!("invalid embed pattern {p:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns, action })
    }

    pub fn gate(pattern: &str, vendor: VendorRef) -> Result<Self> {
        Self::new(&[pattern], EmbedAction::Gate(vendor))
    }

    pub fn allow(pattern: &str) -> Result<Self> {
        Self::new(&[pattern], EmbedAction::Allow)
    }

    pub fn matches(&self, src: &str) -> bool {
        self.patterns.iter().all(|p| p.is_match(src))
    }

    pub fn action(&self) -> &EmbedAction {
        &self.action
    }
}

/// Ordered rule table; the first matching rule wins, no match means remove
#[derive(Debug, Clone, Default)]
pub struct EmbedPolicy {
    rules: Vec<EmbedRule>,
}

impl EmbedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock iframe policy: Google Maps is gated, a handful of trusted
    /// partner embeds pass, everything else is removed.
    ///
    /// Fails if the registry has no Google Maps vendor.
    pub fn default_for(registry: &VendorPurposeRegistry) -> Result<Self> {
        let maps = VendorRef::name(vendor::GOOGLE_MAPS);
        registry.require(&maps)?;

        Ok(Self::new()
            .with_rule(EmbedRule::gate(r"google\.com/maps/embed", maps)?)
            .with_rule(EmbedRule::new(
                &[r"cdn\.datenschutz\.", r"burda\.com"],
                EmbedAction::Allow,
            )?)
            .with_rule(EmbedRule::allow(r"leadgen\.sso-service\.de")?)
            .with_rule(EmbedRule::allow(r"koop\.biallo\.de")?)
            .with_rule(EmbedRule::allow(r"geldsparen\.de")?))
    }

    pub fn with_rule(mut self, rule: EmbedRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Insert a rule ahead of all existing ones.
    pub fn prepend(&mut self, rule: EmbedRule) {
        self.rules.insert(0, rule);
    }

    pub fn rules(&self) -> &[EmbedRule] {
        &self.rules
    }

    /// Action for `src`; `None` means the embed is removed.
    pub fn classify(&self, src: &str) -> Option<&EmbedAction> {
        self.rules
            .iter()
            .find(|rule| rule.matches(src))
            .map(EmbedRule::action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_classification() {
        let policy = EmbedPolicy::default_for(&VendorPurposeRegistry::liveramp()).unwrap();

        assert_eq!(
            policy.classify("https://www.google.com/maps/embed?pb=!1m18"),
            Some(&EmbedAction::Gate(VendorRef::name(vendor::GOOGLE_MAPS)))
        );
        assert_eq!(
            policy.classify("https://cdn.datenschutz.burda.com/policy"),
            Some(&EmbedAction::Allow)
        );
        assert_eq!(
            policy.classify("https://leadgen.sso-service.de/form"),
            Some(&EmbedAction::Allow)
        );
        assert_eq!(policy.classify("https://www.geldsparen.de/rechner"), Some(&EmbedAction::Allow));
        assert_eq!(policy.classify("https://unknown.example/x"), None);
    }

    #[test]
    fn test_and_rule_needs_all_patterns() {
        let policy = EmbedPolicy::default_for(&VendorPurposeRegistry::sourcepoint()).unwrap();
        // privacy CDN of a different company
        assert_eq!(policy.classify("https://cdn.datenschutz.example.com/x"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut policy = EmbedPolicy::new().with_rule(EmbedRule::allow("example").unwrap());
        policy.prepend(EmbedRule::gate("example", VendorRef::name("vimeo")).unwrap());
        assert!(matches!(
            policy.classify("https://example.com"),
            Some(EmbedAction::Gate(_))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            EmbedRule::allow("(unclosed"),
            Err(ConsentError::Configuration(_))
        ));
        assert!(EmbedRule::new(&[], EmbedAction::Allow).is_err());
    }
}
