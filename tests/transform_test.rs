//! Render-time rewrite of whole documents.

use std::sync::Arc;

use consent_gate::domain::{CmpBackend, VendorRef};
use consent_gate::markup::GatedContentMarkup;
use consent_gate::registry::{sp_purpose, vendor, VendorPurposeRegistry};
use consent_gate::transform::{EmbedAction, EmbedPolicy, EmbedRewriteTransform, EmbedRule};

const ARTICLE: &str = r#"<article>
<h1>Filialen</h1>
<iframe src="https://www.google.com/maps/embed?pb=!1m18&amp;z=3" width="600" height="450" allowfullscreen></iframe>
<p>Zinsvergleich:</p>
<iframe src="https://koop.biallo.de/zins" title="Zinsen"></iframe>
<iframe src="https://ads.tracker.example/frame">
  <p>fallback</p>
</iframe>
</article>"#;

fn transform_for(backend: CmpBackend, extra: Vec<EmbedRule>) -> EmbedRewriteTransform {
    let registry = Arc::new(VendorPurposeRegistry::for_backend(backend));
    let mut policy = EmbedPolicy::default_for(&registry).unwrap();
    for rule in extra.into_iter().rev() {
        policy.prepend(rule);
    }
    EmbedRewriteTransform::new(policy, registry, GatedContentMarkup::default())
}

#[test]
fn test_article_rewrite_liveramp() {
    let out = transform_for(CmpBackend::LiveRamp, Vec::new()).rewrite(ARTICLE);

    assert_eq!((out.gated, out.allowed, out.removed), (1, 1, 1));
    assert!(out.requires_content_activation());
    assert!(out.html.starts_with("<article>\n<h1>Filialen</h1>\n<div "));
    assert!(out.html.contains(r#"data-cmp-vendor="10188""#));
    assert!(out.html.contains(r#"data-cmp-purposes="1""#));
    assert!(out.html.contains(r#"<iframe src="https://koop.biallo.de/zins" title="Zinsen"></iframe>"#));
    assert!(!out.html.contains("tracker.example"));
    assert!(!out.html.contains("fallback"));
    assert!(out.html.ends_with("\n</article>"));
}

#[test]
fn test_article_rewrite_sourcepoint() {
    let registry = VendorPurposeRegistry::sourcepoint();
    let maps = registry.lookup_by_name(vendor::GOOGLE_MAPS).unwrap();
    let out = transform_for(CmpBackend::Sourcepoint, Vec::new()).rewrite(ARTICLE);

    assert_eq!(out.gated, 1);
    assert!(out.html.contains(&format!(r#"data-cmp-vendor="{}""#, maps.id)));
    assert!(out.html.contains(sp_purpose::STORE_AND_OR_ACCESS_INFORMATION_ON_A_DEVICE));
    assert!(out.html.contains(sp_purpose::SOCIAL_MEDIA));
}

#[test]
fn test_captured_iframe_keeps_attributes() {
    let transform = transform_for(CmpBackend::LiveRamp, Vec::new());
    let out = transform.rewrite(ARTICLE);

    let (found, errors) = GatedContentMarkup::default().scan(&out.html);
    assert!(errors.is_empty());
    assert_eq!(found.len(), 1);
    let captured = &found[0].content;
    assert!(captured.starts_with(r#"<iframe src="https://www.google.com/maps/embed?pb=!1m18&amp;z=3""#));
    assert!(captured.contains("allowfullscreen"));
    assert!(captured.ends_with("></iframe>"));
}

#[test]
fn test_extra_rules_take_precedence() {
    let extra = vec![
        EmbedRule::allow(r"google\.com/maps/embed\?pb=public").unwrap(),
        EmbedRule::gate(r"youtube(-nocookie)?\.com/embed", VendorRef::name(vendor::YOUTUBE))
            .unwrap(),
        EmbedRule::allow(r"ads\.tracker\.example").unwrap(),
    ];
    let transform = transform_for(CmpBackend::LiveRamp, extra);
    assert_eq!(
        transform.policy().classify("https://www.google.com/maps/embed?pb=public"),
        Some(&EmbedAction::Allow)
    );

    let html = concat!(
        r#"<iframe src="https://www.google.com/maps/embed?pb=public"></iframe>"#,
        r#"<iframe src="https://www.youtube-nocookie.com/embed/abc"></iframe>"#,
        r#"<iframe src="https://ads.tracker.example/frame"></iframe>"#,
    );
    let out = transform.rewrite(html);
    assert_eq!((out.gated, out.allowed, out.removed), (1, 2, 0));
    assert!(out.html.contains(r#"data-cmp-vendor="10193""#));
    assert!(out.html.contains(r#"data-cmp-purposes="1,5,6""#));
}

#[test]
fn test_gate_rule_for_unknown_vendor_drops_embed() {
    let extra = vec![EmbedRule::gate(r"example\.org", VendorRef::name("nobody")).unwrap()];
    let out = transform_for(CmpBackend::LiveRamp, extra)
        .rewrite(r#"<p>a</p><iframe src="https://example.org/x"></iframe><p>b</p>"#);

    assert_eq!(out.html, "<p>a</p><p>b</p>");
    assert_eq!(out.removed, 1);
}

#[test]
fn test_custom_attribute_prefix() {
    let registry = Arc::new(VendorPurposeRegistry::liveramp());
    let policy = EmbedPolicy::default_for(&registry).unwrap();
    let markup = GatedContentMarkup::new("data-consent");
    let transform = EmbedRewriteTransform::new(policy, registry, markup.clone());

    let out = transform.rewrite(ARTICLE);
    assert!(out.html.contains("data-consent-conditional-content="));
    assert!(!out.html.contains("data-cmp-"));
    assert_eq!(markup.scan(&out.html).0.len(), 1);
}
