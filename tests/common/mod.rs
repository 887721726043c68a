//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use consent_gate::activation::{LoadedScripts, ScriptEntry};
use consent_gate::cmp;
use consent_gate::config::GateConfig;
use consent_gate::domain::{CmpBackend, ConsentEvent, EventStatus, Vendor};
use consent_gate::markup::GatedContentMarkup;
use consent_gate::registry::VendorPurposeRegistry;
use consent_gate::testing::{RecordingLoader, SimulatedCmp};
use consent_gate::ConsentGate;

/// Sourcepoint privacy manager id used by every fixture
pub const PRIVACY_MANAGER_ID: u64 = 488_393;

pub const MAPS_IFRAME: &str =
    r#"<iframe src="https://www.google.com/maps/embed?pb=!1m18" width="600" height="450"></iframe>"#;

/// A page wired to an in-memory CMP
pub struct Harness {
    pub cmp: Arc<SimulatedCmp>,
    pub loader: Arc<RecordingLoader>,
    pub loaded: Arc<LoadedScripts>,
    pub registry: VendorPurposeRegistry,
    pub gate: Arc<ConsentGate>,
}

impl Harness {
    pub fn vendor(&self, name: &str) -> &Vendor {
        self.registry
            .lookup_by_name(name)
            .unwrap_or_else(|| panic!("{name} is catalogued"))
    }

    /// Grant a vendor together with all of its purposes.
    pub fn grant_all(&self, name: &str) {
        let vendor = self.vendor(name).clone();
        self.cmp.grant_vendor(&vendor.id);
        for purpose in &vendor.purpose_ids {
            self.cmp.grant_purpose(purpose);
        }
    }

    pub async fn emit(&self, status: EventStatus, success: bool) {
        self.gate
            .handle_event(&event(self.cmp.backend(), status, success))
            .await;
    }
}

pub fn config(backend: CmpBackend) -> GateConfig {
    let mut config = GateConfig::new(backend);
    if backend == CmpBackend::Sourcepoint {
        config.privacy_manager_id = Some(PRIVACY_MANAGER_ID);
    }
    config
}

pub fn harness(backend: CmpBackend) -> Harness {
    harness_with(config(backend), RecordingLoader::new(), Vec::new())
}

pub fn harness_with(
    config: GateConfig,
    loader: RecordingLoader,
    entries: Vec<ScriptEntry>,
) -> Harness {
    let cmp = Arc::new(SimulatedCmp::new(config.backend));
    let loader = Arc::new(loader);
    let loaded = Arc::new(LoadedScripts::new());
    let adapter = cmp::connect(config.backend, cmp.clone(), config.privacy_manager_id);
    let gate = ConsentGate::new(&config, adapter, loader.clone(), loaded.clone(), entries)
        .expect("valid fixture configuration");
    Harness {
        cmp,
        loader,
        loaded,
        registry: VendorPurposeRegistry::for_backend(config.backend),
        gate: Arc::new(gate),
    }
}

pub fn event(backend: CmpBackend, status: EventStatus, success: bool) -> ConsentEvent {
    ConsentEvent {
        backend,
        event_status: status,
        success,
    }
}

/// The lifecycle event after which a backend's CMP accepts commands.
pub fn ready_status(backend: CmpBackend) -> EventStatus {
    match backend {
        CmpBackend::LiveRamp => EventStatus::CmpReady,
        CmpBackend::Sourcepoint => EventStatus::TcLoaded,
    }
}

/// Gated container for `vendor` around `content`.
pub fn gated(vendor: &Vendor, content: &str) -> String {
    GatedContentMarkup::default().render(vendor, &vendor.purpose_ids, content)
}

/// Staged external script for `vendor`.
pub fn staged_script(vendor: &Vendor, src: &str) -> String {
    format!(
        r#"<script type="text/plain" data-cmp-conditional-scripts data-cmp-vendorid="{}" data-src="{src}"></script>"#,
        vendor.id
    )
}
