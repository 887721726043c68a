//! Page-level wiring of the activation controllers to CMP lifecycle events

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::activation::{
    ContentActivationController, LoadedScripts, PrivacyManagerControl, PrivacyManagerGuard,
    ScriptActivationController, ScriptEntry, ScriptLoader,
};
use crate::cmp::{ConsentSignalAdapter, EventSubscription};
use crate::config::GateConfig;
use crate::domain::{CmpBackend, ConsentEvent, ElementKey, EventStatus, LifecycleFilter};
use crate::error::{ConsentError, Result};
use crate::markup::{GatedContentMarkup, MarkupAttributes};

/// What handling one lifecycle event did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// The consent UI was suppressed
    pub suppressed: bool,
    /// This event made the privacy manager button usable
    pub manager_ready: bool,
    /// Gated elements whose consent was checked again
    pub checked: usize,
    /// Scripts loaded as a result
    pub scripts_loaded: usize,
}

/// Everything one page needs to react to consent
pub struct ConsentGate {
    adapter: Arc<dyn ConsentSignalAdapter>,
    content: Arc<ContentActivationController>,
    scripts: Arc<ScriptActivationController>,
    manager: PrivacyManagerControl,
    guard: PrivacyManagerGuard,
}

impl ConsentGate {
    /// Build the controllers for one page.
    ///
    /// Injected content attaches its staged scripts through the script
    /// controller, so nested scripts follow the same at-most-once rules.
    pub fn new(
        config: &GateConfig,
        adapter: Arc<dyn ConsentSignalAdapter>,
        loader: Arc<dyn ScriptLoader>,
        loaded: Arc<LoadedScripts>,
        entries: Vec<ScriptEntry>,
    ) -> Result<Self> {
        config.validate()?;
        if adapter.backend() != config.backend {
            return Err(ConsentError::Configuration(format!(
                "adapter backend {} does not match configured backend {}",
                adapter.backend(),
                config.backend
            )));
        }

        let attrs = MarkupAttributes::with_prefix(&config.attribute_prefix);
        let scripts = Arc::new(
            ScriptActivationController::new(adapter.clone(), loader, loaded, attrs)
                .with_entries(entries),
        );
        let content = Arc::new(ContentActivationController::new(
            adapter.clone(),
            GatedContentMarkup::new(&config.attribute_prefix),
            scripts.clone(),
            config.event_buffer,
        ));

        Ok(Self {
            manager: PrivacyManagerControl::new(adapter.clone()),
            guard: PrivacyManagerGuard::new(adapter.clone(), config.disable_privacy_manager),
            adapter,
            content,
            scripts,
        })
    }

    pub fn backend(&self) -> CmpBackend {
        self.adapter.backend()
    }

    pub fn content(&self) -> &Arc<ContentActivationController> {
        &self.content
    }

    pub fn scripts(&self) -> &Arc<ScriptActivationController> {
        &self.scripts
    }

    pub fn privacy_manager(&self) -> &PrivacyManagerControl {
        &self.manager
    }

    /// Register the gated containers and staged scripts of a rendered page.
    ///
    /// Nothing is queried yet; the first ready event evaluates them.
    pub fn mount_page(&self, scope: &ElementKey, html: &str) -> Vec<ElementKey> {
        let mounted = self.content.mount_markup(scope, html);
        let staged = self.scripts.stage_markup(scope, html);
        debug!(%scope, elements = mounted.len(), scripts = staged, "Page mounted");
        mounted
    }

    /// React to one lifecycle event.
    #[instrument(skip(self), fields(backend = %self.backend(), status = %event.event_status))]
    pub async fn handle_event(&self, event: &ConsentEvent) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        match self.guard.handle_event(event).await {
            Ok(suppressed) => outcome.suppressed = suppressed,
            Err(error) => warn!(%error, "Failed to suppress consent UI"),
        }
        outcome.manager_ready = self.manager.handle_event(event);

        if self.should_reevaluate(event) {
            outcome.checked = self.content.refresh_all().await;
            outcome.scripts_loaded = self.scripts.refresh().await;
        }
        outcome
    }

    /// LiveRamp answers carry `recheckConsentOnChange`, so every event after
    /// readiness re-queries. Sourcepoint only signals consent changes through
    /// successful `tcloaded` and `useractioncomplete` events.
    fn should_reevaluate(&self, event: &ConsentEvent) -> bool {
        match self.backend() {
            CmpBackend::LiveRamp => self.manager.is_ready(),
            CmpBackend::Sourcepoint => {
                event.success
                    && matches!(
                        event.event_status,
                        EventStatus::TcLoaded | EventStatus::UserActionComplete
                    )
            }
        }
    }

    /// Handle events until the CMP bridge goes away.
    pub async fn run(&self, mut events: EventSubscription) {
        info!(backend = %self.backend(), "Consent gate listening");
        while let Some(event) = events.recv().await {
            let outcome = self.handle_event(&event).await;
            debug!(?outcome, "Lifecycle event handled");
        }
        info!(backend = %self.backend(), "Consent event stream closed");
    }

    /// Subscribe to every lifecycle event and handle them in the background.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let events = self.adapter.subscribe(LifecycleFilter::Any);
        tokio::spawn(async move { self.run(events).await })
    }
}
