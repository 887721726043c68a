//! Page-level privacy manager controls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cmp::ConsentSignalAdapter;
use crate::domain::{ConsentEvent, EventStatus};
use crate::error::Result;

/// "Open privacy manager" button
///
/// Clicks are ignored until the adapter reported its ready status
/// (`cmpReady` for LiveRamp, `tcloaded` for Sourcepoint).
pub struct PrivacyManagerControl {
    adapter: Arc<dyn ConsentSignalAdapter>,
    ready: AtomicBool,
}

impl PrivacyManagerControl {
    pub fn new(adapter: Arc<dyn ConsentSignalAdapter>) -> Self {
        Self {
            adapter,
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Track readiness. Returns `true` on the event that made it ready.
    pub fn handle_event(&self, event: &ConsentEvent) -> bool {
        if event.event_status != self.adapter.ready_status() {
            return false;
        }
        let was_ready = self.ready.swap(true, Ordering::AcqRel);
        if !was_ready {
            info!(backend = %event.backend, "Privacy manager ready");
        }
        !was_ready
    }

    /// Handle a click. Returns whether the manager was opened.
    pub async fn click(&self) -> Result<bool> {
        if !self.is_ready() {
            debug!("Privacy manager not ready, click ignored");
            return Ok(false);
        }
        self.adapter.open_manager().await?;
        Ok(true)
    }
}

/// Hides the CMP's consent UI on designated pages (imprint, privacy policy)
pub struct PrivacyManagerGuard {
    adapter: Arc<dyn ConsentSignalAdapter>,
    enabled: bool,
}

impl PrivacyManagerGuard {
    pub fn new(adapter: Arc<dyn ConsentSignalAdapter>, enabled: bool) -> Self {
        Self { adapter, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Suppress the consent UI when its notice is displayed. Returns whether
    /// suppression was requested.
    pub async fn handle_event(&self, event: &ConsentEvent) -> Result<bool> {
        if !self.enabled || event.event_status != EventStatus::ConsentNoticeDisplayed {
            return Ok(false);
        }
        self.adapter.suppress_consent_ui().await?;
        Ok(true)
    }
}
