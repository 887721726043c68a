//! CMP adapters
//!
//! [`ConsentSignalAdapter`] is the one conceptual interface over both
//! consent management platforms. The two implementations share only the
//! canonical event/decision types from [`crate::domain`]; how they query and
//! record consent differs materially:
//!
//! | | LiveRamp | Sourcepoint |
//! |---|---|---|
//! | query | library resolves a boolean (AND over purposes) | raw consent lists, caller matches (OR) |
//! | record | fire-and-forget `accept`/`reject` | `postCustomConsent`, confirmed via `success` |
//! | manager | `showConsentManager` | `loadPrivacyManagerModal(id)` |
//!
//! Both talk to the page's CMP library through the [`TcfApi`] host bridge.

mod liveramp;
mod sourcepoint;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::{
    CmpBackend, ConsentEvent, ConsentQuery, ConsentSnapshot, DecisionRecord, EventStatus,
    LifecycleFilter, RecordOutcome,
};
use crate::error::Result;

pub use liveramp::LiveRampAdapter;
pub use sourcepoint::{SourcepointAdapter, SourcepointConsents};

/// Answer of one `__tcfapi` command callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcfResponse {
    #[serde(default)]
    pub data: serde_json::Value,
    pub success: bool,
}

impl TcfResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            data,
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            data: serde_json::Value::Null,
            success: false,
        }
    }
}

/// Raw listener callback payload (`tcData` + `success`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcfEvent {
    pub event_status: EventStatus,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_id: Option<u64>,
}

impl TcfEvent {
    pub fn new(event_status: EventStatus, success: bool) -> Self {
        Self {
            event_status,
            success,
            listener_id: None,
        }
    }
}

/// Host bridge to the CMP library loaded in the page
///
/// Mirrors the `__tcfapi(command, version, callback, parameter)` shape:
/// every command resolves exactly one callback.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TcfApi: Send + Sync {
    /// Issue a command and wait for its callback.
    async fn call(
        &self,
        command: &str,
        version: Option<u8>,
        parameter: serde_json::Value,
    ) -> Result<TcfResponse>;

    /// Register a persistent listener for lifecycle callbacks.
    fn add_event_listener(&self) -> broadcast::Receiver<TcfEvent>;
}

/// One conceptual interface over both CMP backends
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsentSignalAdapter: Send + Sync {
    fn backend(&self) -> CmpBackend;

    /// Whether recorded decisions must be confirmed before the UI may
    /// transition.
    fn requires_confirmation(&self) -> bool;

    /// Lifecycle status after which the CMP accepts commands.
    fn ready_status(&self) -> EventStatus;

    /// Register a persistent listener. It may fire for every user action in
    /// the session; the adapter does not deduplicate.
    fn subscribe(&self, filter: LifecycleFilter) -> EventSubscription;

    /// Ask the CMP for consent. Never fails on "no consent"; a CMP that
    /// cannot decide answers with `success = false`.
    async fn query(&self, query: &ConsentQuery) -> Result<ConsentSnapshot>;

    /// Persist an explicit user decision.
    async fn record_decision(&self, record: &DecisionRecord) -> Result<RecordOutcome>;

    /// Open the CMP's interactive consent dialog.
    async fn open_manager(&self) -> Result<()>;

    /// Hide the CMP's consent UI on this page.
    async fn suppress_consent_ui(&self) -> Result<()>;
}

/// Build the adapter for `backend` on top of a host bridge.
pub fn connect(
    backend: CmpBackend,
    api: Arc<dyn TcfApi>,
    privacy_manager_id: Option<u64>,
) -> Arc<dyn ConsentSignalAdapter> {
    match backend {
        CmpBackend::LiveRamp => Arc::new(LiveRampAdapter::new(api)),
        CmpBackend::Sourcepoint => Arc::new(SourcepointAdapter::new(api, privacy_manager_id)),
    }
}

/// A persistent, filtered lifecycle listener
pub struct EventSubscription {
    backend: CmpBackend,
    filter: LifecycleFilter,
    rx: broadcast::Receiver<TcfEvent>,
}

impl EventSubscription {
    pub fn new(
        backend: CmpBackend,
        filter: LifecycleFilter,
        rx: broadcast::Receiver<TcfEvent>,
    ) -> Self {
        Self {
            backend,
            filter,
            rx,
        }
    }

    pub fn backend(&self) -> CmpBackend {
        self.backend
    }

    /// Next matching event; `None` once the CMP bridge is gone.
    ///
    /// Lagging behind only drops stale lifecycle events, which is harmless
    /// because every reaction re-queries current consent.
    pub async fn recv(&mut self) -> Option<ConsentEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event.event_status) => {
                    return Some(ConsentEvent {
                        backend: self.backend,
                        event_status: event.event_status,
                        success: event.success,
                    });
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(backend = %self.backend, skipped = n, "Consent listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_status() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = EventSubscription::new(
            CmpBackend::Sourcepoint,
            LifecycleFilter::Status(EventStatus::UserActionComplete),
            rx,
        );

        tx.send(TcfEvent::new(EventStatus::TcLoaded, true)).unwrap();
        tx.send(TcfEvent::new(EventStatus::UserActionComplete, true))
            .unwrap();
        drop(tx);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_status, EventStatus::UserActionComplete);
        assert_eq!(event.backend, CmpBackend::Sourcepoint);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscription_survives_lag() {
        let (tx, rx) = broadcast::channel(1);
        let mut sub = EventSubscription::new(CmpBackend::LiveRamp, LifecycleFilter::Any, rx);

        tx.send(TcfEvent::new(EventStatus::CmpReady, true)).unwrap();
        tx.send(TcfEvent::new(EventStatus::UserActionComplete, true))
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.event_status, EventStatus::UserActionComplete);
    }

    #[test]
    fn test_tcf_event_wire_format() {
        let event: TcfEvent =
            serde_json::from_str(r#"{"eventStatus":"tcloaded","success":true,"listenerId":3}"#)
                .unwrap();
        assert_eq!(event.event_status, EventStatus::TcLoaded);
        assert_eq!(event.listener_id, Some(3));
    }
}
