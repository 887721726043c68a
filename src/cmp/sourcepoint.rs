//! Sourcepoint adapter
//!
//! Sourcepoint hands out the raw custom-vendor consent lists and leaves the
//! matching to the caller. Decisions are posted with `postCustomConsent` and
//! only count once the callback reports `success`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{
    CmpBackend, ConsentPayload, ConsentQuery, ConsentSnapshot, DecisionKind, DecisionRecord,
    EventStatus, LifecycleFilter, PurposeId, RecordOutcome, VendorId,
};
use crate::error::{ConsentError, Result};

use super::{ConsentSignalAdapter, EventSubscription, TcfApi};

const BACKEND: CmpBackend = CmpBackend::Sourcepoint;

/// Custom consent API version used for every command
const API_VERSION: u8 = 2;

/// One entry of a consented list; only the id is interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentedEntry {
    #[serde(rename = "_id")]
    pub id: String,
}

/// `getCustomVendorConsents` callback data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcepointConsents {
    #[serde(default)]
    pub consented_vendors: Vec<ConsentedEntry>,
    #[serde(default)]
    pub consented_purposes: Vec<ConsentedEntry>,
}

impl SourcepointConsents {
    fn into_payload(self) -> ConsentPayload {
        ConsentPayload::Lists {
            consented_vendors: self
                .consented_vendors
                .into_iter()
                .map(|e| VendorId::Opaque(e.id))
                .collect(),
            consented_purposes: self
                .consented_purposes
                .into_iter()
                .map(|e| PurposeId::Opaque(e.id))
                .collect(),
        }
    }
}

/// Adapter for the Sourcepoint `__tcfapi` dialect
pub struct SourcepointAdapter {
    api: Arc<dyn TcfApi>,
    privacy_manager_id: Option<u64>,
}

impl SourcepointAdapter {
    pub fn new(api: Arc<dyn TcfApi>, privacy_manager_id: Option<u64>) -> Self {
        Self {
            api,
            privacy_manager_id,
        }
    }

    pub fn privacy_manager_id(&self) -> Option<u64> {
        self.privacy_manager_id
    }
}

fn id_strings<T: ToString>(ids: &[T]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl ConsentSignalAdapter for SourcepointAdapter {
    fn backend(&self) -> CmpBackend {
        BACKEND
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    fn ready_status(&self) -> EventStatus {
        EventStatus::TcLoaded
    }

    fn subscribe(&self, filter: LifecycleFilter) -> EventSubscription {
        EventSubscription::new(BACKEND, filter, self.api.add_event_listener())
    }

    #[instrument(skip(self), fields(backend = "sourcepoint"))]
    async fn query(&self, query: &ConsentQuery) -> Result<ConsentSnapshot> {
        let response = self
            .api
            .call("getCustomVendorConsents", Some(API_VERSION), Value::Null)
            .await?;
        if !response.success {
            debug!("getCustomVendorConsents reported no success");
            return Ok(ConsentSnapshot::undetermined(BACKEND));
        }

        let consents = match response.data {
            Value::Null => SourcepointConsents::default(),
            data => serde_json::from_value::<SourcepointConsents>(data)?,
        };

        Ok(ConsentSnapshot {
            backend: BACKEND,
            success: true,
            payload: consents.into_payload(),
        })
    }

    #[instrument(skip(self), fields(backend = "sourcepoint", kind = record.kind.as_str()))]
    async fn record_decision(&self, record: &DecisionRecord) -> Result<RecordOutcome> {
        if record.kind == DecisionKind::Reject {
            // No custom-consent revoke command exists.
            debug!("Sourcepoint cannot revoke a single vendor");
            return Ok(RecordOutcome::Unsupported);
        }

        let purposes = record.purpose_ids.as_deref().unwrap_or_default();
        let parameter = json!([
            id_strings(&record.vendor_ids),
            id_strings(purposes),
            id_strings(&record.legitimate_interest_purpose_ids),
        ]);
        let response = self
            .api
            .call("postCustomConsent", Some(API_VERSION), parameter)
            .await?;

        if response.success {
            Ok(RecordOutcome::Confirmed)
        } else {
            warn!("postCustomConsent was not confirmed");
            Ok(RecordOutcome::Refused)
        }
    }

    async fn open_manager(&self) -> Result<()> {
        let id = self.privacy_manager_id.ok_or_else(|| {
            ConsentError::Configuration("sourcepoint privacy manager id is not set".into())
        })?;
        self.api
            .call("loadPrivacyManagerModal", None, json!(id))
            .await
            .map(|_| ())
    }

    async fn suppress_consent_ui(&self) -> Result<()> {
        warn!("Sourcepoint offers no command to hide its consent UI");
        Ok(())
    }
}
