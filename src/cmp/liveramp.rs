//! LiveRamp adapter
//!
//! The LiveRamp library evaluates consent itself: `checkConsent` answers a
//! single boolean for the whole `{vendorId, purposeIds}` set, and decisions
//! are fire-and-forget `accept`/`reject` commands.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::{
    CmpBackend, ConsentPayload, ConsentQuery, ConsentSnapshot, DecisionRecord, EventStatus,
    LifecycleFilter, PurposeId, RecordOutcome, VendorId,
};
use crate::error::{ConsentError, Result};

use super::{ConsentSignalAdapter, EventSubscription, TcfApi};

const BACKEND: CmpBackend = CmpBackend::LiveRamp;

/// Adapter for the LiveRamp `__tcfapi` dialect
pub struct LiveRampAdapter {
    api: Arc<dyn TcfApi>,
}

impl LiveRampAdapter {
    pub fn new(api: Arc<dyn TcfApi>) -> Self {
        Self { api }
    }

    fn numeric_vendor(id: &VendorId) -> Result<u32> {
        match id {
            VendorId::Numeric(n) => Ok(*n),
            VendorId::Opaque(raw) => Err(ConsentError::InvalidId {
                backend: BACKEND,
                kind: "vendor",
                value: raw.clone(),
            }),
        }
    }

    fn numeric_purposes(ids: &[PurposeId]) -> Result<Vec<u32>> {
        ids.iter()
            .map(|id| match id {
                PurposeId::Numeric(n) => Ok(*n),
                PurposeId::Opaque(raw) => Err(ConsentError::InvalidId {
                    backend: BACKEND,
                    kind: "purpose",
                    value: raw.clone(),
                }),
            })
            .collect()
    }

    /// `{vendorIds: [..], purposeIds?: [..]}`
    fn decision_parameter(record: &DecisionRecord) -> Result<Value> {
        let vendor_ids = record
            .vendor_ids
            .iter()
            .map(Self::numeric_vendor)
            .collect::<Result<Vec<_>>>()?;
        let mut parameter = Map::new();
        parameter.insert("vendorIds".into(), json!(vendor_ids));
        if let Some(purposes) = &record.purpose_ids {
            parameter.insert("purposeIds".into(), json!(Self::numeric_purposes(purposes)?));
        }
        Ok(Value::Object(parameter))
    }
}

#[async_trait]
impl ConsentSignalAdapter for LiveRampAdapter {
    fn backend(&self) -> CmpBackend {
        BACKEND
    }

    fn requires_confirmation(&self) -> bool {
        false
    }

    fn ready_status(&self) -> EventStatus {
        EventStatus::CmpReady
    }

    fn subscribe(&self, filter: LifecycleFilter) -> EventSubscription {
        EventSubscription::new(BACKEND, filter, self.api.add_event_listener())
    }

    #[instrument(skip(self), fields(backend = "liveramp"))]
    async fn query(&self, query: &ConsentQuery) -> Result<ConsentSnapshot> {
        let Some(vendor_id) = &query.vendor_id else {
            debug!("No vendor to check, consent undetermined");
            return Ok(ConsentSnapshot::undetermined(BACKEND));
        };

        let mut criteria = Map::new();
        criteria.insert("vendorId".into(), json!(Self::numeric_vendor(vendor_id)?));
        if !query.purpose_ids.is_empty() {
            criteria.insert(
                "purposeIds".into(),
                json!(Self::numeric_purposes(&query.purpose_ids)?),
            );
        }
        let parameter = json!({
            "data": [Value::Object(criteria)],
            "recheckConsentOnChange": query.recheck_on_change,
        });

        let response = self.api.call("checkConsent", None, parameter).await?;
        let granted = match response.data {
            Value::Null => false,
            data => serde_json::from_value::<bool>(data)?,
        };

        Ok(ConsentSnapshot {
            backend: BACKEND,
            success: response.success,
            payload: ConsentPayload::Resolved(granted),
        })
    }

    #[instrument(skip(self), fields(backend = "liveramp", kind = record.kind.as_str()))]
    async fn record_decision(&self, record: &DecisionRecord) -> Result<RecordOutcome> {
        let parameter = Self::decision_parameter(record)?;
        // The callback carries nothing to confirm; the library applies the
        // decision asynchronously.
        self.api
            .call(record.kind.as_str(), None, parameter)
            .await?;
        Ok(RecordOutcome::Dispatched)
    }

    async fn open_manager(&self) -> Result<()> {
        self.api
            .call("showConsentManager", None, Value::Null)
            .await
            .map(|_| ())
    }

    async fn suppress_consent_ui(&self) -> Result<()> {
        debug!("Hiding LiveRamp consent tool");
        self.api
            .call("toggleConsentTool", Some(2), json!(false))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmp::{MockTcfApi, TcfResponse};
    use mockall::predicate::*;

    fn adapter(api: MockTcfApi) -> LiveRampAdapter {
        LiveRampAdapter::new(Arc::new(api))
    }

    #[tokio::test]
    async fn test_query_sends_check_consent() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .with(
                eq("checkConsent"),
                eq(None::<u8>),
                eq(json!({
                    "data": [{"vendorId": 5, "purposeIds": [1, 2]}],
                    "recheckConsentOnChange": true,
                })),
            )
            .times(1)
            .returning(|_, _, _| Ok(TcfResponse::ok(json!(true))));

        let query = ConsentQuery::new(
            Some(VendorId::Numeric(5)),
            vec![PurposeId::Numeric(1), PurposeId::Numeric(2)],
        );
        let snapshot = adapter(api).query(&query).await.unwrap();
        assert!(snapshot.success);
        assert_eq!(snapshot.payload, ConsentPayload::Resolved(true));
    }

    #[tokio::test]
    async fn test_query_omits_empty_purposes() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .withf(|command, _, parameter| {
                command == "checkConsent" && parameter["data"][0].get("purposeIds").is_none()
            })
            .returning(|_, _, _| Ok(TcfResponse::ok(json!(false))));

        let query = ConsentQuery::new(Some(VendorId::Numeric(5)), Vec::new());
        let snapshot = adapter(api).query(&query).await.unwrap();
        assert_eq!(snapshot.payload, ConsentPayload::Resolved(false));
    }

    #[tokio::test]
    async fn test_query_without_vendor_is_undetermined() {
        let mut api = MockTcfApi::new();
        api.expect_call().never();

        let query = ConsentQuery::new(None, vec![PurposeId::Numeric(1)]);
        let snapshot = adapter(api).query(&query).await.unwrap();
        assert!(!snapshot.success);
    }

    #[tokio::test]
    async fn test_query_rejects_opaque_vendor() {
        let mut api = MockTcfApi::new();
        api.expect_call().never();

        let query = ConsentQuery::new(Some(VendorId::Opaque("abc".into())), Vec::new());
        let err = adapter(api).query(&query).await.unwrap_err();
        assert!(matches!(err, ConsentError::InvalidId { kind: "vendor", .. }));
    }

    #[tokio::test]
    async fn test_query_malformed_data() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .returning(|_, _, _| Ok(TcfResponse::ok(json!({"unexpected": 1}))));

        let query = ConsentQuery::new(Some(VendorId::Numeric(5)), Vec::new());
        let err = adapter(api).query(&query).await.unwrap_err();
        assert!(matches!(err, ConsentError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_reject_drops_purposes() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .with(eq("reject"), eq(None::<u8>), eq(json!({"vendorIds": [786]})))
            .times(1)
            .returning(|_, _, _| Ok(TcfResponse::ok(Value::Null)));

        let record = DecisionRecord::reject_vendor(VendorId::Numeric(786));
        let outcome = adapter(api).record_decision(&record).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Dispatched);
    }

    #[tokio::test]
    async fn test_accept_is_fire_and_forget() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .with(
                eq("accept"),
                eq(None::<u8>),
                eq(json!({"vendorIds": [786], "purposeIds": [1, 7]})),
            )
            .times(1)
            .returning(|_, _, _| Ok(TcfResponse::failed()));

        let record = DecisionRecord::accept(
            VendorId::Numeric(786),
            vec![PurposeId::Numeric(1), PurposeId::Numeric(7)],
        );
        let adapter = adapter(api);
        assert!(!adapter.requires_confirmation());
        assert_eq!(
            adapter.record_decision(&record).await.unwrap(),
            RecordOutcome::Dispatched
        );
    }

    #[tokio::test]
    async fn test_suppress_toggles_consent_tool_off() {
        let mut api = MockTcfApi::new();
        api.expect_call()
            .with(eq("toggleConsentTool"), eq(Some(2u8)), eq(json!(false)))
            .times(1)
            .returning(|_, _, _| Ok(TcfResponse::ok(Value::Null)));

        adapter(api).suppress_consent_ui().await.unwrap();
    }
}
