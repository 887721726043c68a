//! In-memory stand-ins for the page's CMP library and script loader
//!
//! Used by the integration tests and handy for exercising a page offline.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::activation::ScriptLoader;
use crate::cmp::{TcfApi, TcfEvent, TcfResponse};
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::domain::{CmpBackend, EventStatus};
use crate::error::{ConsentError, Result};
use crate::markup::{LiveScriptTag, StagedScriptTag};

/// One command received by [`SimulatedCmp`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: String,
    pub version: Option<u8>,
    pub parameter: Value,
}

#[derive(Debug, Default)]
struct CmpState {
    vendors: BTreeSet<String>,
    purposes: BTreeSet<String>,
    fail_queries: bool,
    refuse_decisions: bool,
    query_delay: Option<Duration>,
    calls: Vec<RecordedCall>,
}

/// Speaks either backend's `__tcfapi` dialect over an in-memory consent
/// state
///
/// LiveRamp `checkConsent` grants when the vendor and every requested
/// purpose are consented; Sourcepoint `getCustomVendorConsents` returns the
/// raw lists. Ids are kept in their string form.
pub struct SimulatedCmp {
    backend: CmpBackend,
    state: Mutex<CmpState>,
    events: broadcast::Sender<TcfEvent>,
}

impl SimulatedCmp {
    pub fn new(backend: CmpBackend) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self {
            backend,
            state: Mutex::new(CmpState::default()),
            events,
        }
    }

    pub fn backend(&self) -> CmpBackend {
        self.backend
    }

    pub fn grant_vendor(&self, id: impl ToString) {
        self.state.lock().vendors.insert(id.to_string());
    }

    pub fn revoke_vendor(&self, id: impl ToString) {
        self.state.lock().vendors.remove(&id.to_string());
    }

    pub fn grant_purpose(&self, id: impl ToString) {
        self.state.lock().purposes.insert(id.to_string());
    }

    pub fn revoke_all(&self) {
        let mut state = self.state.lock();
        state.vendors.clear();
        state.purposes.clear();
    }

    pub fn has_vendor(&self, id: impl ToString) -> bool {
        self.state.lock().vendors.contains(&id.to_string())
    }

    /// Answer every consent query with `success = false`.
    pub fn fail_queries(&self, fail: bool) {
        self.state.lock().fail_queries = fail;
    }

    /// Answer `postCustomConsent` with `success = false`.
    pub fn refuse_decisions(&self, refuse: bool) {
        self.state.lock().refuse_decisions = refuse;
    }

    /// Delay consent query callbacks.
    pub fn set_query_delay(&self, delay: Option<Duration>) {
        self.state.lock().query_delay = delay;
    }

    /// Fire a lifecycle callback on every registered listener.
    pub fn emit(&self, status: EventStatus, success: bool) -> usize {
        self.events
            .send(TcfEvent::new(status, success))
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn calls_to(&self, command: &str) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command == command)
            .cloned()
            .collect()
    }

    async fn delay_query(&self) {
        let delay = self.state.lock().query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn unsupported(&self, command: &str) -> ConsentError {
        ConsentError::transport(self.backend, format!("unsupported command {command:?}"))
    }

    async fn liveramp(&self, command: &str, parameter: &Value) -> Result<TcfResponse> {
        match command {
            "checkConsent" => {
                self.delay_query().await;
                let state = self.state.lock();
                if state.fail_queries {
                    return Ok(TcfResponse::failed());
                }
                let criteria = &parameter["data"][0];
                let vendor_ok = id_of(&criteria["vendorId"])
                    .is_some_and(|vendor| state.vendors.contains(&vendor));
                let purposes_ok = ids_of(&criteria["purposeIds"])
                    .iter()
                    .all(|p| state.purposes.contains(p));
                Ok(TcfResponse::ok(json!(vendor_ok && purposes_ok)))
            }
            "accept" => {
                let mut state = self.state.lock();
                state.vendors.extend(ids_of(&parameter["vendorIds"]));
                state.purposes.extend(ids_of(&parameter["purposeIds"]));
                Ok(TcfResponse::ok(Value::Null))
            }
            "reject" => {
                let mut state = self.state.lock();
                for vendor in ids_of(&parameter["vendorIds"]) {
                    state.vendors.remove(&vendor);
                }
                for purpose in ids_of(&parameter["purposeIds"]) {
                    state.purposes.remove(&purpose);
                }
                Ok(TcfResponse::ok(Value::Null))
            }
            "showConsentManager" | "toggleConsentTool" => Ok(TcfResponse::ok(Value::Null)),
            other => Err(self.unsupported(other)),
        }
    }

    async fn sourcepoint(&self, command: &str, parameter: &Value) -> Result<TcfResponse> {
        match command {
            "getCustomVendorConsents" => {
                self.delay_query().await;
                let state = self.state.lock();
                if state.fail_queries {
                    return Ok(TcfResponse::failed());
                }
                Ok(TcfResponse::ok(consent_lists(&state)))
            }
            "postCustomConsent" => {
                let mut state = self.state.lock();
                if state.refuse_decisions {
                    return Ok(TcfResponse::failed());
                }
                state.vendors.extend(ids_of(&parameter[0]));
                state.purposes.extend(ids_of(&parameter[1]));
                Ok(TcfResponse::ok(consent_lists(&state)))
            }
            "loadPrivacyManagerModal" => Ok(TcfResponse::ok(Value::Null)),
            other => Err(self.unsupported(other)),
        }
    }
}

#[async_trait]
impl TcfApi for SimulatedCmp {
    async fn call(
        &self,
        command: &str,
        version: Option<u8>,
        parameter: Value,
    ) -> Result<TcfResponse> {
        self.state.lock().calls.push(RecordedCall {
            command: command.to_string(),
            version,
            parameter: parameter.clone(),
        });
        match self.backend {
            CmpBackend::LiveRamp => self.liveramp(command, &parameter).await,
            CmpBackend::Sourcepoint => self.sourcepoint(command, &parameter).await,
        }
    }

    fn add_event_listener(&self) -> broadcast::Receiver<TcfEvent> {
        self.events.subscribe()
    }
}

fn consent_lists(state: &CmpState) -> Value {
    let entries = |ids: &BTreeSet<String>| -> Vec<Value> {
        ids.iter().map(|id| json!({ "_id": id })).collect()
    };
    json!({
        "consentedVendors": entries(&state.vendors),
        "consentedPurposes": entries(&state.purposes),
    })
}

fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn ids_of(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|ids| ids.iter().filter_map(id_of).collect())
        .unwrap_or_default()
}

/// Script loader that records what it was asked to do
#[derive(Default)]
pub struct RecordingLoader {
    loads: Mutex<HashMap<String, usize>>,
    swaps: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `delay` for every load and swap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make loads of `url` fail until [`RecordingLoader::heal`] is called.
    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().remove(url);
    }

    /// Attempted loads of `url`, failed ones included.
    pub fn load_count(&self, url: &str) -> usize {
        self.loads.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().values().sum()
    }

    /// Rendered live tags, in swap order.
    pub fn swaps(&self) -> Vec<String> {
        self.swaps.lock().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ScriptLoader for RecordingLoader {
    async fn load(&self, url: &str) -> Result<()> {
        *self.loads.lock().entry(url.to_string()).or_insert(0) += 1;
        self.pause().await;
        if self.failing.lock().contains(url) {
            return Err(ConsentError::ScriptLoad {
                url: url.to_string(),
                message: "simulated network failure".into(),
            });
        }
        Ok(())
    }

    async fn swap(&self, staged: &StagedScriptTag, live: &LiveScriptTag) -> Result<()> {
        self.pause().await;
        if let Some(src) = staged.staged_source() {
            if self.failing.lock().contains(src) {
                return Err(ConsentError::ScriptLoad {
                    url: src.to_string(),
                    message: "simulated network failure".into(),
                });
            }
        }
        self.swaps.lock().push(live.render());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveramp_check_consent_is_and() {
        let cmp = SimulatedCmp::new(CmpBackend::LiveRamp);
        cmp.grant_vendor(5);
        cmp.grant_purpose(1);
        let check = |purposes: Value| {
            json!({"data": [{"vendorId": 5, "purposeIds": purposes}], "recheckConsentOnChange": true})
        };

        let response = cmp.call("checkConsent", None, check(json!([1]))).await.unwrap();
        assert_eq!(response, TcfResponse::ok(json!(true)));
        let response = cmp
            .call("checkConsent", None, check(json!([1, 2])))
            .await
            .unwrap();
        assert_eq!(response, TcfResponse::ok(json!(false)));
        assert_eq!(cmp.calls_to("checkConsent").len(), 2);
    }

    #[tokio::test]
    async fn test_sourcepoint_lists_and_refusal() {
        let cmp = SimulatedCmp::new(CmpBackend::Sourcepoint);
        cmp.grant_vendor("abc");

        let response = cmp
            .call("getCustomVendorConsents", Some(2), Value::Null)
            .await
            .unwrap();
        assert_eq!(response.data["consentedVendors"][0]["_id"], "abc");

        cmp.refuse_decisions(true);
        let response = cmp
            .call("postCustomConsent", Some(2), json!([["def"], [], []]))
            .await
            .unwrap();
        assert!(!response.success);
        assert!(!cmp.has_vendor("def"));
    }

    #[tokio::test]
    async fn test_unknown_command_is_transport_error() {
        let cmp = SimulatedCmp::new(CmpBackend::Sourcepoint);
        assert!(matches!(
            cmp.call("checkConsent", None, Value::Null).await,
            Err(ConsentError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_loader_failure_is_reported() {
        let loader = RecordingLoader::new();
        loader.fail("https://x.example/a.js");
        assert!(loader.load("https://x.example/a.js").await.is_err());
        loader.heal("https://x.example/a.js");
        assert!(loader.load("https://x.example/a.js").await.is_ok());
        assert_eq!(loader.load_count("https://x.example/a.js"), 2);
    }
}
