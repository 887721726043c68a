//! Consent signals exchanged with a CMP
//!
//! Lifecycle events, consent queries and their backend-shaped answers, and
//! explicit decisions recorded on behalf of the user.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CmpBackend, PurposeId, VendorId};

/// CMP lifecycle status reported with every listener callback
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// LiveRamp library finished booting
    #[serde(rename = "cmpReady")]
    CmpReady,
    /// Consent string loaded (TCF v2)
    #[serde(rename = "tcloaded")]
    TcLoaded,
    /// Consent UI became visible
    #[serde(rename = "cmpuishown")]
    CmpUiShown,
    /// User finished interacting with the consent UI
    #[serde(rename = "useractioncomplete")]
    UserActionComplete,
    /// LiveRamp consent notice rendered
    #[serde(rename = "consentNoticeDisplayed")]
    ConsentNoticeDisplayed,
    /// Any status this crate does not interpret
    #[serde(other)]
    Other,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::CmpReady => "cmpReady",
            EventStatus::TcLoaded => "tcloaded",
            EventStatus::CmpUiShown => "cmpuishown",
            EventStatus::UserActionComplete => "useractioncomplete",
            EventStatus::ConsentNoticeDisplayed => "consentNoticeDisplayed",
            EventStatus::Other => "other",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which lifecycle events a subscriber wants to see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleFilter {
    Any,
    Status(EventStatus),
}

impl LifecycleFilter {
    pub fn matches(&self, status: &EventStatus) -> bool {
        match self {
            LifecycleFilter::Any => true,
            LifecycleFilter::Status(s) => s == status,
        }
    }
}

/// A lifecycle event as delivered to subscribers
///
/// Events may repeat for the whole session; reactions must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentEvent {
    pub backend: CmpBackend,
    pub event_status: EventStatus,
    pub success: bool,
}

/// Criteria for a consent query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsentQuery {
    pub vendor_id: Option<VendorId>,
    pub purpose_ids: Vec<PurposeId>,
    pub recheck_on_change: bool,
}

impl ConsentQuery {
    pub fn new(vendor_id: Option<VendorId>, purpose_ids: Vec<PurposeId>) -> Self {
        Self {
            vendor_id,
            purpose_ids,
            recheck_on_change: true,
        }
    }

    pub fn with_recheck(mut self, recheck: bool) -> Self {
        self.recheck_on_change = recheck;
        self
    }

    /// Whether there is anything to ask the CMP about at all.
    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_none() && self.purpose_ids.is_empty()
    }
}

/// Backend-shaped answer to a consent query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentPayload {
    /// LiveRamp: the library already decided for the whole criteria set
    Resolved(bool),
    /// Sourcepoint: raw consent lists, matched by the caller
    Lists {
        consented_vendors: Vec<VendorId>,
        consented_purposes: Vec<PurposeId>,
    },
}

impl ConsentPayload {
    pub fn empty_lists() -> Self {
        ConsentPayload::Lists {
            consented_vendors: Vec::new(),
            consented_purposes: Vec::new(),
        }
    }
}

/// Result of one consent query
///
/// `success = false` means undetermined and is evaluated as a denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentSnapshot {
    pub backend: CmpBackend,
    pub success: bool,
    pub payload: ConsentPayload,
}

impl ConsentSnapshot {
    pub fn undetermined(backend: CmpBackend) -> Self {
        let payload = match backend {
            CmpBackend::LiveRamp => ConsentPayload::Resolved(false),
            CmpBackend::Sourcepoint => ConsentPayload::empty_lists(),
        };
        Self {
            backend,
            success: false,
            payload,
        }
    }
}

/// Grant or deny, recomputed on every signal and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
}

impl ConsentDecision {
    pub fn from_bool(granted: bool) -> Self {
        if granted {
            ConsentDecision::Granted
        } else {
            ConsentDecision::Denied
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, ConsentDecision::Granted)
    }
}

/// Explicit user choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Accept,
    Reject,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Accept => "accept",
            DecisionKind::Reject => "reject",
        }
    }
}

/// An explicit decision to persist with the CMP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRecord {
    pub kind: DecisionKind,
    pub vendor_ids: Vec<VendorId>,
    /// `None` rejects only the vendor, leaving its purposes untouched
    pub purpose_ids: Option<Vec<PurposeId>>,
    pub legitimate_interest_purpose_ids: Vec<PurposeId>,
}

impl DecisionRecord {
    /// Grant a single vendor for the given purposes.
    pub fn accept(vendor_id: VendorId, purpose_ids: Vec<PurposeId>) -> Self {
        Self {
            kind: DecisionKind::Accept,
            vendor_ids: vec![vendor_id],
            purpose_ids: Some(purpose_ids),
            legitimate_interest_purpose_ids: Vec::new(),
        }
    }

    /// Revoke a single vendor without touching its purposes.
    pub fn reject_vendor(vendor_id: VendorId) -> Self {
        Self {
            kind: DecisionKind::Reject,
            vendor_ids: vec![vendor_id],
            purpose_ids: None,
            legitimate_interest_purpose_ids: Vec::new(),
        }
    }
}

/// How the CMP answered a recorded decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Fire-and-forget backend: command sent, no confirmation will follow
    Dispatched,
    /// Confirmation-requiring backend reported success
    Confirmed,
    /// Confirmation-requiring backend reported failure
    Refused,
    /// The backend has no command for this decision
    Unsupported,
}

impl RecordOutcome {
    /// Whether the UI may transition to the decided state.
    pub fn permits_transition(&self) -> bool {
        matches!(self, RecordOutcome::Dispatched | RecordOutcome::Confirmed)
    }
}

/// Visible state of a gated element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Placeholder,
    Active,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::Placeholder => f.write_str("placeholder"),
            ActivationState::Active => f.write_str("active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_status_wire_names() {
        let status: EventStatus = serde_json::from_str("\"useractioncomplete\"").unwrap();
        assert_eq!(status, EventStatus::UserActionComplete);
        let status: EventStatus = serde_json::from_str("\"cmpReady\"").unwrap();
        assert_eq!(status, EventStatus::CmpReady);
        let status: EventStatus = serde_json::from_str("\"somethingNew\"").unwrap();
        assert_eq!(status, EventStatus::Other);
    }

    #[test]
    fn test_reject_vendor_drops_purposes() {
        let record = DecisionRecord::reject_vendor(VendorId::Numeric(5));
        assert_eq!(record.kind, DecisionKind::Reject);
        assert!(record.purpose_ids.is_none());
        assert!(record.legitimate_interest_purpose_ids.is_empty());
    }

    #[test]
    fn test_record_outcome_transitions() {
        assert!(RecordOutcome::Dispatched.permits_transition());
        assert!(RecordOutcome::Confirmed.permits_transition());
        assert!(!RecordOutcome::Refused.permits_transition());
        assert!(!RecordOutcome::Unsupported.permits_transition());
    }

    #[test]
    fn test_undetermined_snapshot_is_unsuccessful() {
        let snap = ConsentSnapshot::undetermined(CmpBackend::Sourcepoint);
        assert!(!snap.success);
        assert_eq!(snap.payload, ConsentPayload::empty_lists());
    }
}
