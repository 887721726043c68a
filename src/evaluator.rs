//! Consent evaluation
//!
//! Turns a [`ConsentSnapshot`] plus the requested criteria into a grant or a
//! denial. The two backend rules are intentionally asymmetric and are kept
//! as separate functions:
//!
//! - LiveRamp: the library already resolved an AND over all purposes; the
//!   answer is taken as is.
//! - Sourcepoint: granted if the vendor is consented OR any requested
//!   purpose is.
//!
//! Anything undetermined (`success = false`, a payload of the wrong shape,
//! a snapshot from another backend) is a denial.

use tracing::warn;

use crate::domain::{
    CmpBackend, ConsentDecision, ConsentPayload, ConsentQuery, ConsentSnapshot, PurposeId,
    VendorId,
};

/// Backend-scoped consent rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentEvaluator {
    backend: CmpBackend,
}

impl ConsentEvaluator {
    pub fn new(backend: CmpBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> CmpBackend {
        self.backend
    }

    /// Whether a query for these criteria may be issued at all.
    ///
    /// LiveRamp needs a vendor; Sourcepoint needs a vendor or a purpose.
    /// Elements failing this stay in the placeholder without a CMP round trip.
    pub fn is_queryable(&self, query: &ConsentQuery) -> bool {
        match self.backend {
            CmpBackend::LiveRamp => query.vendor_id.is_some(),
            CmpBackend::Sourcepoint => !query.is_empty(),
        }
    }

    pub fn evaluate(&self, query: &ConsentQuery, snapshot: &ConsentSnapshot) -> ConsentDecision {
        if !snapshot.success {
            return ConsentDecision::Denied;
        }
        if snapshot.backend != self.backend {
            warn!(
                expected = %self.backend,
                actual = %snapshot.backend,
                "Consent snapshot from foreign backend, denying"
            );
            return ConsentDecision::Denied;
        }

        let granted = match (self.backend, &snapshot.payload) {
            (CmpBackend::LiveRamp, ConsentPayload::Resolved(granted)) => liveramp_grant(*granted),
            (
                CmpBackend::Sourcepoint,
                ConsentPayload::Lists {
                    consented_vendors,
                    consented_purposes,
                },
            ) => sourcepoint_grant(query, consented_vendors, consented_purposes),
            (backend, _) => {
                warn!(%backend, "Consent payload does not match backend, denying");
                false
            }
        };
        ConsentDecision::from_bool(granted)
    }
}

/// LiveRamp: the library-side AND is authoritative.
fn liveramp_grant(resolved: bool) -> bool {
    resolved
}

/// Sourcepoint: vendor consented OR any requested purpose consented.
fn sourcepoint_grant(
    query: &ConsentQuery,
    consented_vendors: &[VendorId],
    consented_purposes: &[PurposeId],
) -> bool {
    let vendor_granted = query
        .vendor_id
        .as_ref()
        .is_some_and(|vendor| consented_vendors.contains(vendor));
    let purpose_granted = query
        .purpose_ids
        .iter()
        .any(|purpose| consented_purposes.contains(purpose));
    vendor_granted || purpose_granted
}
