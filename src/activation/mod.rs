//! Activation controllers
//!
//! - [`ContentActivationController`]: placeholder/active state machine for
//!   gated content elements
//! - [`ScriptActivationController`]: at-most-once loading of gated scripts
//! - [`PrivacyManagerControl`] / [`PrivacyManagerGuard`]: page-level manager
//!   button and consent-UI suppression
//!
//! Controllers never fail a page: adapter errors and undetermined answers
//! are logged and degrade to the placeholder (or not-loaded) state.

mod content;
mod privacy_manager;
mod script;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cmp::ConsentSignalAdapter;
use crate::domain::{ConsentDecision, ConsentQuery, ElementKey};
use crate::evaluator::ConsentEvaluator;

pub use content::{ContentActivationController, ElementView, GatedContent, StateChange};
pub use privacy_manager::{PrivacyManagerControl, PrivacyManagerGuard};
pub use script::{LoadedScripts, ScriptActivationController, ScriptEntry, ScriptLoader};

#[cfg(test)]
pub use script::MockScriptLoader;

/// Attaches runtime behaviour to a freshly injected markup subtree
///
/// Called after gated content was injected (`attach`) and before it is
/// cleared again (`detach`), keyed by the injecting element.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BehaviorHost: Send + Sync {
    async fn attach(&self, scope: &ElementKey, markup: &str);

    fn detach(&self, scope: &ElementKey);
}

/// Host that attaches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBehaviorHost;

#[async_trait]
impl BehaviorHost for NoopBehaviorHost {
    async fn attach(&self, _scope: &ElementKey, _markup: &str) {}

    fn detach(&self, _scope: &ElementKey) {}
}

/// Fans attach/detach out to several hosts in order
#[derive(Default, Clone)]
pub struct CompositeBehaviorHost {
    hosts: Vec<Arc<dyn BehaviorHost>>,
}

impl CompositeBehaviorHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, host: Arc<dyn BehaviorHost>) -> Self {
        self.hosts.push(host);
        self
    }
}

#[async_trait]
impl BehaviorHost for CompositeBehaviorHost {
    async fn attach(&self, scope: &ElementKey, markup: &str) {
        for host in &self.hosts {
            host.attach(scope, markup).await;
        }
    }

    fn detach(&self, scope: &ElementKey) {
        for host in self.hosts.iter().rev() {
            host.detach(scope);
        }
    }
}

/// Query the CMP and evaluate, failing closed.
///
/// `None` when the criteria are not queryable for this backend; such
/// elements keep their current state without a CMP round trip.
pub(crate) async fn decide(
    adapter: &dyn ConsentSignalAdapter,
    evaluator: &ConsentEvaluator,
    query: &ConsentQuery,
) -> Option<ConsentDecision> {
    if !evaluator.is_queryable(query) {
        debug!(?query, "Nothing to check consent for");
        return None;
    }
    match adapter.query(query).await {
        Ok(snapshot) => Some(evaluator.evaluate(query, &snapshot)),
        Err(e) => {
            warn!(error = %e, "Consent query failed, denying");
            Some(ConsentDecision::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmp::MockConsentSignalAdapter;
    use crate::domain::{CmpBackend, ConsentPayload, ConsentSnapshot, VendorId};
    use crate::error::ConsentError;

    #[tokio::test]
    async fn test_decide_fails_closed_on_error() {
        let mut adapter = MockConsentSignalAdapter::new();
        adapter
            .expect_query()
            .returning(|_| Err(ConsentError::transport(CmpBackend::LiveRamp, "bridge gone")));

        let evaluator = ConsentEvaluator::new(CmpBackend::LiveRamp);
        let query = ConsentQuery::new(Some(VendorId::Numeric(5)), Vec::new());
        assert_eq!(
            decide(&adapter, &evaluator, &query).await,
            Some(ConsentDecision::Denied)
        );
    }

    #[tokio::test]
    async fn test_decide_skips_unqueryable() {
        let mut adapter = MockConsentSignalAdapter::new();
        adapter.expect_query().never();

        let evaluator = ConsentEvaluator::new(CmpBackend::LiveRamp);
        assert_eq!(
            decide(&adapter, &evaluator, &ConsentQuery::default()).await,
            None
        );
    }

    #[tokio::test]
    async fn test_decide_grants() {
        let mut adapter = MockConsentSignalAdapter::new();
        adapter.expect_query().returning(|_| {
            Ok(ConsentSnapshot {
                backend: CmpBackend::LiveRamp,
                success: true,
                payload: ConsentPayload::Resolved(true),
            })
        });

        let evaluator = ConsentEvaluator::new(CmpBackend::LiveRamp);
        let query = ConsentQuery::new(Some(VendorId::Numeric(5)), Vec::new());
        assert_eq!(
            decide(&adapter, &evaluator, &query).await,
            Some(ConsentDecision::Granted)
        );
    }

    #[tokio::test]
    async fn test_composite_detaches_in_reverse() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut first = MockBehaviorHost::new();
        let log = order.clone();
        first.expect_detach().returning(move |_| log.lock().push("first"));
        let mut second = MockBehaviorHost::new();
        let log = order.clone();
        second.expect_detach().returning(move |_| log.lock().push("second"));

        let host = CompositeBehaviorHost::new()
            .with(Arc::new(first))
            .with(Arc::new(second));
        host.detach(&ElementKey::new("page"));
        assert_eq!(*order.lock(), vec!["second", "first"]);
    }
}
