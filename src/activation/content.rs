//! Gated content state machine
//!
//! Every mounted element is either showing its placeholder or has its
//! captured markup injected into the slot. The slot doubles as the
//! idempotency guard: content is only injected into an empty slot.
//!
//! Answers from the CMP arrive asynchronously. Each element carries a
//! generation (assigned at mount) and a query sequence number; an answer is
//! applied only if both still match, so callbacks for unmounted, remounted
//! or superseded queries are dropped.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::cmp::ConsentSignalAdapter;
use crate::domain::{
    ActivationState, CmpBackend, ConsentQuery, DecisionRecord, ElementKey, PurposeId, VendorId,
};
use crate::error::{ConsentError, Result};
use crate::evaluator::ConsentEvaluator;
use crate::markup::GatedContentMarkup;

use super::{decide, BehaviorHost};

/// Criteria and captured markup of one gated element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedContent {
    pub vendor_id: Option<VendorId>,
    pub purpose_ids: Vec<PurposeId>,
    /// Markup captured once at creation, injected on grant
    pub content: String,
    pub recheck_on_change: bool,
}

impl GatedContent {
    pub fn new(
        vendor_id: Option<VendorId>,
        purpose_ids: Vec<PurposeId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            vendor_id,
            purpose_ids,
            content: content.into(),
            recheck_on_change: true,
        }
    }

    pub fn with_recheck(mut self, recheck: bool) -> Self {
        self.recheck_on_change = recheck;
        self
    }

    fn query(&self) -> ConsentQuery {
        ConsentQuery::new(self.vendor_id.clone(), self.purpose_ids.clone())
            .with_recheck(self.recheck_on_change)
    }
}

struct GatedElement {
    content: GatedContent,
    parent: Option<ElementKey>,
    generation: u64,
    query_seq: u64,
    evaluated: bool,
    state: ActivationState,
    slot: String,
}

/// Read-only snapshot of an element's visible state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementView {
    pub key: ElementKey,
    pub state: ActivationState,
    /// Contents of the injected-content slot
    pub injected: String,
    pub placeholder_visible: bool,
    /// Value of the accessibility expanded flag
    pub aria_expanded: bool,
    pub vendor_id: Option<VendorId>,
    pub purpose_ids: Vec<PurposeId>,
}

impl ElementView {
    fn new(key: &ElementKey, element: &GatedElement) -> Self {
        let injected = !element.slot.is_empty();
        Self {
            key: key.clone(),
            state: element.state,
            injected: element.slot.clone(),
            placeholder_visible: !injected,
            aria_expanded: injected,
            vendor_id: element.content.vendor_id.clone(),
            purpose_ids: element.content.purpose_ids.clone(),
        }
    }
}

/// Broadcast whenever an element transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub key: ElementKey,
    pub state: ActivationState,
}

enum Applied {
    Activated {
        content: String,
        children: Vec<ElementKey>,
    },
    Deactivated {
        detached: Vec<ElementKey>,
    },
    Unchanged,
}

type Elements = HashMap<ElementKey, GatedElement>;

/// Drives placeholder/active transitions for every mounted element
pub struct ContentActivationController {
    adapter: Arc<dyn ConsentSignalAdapter>,
    evaluator: ConsentEvaluator,
    markup: GatedContentMarkup,
    host: Arc<dyn BehaviorHost>,
    elements: Mutex<Elements>,
    generations: AtomicU64,
    changes: broadcast::Sender<StateChange>,
}

impl ContentActivationController {
    pub fn new(
        adapter: Arc<dyn ConsentSignalAdapter>,
        markup: GatedContentMarkup,
        host: Arc<dyn BehaviorHost>,
        event_buffer: usize,
    ) -> Self {
        let evaluator = ConsentEvaluator::new(adapter.backend());
        let (changes, _) = broadcast::channel(event_buffer.max(1));
        Self {
            adapter,
            evaluator,
            markup,
            host,
            elements: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            changes,
        }
    }

    pub fn backend(&self) -> CmpBackend {
        self.evaluator.backend()
    }

    /// Stream of state transitions.
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Register an element under a stable key.
    ///
    /// Registration is attach-once: mounting a key that is already mounted
    /// is a no-op and returns `false`.
    pub fn mount(&self, key: ElementKey, content: GatedContent) -> bool {
        let mut elements = self.elements.lock();
        self.mount_locked(&mut elements, key, content, None)
    }

    /// Scan `html` for gated containers and mount them as `scope/0`,
    /// `scope/1`, ... in document order.
    ///
    /// Containers with invalid criteria are skipped and keep their
    /// placeholder.
    pub fn mount_markup(&self, scope: &ElementKey, html: &str) -> Vec<ElementKey> {
        let mut elements = self.elements.lock();
        self.mount_scanned(&mut elements, scope, html, None)
    }

    /// Remove an element and everything nested in it.
    ///
    /// In-flight answers for the removed elements are dropped when they
    /// arrive.
    pub fn unmount(&self, key: &ElementKey) -> bool {
        let detached = {
            let mut elements = self.elements.lock();
            if !elements.contains_key(key) {
                return false;
            }
            let mut detached = Vec::new();
            for k in subtree(&elements, key).iter().rev() {
                if let Some(element) = elements.remove(k) {
                    if !element.slot.is_empty() {
                        detached.push(k.clone());
                    }
                }
            }
            detached
        };
        for scope in &detached {
            self.host.detach(scope);
        }
        debug!(%key, "Element unmounted");
        true
    }

    pub fn is_mounted(&self, key: &ElementKey) -> bool {
        self.elements.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.lock().is_empty()
    }

    pub fn state(&self, key: &ElementKey) -> Option<ActivationState> {
        self.elements.lock().get(key).map(|e| e.state)
    }

    pub fn view(&self, key: &ElementKey) -> Option<ElementView> {
        self.elements
            .lock()
            .get(key)
            .map(|element| ElementView::new(key, element))
    }

    /// Views of all mounted elements, ordered by key.
    pub fn views(&self) -> Vec<ElementView> {
        let elements = self.elements.lock();
        let mut views: Vec<_> = elements
            .iter()
            .map(|(key, element)| ElementView::new(key, element))
            .collect();
        views.sort_by(|a, b| a.key.cmp(&b.key));
        views
    }

    /// Query consent for one element and apply the answer.
    ///
    /// Elements mounted by the resulting injection are evaluated too.
    /// Returns the element's state afterwards, `None` if it is not mounted.
    #[instrument(skip(self), fields(backend = %self.backend()))]
    pub async fn check_consent(&self, key: &ElementKey) -> Option<ActivationState> {
        self.evaluate_all(vec![key.clone()]).await;
        self.state(key)
    }

    /// Re-run the consent check for every element that rechecks on change,
    /// and for those never evaluated yet. Returns how many were checked.
    #[instrument(skip(self), fields(backend = %self.backend()))]
    pub async fn refresh_all(&self) -> usize {
        let keys = {
            let elements = self.elements.lock();
            let mut keys: Vec<_> = elements
                .iter()
                .filter(|(_, e)| e.content.recheck_on_change || !e.evaluated)
                .map(|(k, _)| k.clone())
                .collect();
            keys.sort();
            keys
        };
        let checked = keys.len();
        self.evaluate_all(keys).await;
        checked
    }

    /// Inject the captured content unless the slot is already filled.
    ///
    /// Returns whether the element transitioned.
    pub async fn activate(&self, key: &ElementKey) -> bool {
        let applied = {
            let mut elements = self.elements.lock();
            self.inject_locked(&mut elements, key)
        };
        let changed = !matches!(applied, Applied::Unchanged);
        let children = self.finish(key, applied).await;
        self.evaluate_all(children).await;
        changed
    }

    /// Clear the slot and show the placeholder again.
    ///
    /// Returns whether the element transitioned.
    pub fn deactivate(&self, key: &ElementKey) -> bool {
        let applied = {
            let mut elements = self.elements.lock();
            self.clear_locked(&mut elements, key)
        };
        match applied {
            Applied::Deactivated { detached } => {
                self.after_clear(key, &detached);
                true
            }
            _ => false,
        }
    }

    /// Explicit user toggle.
    ///
    /// An active element records a vendor-only reject, a placeholder records
    /// an accept for the vendor and its purposes. The element transitions
    /// only if the adapter's outcome permits it; a failed record leaves it
    /// untouched and returns the error.
    #[instrument(skip(self), fields(backend = %self.backend()))]
    pub async fn toggle(&self, key: &ElementKey) -> Result<ActivationState> {
        let (record, generation, active) = {
            let elements = self.elements.lock();
            let element = elements.get(key).ok_or_else(|| {
                ConsentError::Internal(format!("no gated element mounted at {key}"))
            })?;
            let Some(vendor_id) = element.content.vendor_id.clone() else {
                debug!(%key, "Toggle ignored, element has no vendor");
                return Ok(element.state);
            };
            let active = !element.slot.is_empty();
            let record = if active {
                DecisionRecord::reject_vendor(vendor_id)
            } else {
                DecisionRecord::accept(vendor_id, element.content.purpose_ids.clone())
            };
            (record, element.generation, active)
        };

        let outcome = self.adapter.record_decision(&record).await?;
        if !outcome.permits_transition() {
            info!(%key, ?outcome, "Decision not confirmed, state kept");
            return Ok(self.state(key).unwrap_or(ActivationState::Placeholder));
        }

        let applied = {
            let mut elements = self.elements.lock();
            match elements.get_mut(key) {
                Some(element) if element.generation == generation => {
                    // Supersede answers to queries issued before the decision.
                    element.query_seq += 1;
                }
                _ => {
                    debug!(%key, "Element gone before decision completed");
                    return Ok(ActivationState::Placeholder);
                }
            }
            if active {
                self.clear_locked(&mut elements, key)
            } else {
                self.inject_locked(&mut elements, key)
            }
        };
        let children = self.finish(key, applied).await;
        self.evaluate_all(children).await;
        Ok(self.state(key).unwrap_or(ActivationState::Placeholder))
    }

    /// Open the CMP's consent dialog from an element's settings button.
    pub async fn open_manager(&self) -> Result<()> {
        self.adapter.open_manager().await
    }

    async fn evaluate_all(&self, keys: Vec<ElementKey>) {
        let mut queue = VecDeque::from(keys);
        while let Some(key) = queue.pop_front() {
            queue.extend(self.evaluate_one(&key).await);
        }
    }

    async fn evaluate_one(&self, key: &ElementKey) -> Vec<ElementKey> {
        let (query, generation, seq) = {
            let mut elements = self.elements.lock();
            let Some(element) = elements.get_mut(key) else {
                debug!(%key, "Element not mounted, nothing to check");
                return Vec::new();
            };
            element.query_seq += 1;
            (element.content.query(), element.generation, element.query_seq)
        };

        let Some(decision) = decide(self.adapter.as_ref(), &self.evaluator, &query).await else {
            return Vec::new();
        };

        let applied = {
            let mut elements = self.elements.lock();
            match elements.get_mut(key) {
                Some(element) if element.generation == generation && element.query_seq == seq => {
                    element.evaluated = true;
                }
                _ => {
                    debug!(%key, "Dropping stale consent answer");
                    return Vec::new();
                }
            }
            if decision.is_granted() {
                self.inject_locked(&mut elements, key)
            } else {
                self.clear_locked(&mut elements, key)
            }
        };
        self.finish(key, applied).await
    }

    fn mount_locked(
        &self,
        elements: &mut Elements,
        key: ElementKey,
        content: GatedContent,
        parent: Option<ElementKey>,
    ) -> bool {
        if elements.contains_key(&key) {
            debug!(%key, "Element already mounted");
            return false;
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(%key, generation, "Element mounted");
        elements.insert(
            key,
            GatedElement {
                content,
                parent,
                generation,
                query_seq: 0,
                evaluated: false,
                state: ActivationState::Placeholder,
                slot: String::new(),
            },
        );
        true
    }

    fn mount_scanned(
        &self,
        elements: &mut Elements,
        scope: &ElementKey,
        html: &str,
        parent: Option<&ElementKey>,
    ) -> Vec<ElementKey> {
        let (found, errors) = self.markup.scan(html);
        for error in errors {
            warn!(%scope, %error, "Skipping malformed gated container");
        }

        let mut mounted = Vec::new();
        for (index, parsed) in found.into_iter().enumerate() {
            let key = scope.child(index);
            match parsed.criteria(self.backend()) {
                Ok((vendor_id, purpose_ids)) => {
                    let content = GatedContent::new(vendor_id, purpose_ids, parsed.content);
                    if self.mount_locked(elements, key.clone(), content, parent.cloned()) {
                        mounted.push(key);
                    }
                }
                Err(error) => {
                    warn!(%key, %error, "Invalid gated container criteria, keeping placeholder")
                }
            }
        }
        mounted
    }

    fn inject_locked(&self, elements: &mut Elements, key: &ElementKey) -> Applied {
        let Some(element) = elements.get_mut(key) else {
            return Applied::Unchanged;
        };
        if !element.slot.is_empty() {
            debug!(%key, "Content already injected");
            return Applied::Unchanged;
        }
        element.slot = element.content.content.clone();
        element.state = ActivationState::Active;
        let content = element.slot.clone();

        // Injected markup may itself carry gated elements.
        let children = self.mount_scanned(elements, key, &content, Some(key));
        Applied::Activated { content, children }
    }

    fn clear_locked(&self, elements: &mut Elements, key: &ElementKey) -> Applied {
        match elements.get(key) {
            None => return Applied::Unchanged,
            Some(element)
                if element.state == ActivationState::Placeholder && element.slot.is_empty() =>
            {
                return Applied::Unchanged;
            }
            Some(_) => {}
        }

        // Nested elements live inside the slot and go away with it.
        let mut detached = Vec::new();
        for k in subtree(elements, key).iter().skip(1).rev() {
            if let Some(nested) = elements.remove(k) {
                if !nested.slot.is_empty() {
                    detached.push(k.clone());
                }
            }
        }
        if let Some(element) = elements.get_mut(key) {
            element.slot.clear();
            element.state = ActivationState::Placeholder;
        }
        detached.push(key.clone());
        Applied::Deactivated { detached }
    }

    async fn finish(&self, key: &ElementKey, applied: Applied) -> Vec<ElementKey> {
        match applied {
            Applied::Activated { content, children } => {
                info!(%key, nested = children.len(), "Gated content activated");
                self.host.attach(key, &content).await;
                self.notify(key, ActivationState::Active);
                children
            }
            Applied::Deactivated { detached } => {
                self.after_clear(key, &detached);
                Vec::new()
            }
            Applied::Unchanged => Vec::new(),
        }
    }

    fn after_clear(&self, key: &ElementKey, detached: &[ElementKey]) {
        for scope in detached {
            self.host.detach(scope);
        }
        info!(%key, "Gated content reset to placeholder");
        self.notify(key, ActivationState::Placeholder);
    }

    fn notify(&self, key: &ElementKey, state: ActivationState) {
        // No receivers is fine.
        let _ = self.changes.send(StateChange {
            key: key.clone(),
            state,
        });
    }
}

/// `root` followed by all its descendants, parents before children.
fn subtree(elements: &Elements, root: &ElementKey) -> Vec<ElementKey> {
    let mut out = vec![root.clone()];
    let mut next = 0;
    while next < out.len() {
        let parent = out[next].clone();
        let mut children: Vec<_> = elements
            .iter()
            .filter(|(_, e)| e.parent.as_ref() == Some(&parent))
            .map(|(k, _)| k.clone())
            .collect();
        children.sort();
        out.extend(children);
        next += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{MockBehaviorHost, NoopBehaviorHost};
    use crate::cmp::MockConsentSignalAdapter;
    use crate::domain::{
        ConsentPayload, ConsentSnapshot, DecisionKind, RecordOutcome, Vendor,
    };
    use std::sync::atomic::AtomicBool;

    const IFRAME: &str = r#"<iframe src="https://www.youtube.com/embed/x"></iframe>"#;

    fn liveramp(granted: Arc<AtomicBool>) -> MockConsentSignalAdapter {
        let mut adapter = MockConsentSignalAdapter::new();
        adapter.expect_backend().return_const(CmpBackend::LiveRamp);
        adapter.expect_query().returning(move |_| {
            Ok(ConsentSnapshot {
                backend: CmpBackend::LiveRamp,
                success: true,
                payload: ConsentPayload::Resolved(granted.load(Ordering::SeqCst)),
            })
        });
        adapter
    }

    fn controller(
        adapter: MockConsentSignalAdapter,
        host: Arc<dyn BehaviorHost>,
    ) -> ContentActivationController {
        ContentActivationController::new(
            Arc::new(adapter),
            GatedContentMarkup::default(),
            host,
            16,
        )
    }

    fn youtube(content: &str) -> GatedContent {
        GatedContent::new(
            Some(VendorId::Numeric(10193)),
            vec![PurposeId::Numeric(1)],
            content,
        )
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let mut host = MockBehaviorHost::new();
        host.expect_attach().times(1).return_const(());
        let controller = controller(
            liveramp(Arc::new(AtomicBool::new(true))),
            Arc::new(host),
        );
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));

        assert!(controller.activate(&key).await);
        assert!(!controller.activate(&key).await);

        let view = controller.view(&key).unwrap();
        assert_eq!(view.injected, IFRAME);
        assert!(!view.placeholder_visible);
        assert!(view.aria_expanded);
    }

    #[tokio::test]
    async fn test_check_consent_follows_decision() {
        let granted = Arc::new(AtomicBool::new(true));
        let mut host = MockBehaviorHost::new();
        host.expect_attach().times(1).return_const(());
        host.expect_detach().times(1).return_const(());
        let controller = controller(liveramp(granted.clone()), Arc::new(host));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));

        assert_eq!(
            controller.check_consent(&key).await,
            Some(ActivationState::Active)
        );
        // repeated grants leave the slot alone
        controller.check_consent(&key).await;
        assert_eq!(controller.view(&key).unwrap().injected, IFRAME);

        granted.store(false, Ordering::SeqCst);
        assert_eq!(
            controller.check_consent(&key).await,
            Some(ActivationState::Placeholder)
        );
        let view = controller.view(&key).unwrap();
        assert!(view.injected.is_empty());
        assert!(view.placeholder_visible);
        assert!(!view.aria_expanded);
    }

    #[tokio::test]
    async fn test_query_error_keeps_placeholder() {
        let mut adapter = MockConsentSignalAdapter::new();
        adapter.expect_backend().return_const(CmpBackend::LiveRamp);
        adapter
            .expect_query()
            .returning(|_| Err(ConsentError::transport(CmpBackend::LiveRamp, "no cmp")));
        let controller = controller(adapter, Arc::new(NoopBehaviorHost));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));

        assert_eq!(
            controller.check_consent(&key).await,
            Some(ActivationState::Placeholder)
        );
    }

    #[tokio::test]
    async fn test_nested_elements_attach_and_detach() {
        let markup = GatedContentMarkup::default();
        let vendor = Vendor::new(
            "vimeo",
            VendorId::Numeric(10192),
            "Vimeo",
            None,
            vec![PurposeId::Numeric(1)],
        );
        let inner = markup.render(&vendor, &vendor.purpose_ids, "<p>inner</p>");
        let outer = format!("<section>{inner}</section>");

        let granted = Arc::new(AtomicBool::new(true));
        let controller = controller(liveramp(granted.clone()), Arc::new(NoopBehaviorHost));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(&outer));

        controller.check_consent(&key).await;
        let child = key.child(0);
        assert_eq!(controller.state(&child), Some(ActivationState::Active));
        assert_eq!(controller.view(&child).unwrap().injected, "<p>inner</p>");

        assert!(controller.deactivate(&key));
        assert!(!controller.is_mounted(&child));
        assert_eq!(controller.len(), 1);
    }

    #[tokio::test]
    async fn test_mount_is_attach_once() {
        let controller = controller(
            liveramp(Arc::new(AtomicBool::new(false))),
            Arc::new(NoopBehaviorHost),
        );
        let key = ElementKey::new("page/0");
        assert!(controller.mount(key.clone(), youtube(IFRAME)));
        assert!(!controller.mount(key, youtube("<p>other</p>")));
        assert_eq!(controller.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_off_rejects_vendor_only() {
        let mut adapter = liveramp(Arc::new(AtomicBool::new(true)));
        adapter
            .expect_record_decision()
            .withf(|record| {
                record.kind == DecisionKind::Reject
                    && record.vendor_ids == vec![VendorId::Numeric(10193)]
                    && record.purpose_ids.is_none()
            })
            .times(1)
            .returning(|_| Ok(RecordOutcome::Dispatched));
        let controller = controller(adapter, Arc::new(NoopBehaviorHost));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));
        controller.check_consent(&key).await;

        let state = controller.toggle(&key).await.unwrap();
        assert_eq!(state, ActivationState::Placeholder);
    }

    #[tokio::test]
    async fn test_toggle_on_waits_for_confirmation() {
        let confirmed = Arc::new(AtomicBool::new(false));
        let mut adapter = liveramp(Arc::new(AtomicBool::new(false)));
        let flag = confirmed.clone();
        adapter
            .expect_record_decision()
            .withf(|record| {
                record.kind == DecisionKind::Accept
                    && record.purpose_ids == Some(vec![PurposeId::Numeric(1)])
                    && record.legitimate_interest_purpose_ids.is_empty()
            })
            .times(2)
            .returning(move |_| {
                Ok(if flag.load(Ordering::SeqCst) {
                    RecordOutcome::Confirmed
                } else {
                    RecordOutcome::Refused
                })
            });
        let controller = controller(adapter, Arc::new(NoopBehaviorHost));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));

        assert_eq!(
            controller.toggle(&key).await.unwrap(),
            ActivationState::Placeholder
        );
        confirmed.store(true, Ordering::SeqCst);
        assert_eq!(
            controller.toggle(&key).await.unwrap(),
            ActivationState::Active
        );
    }

    #[tokio::test]
    async fn test_toggle_record_failure_keeps_state() {
        let mut adapter = liveramp(Arc::new(AtomicBool::new(false)));
        adapter
            .expect_record_decision()
            .returning(|_| Err(ConsentError::transport(CmpBackend::LiveRamp, "gone")));
        let controller = controller(adapter, Arc::new(NoopBehaviorHost));
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));

        assert!(controller.toggle(&key).await.is_err());
        assert_eq!(controller.state(&key), Some(ActivationState::Placeholder));
    }

    #[tokio::test]
    async fn test_refresh_skips_evaluated_non_recheck() {
        let controller = controller(
            liveramp(Arc::new(AtomicBool::new(false))),
            Arc::new(NoopBehaviorHost),
        );
        controller.mount(ElementKey::new("a"), youtube(IFRAME));
        controller.mount(ElementKey::new("b"), youtube(IFRAME).with_recheck(false));

        assert_eq!(controller.refresh_all().await, 2);
        assert_eq!(controller.refresh_all().await, 1);
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let controller = controller(
            liveramp(Arc::new(AtomicBool::new(true))),
            Arc::new(NoopBehaviorHost),
        );
        let mut changes = controller.changes();
        let key = ElementKey::new("page/0");
        controller.mount(key.clone(), youtube(IFRAME));
        controller.check_consent(&key).await;

        let change = changes.try_recv().unwrap();
        assert_eq!(change.key, key);
        assert_eq!(change.state, ActivationState::Active);
    }

    #[tokio::test]
    async fn test_mount_markup_skips_invalid_criteria() {
        let controller = controller(
            liveramp(Arc::new(AtomicBool::new(false))),
            Arc::new(NoopBehaviorHost),
        );
        let html = r#"<div data-cmp-conditional-content="&lt;p&gt;a&lt;/p&gt;" data-cmp-vendor="10193"></div>
<div data-cmp-conditional-content="&lt;p&gt;b&lt;/p&gt;" data-cmp-vendor="5eb97b26"></div>"#;

        let mounted = controller.mount_markup(&ElementKey::new("page"), html);
        assert_eq!(mounted, vec![ElementKey::new("page/0")]);
    }
}
