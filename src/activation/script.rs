//! Gated script loading
//!
//! Scripts come from two places: a declarative table of URLs and staged
//! (`type="text/plain"`) tags found in attached markup. Either way a script
//! is loaded at most once per [`LoadedScripts`] registry. The registry is
//! claimed before the fetch starts, with no suspension point between check
//! and mark, and released again if the fetch fails.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cmp::ConsentSignalAdapter;
use crate::domain::{CmpBackend, ConsentQuery, ElementKey, PurposeId, VendorId};
use crate::error::Result;
use crate::evaluator::ConsentEvaluator;
use crate::markup::{LiveScriptTag, MarkupAttributes, StagedScriptTag};

use super::{decide, BehaviorHost};

/// Process-wide set of already loaded script identities
#[derive(Debug, Default)]
pub struct LoadedScripts {
    urls: Mutex<HashSet<String>>,
}

impl LoadedScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check and mark `url`. `true` means the caller owns the
    /// load; `false` means someone else already does.
    pub fn try_claim(&self, url: &str) -> bool {
        self.urls.lock().insert(url.to_string())
    }

    /// Give up a claim after a failed load.
    pub fn release(&self, url: &str) -> bool {
        self.urls.lock().remove(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.lock().contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.lock().is_empty()
    }
}

/// Executes gated scripts in the hosting page
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Fetch and execute an external script.
    async fn load(&self, url: &str) -> Result<()>;

    /// Replace a staged tag by its live clone: detach the staged node and
    /// append the live one.
    async fn swap(&self, staged: &StagedScriptTag, live: &LiveScriptTag) -> Result<()>;
}

/// One entry of the declarative script table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub group: String,
    pub url: String,
    pub vendor_id: Option<VendorId>,
    pub purpose_ids: Vec<PurposeId>,
    /// Query again on every lifecycle event instead of only once
    pub recheck_on_change: bool,
}

impl ScriptEntry {
    fn query(&self) -> ConsentQuery {
        ConsentQuery::new(self.vendor_id.clone(), self.purpose_ids.clone())
            .with_recheck(self.recheck_on_change)
    }
}

#[derive(Debug, Clone)]
struct StagedScript {
    /// Staged source URL, or a scope-derived key for inline scripts
    identity: String,
    tag: StagedScriptTag,
    vendor_id: Option<VendorId>,
    purpose_ids: Vec<PurposeId>,
}

/// Loads gated scripts once consent allows it
pub struct ScriptActivationController {
    adapter: Arc<dyn ConsentSignalAdapter>,
    evaluator: ConsentEvaluator,
    loader: Arc<dyn ScriptLoader>,
    loaded: Arc<LoadedScripts>,
    attrs: MarkupAttributes,
    entries: Vec<ScriptEntry>,
    evaluated: Mutex<HashSet<String>>,
    staged: Mutex<BTreeMap<ElementKey, Vec<StagedScript>>>,
}

impl ScriptActivationController {
    pub fn new(
        adapter: Arc<dyn ConsentSignalAdapter>,
        loader: Arc<dyn ScriptLoader>,
        loaded: Arc<LoadedScripts>,
        attrs: MarkupAttributes,
    ) -> Self {
        let evaluator = ConsentEvaluator::new(adapter.backend());
        Self {
            adapter,
            evaluator,
            loader,
            loaded,
            attrs,
            entries: Vec::new(),
            evaluated: Mutex::new(HashSet::new()),
            staged: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_entries(mut self, entries: Vec<ScriptEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn backend(&self) -> CmpBackend {
        self.evaluator.backend()
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn loaded(&self) -> &Arc<LoadedScripts> {
        &self.loaded
    }

    /// Number of staged scripts currently attached.
    pub fn staged_len(&self) -> usize {
        self.staged.lock().values().map(Vec::len).sum()
    }

    /// Load `url` unless it was loaded before.
    ///
    /// Returns `Ok(true)` if this call performed the load.
    #[instrument(skip(self))]
    pub async fn load(&self, url: &str) -> Result<bool> {
        if !self.loaded.try_claim(url) {
            debug!(url, "Script already loaded");
            return Ok(false);
        }
        match self.loader.load(url).await {
            Ok(()) => {
                info!(url, "Gated script loaded");
                Ok(true)
            }
            Err(e) => {
                self.loaded.release(url);
                Err(e)
            }
        }
    }

    /// Re-check declarative entries and every attached staged script.
    /// Returns how many scripts were loaded by this call.
    #[instrument(skip(self), fields(backend = %self.backend()))]
    pub async fn refresh(&self) -> usize {
        let mut loaded = self.refresh_declared().await;
        let scopes: Vec<ElementKey> = self.staged.lock().keys().cloned().collect();
        for scope in &scopes {
            loaded += self.refresh_scope(scope).await;
        }
        loaded
    }

    async fn refresh_declared(&self) -> usize {
        let mut loaded = 0;
        for entry in &self.entries {
            if self.loaded.contains(&entry.url) {
                continue;
            }
            if !entry.recheck_on_change && !self.evaluated.lock().insert(entry.url.clone()) {
                continue;
            }
            let query = entry.query();
            let granted = decide(self.adapter.as_ref(), &self.evaluator, &query)
                .await
                .is_some_and(|d| d.is_granted());
            if !granted {
                continue;
            }
            match self.load(&entry.url).await {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(error) => warn!(url = %entry.url, %error, "Gated script failed to load"),
            }
        }
        loaded
    }

    async fn refresh_scope(&self, scope: &ElementKey) -> usize {
        let scripts = self.staged.lock().get(scope).cloned().unwrap_or_default();
        let mut loaded = 0;
        for script in &scripts {
            if self.loaded.contains(&script.identity) {
                continue;
            }
            let query = ConsentQuery::new(script.vendor_id.clone(), script.purpose_ids.clone());
            let granted = decide(self.adapter.as_ref(), &self.evaluator, &query)
                .await
                .is_some_and(|d| d.is_granted());
            if !granted {
                continue;
            }
            match self.promote(script).await {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(error) => {
                    warn!(%scope, script = %script.identity, %error, "Staged script swap failed")
                }
            }
        }
        loaded
    }

    async fn promote(&self, script: &StagedScript) -> Result<bool> {
        if !self.loaded.try_claim(&script.identity) {
            return Ok(false);
        }
        let live = script.tag.promote();
        match self.loader.swap(&script.tag, &live).await {
            Ok(()) => {
                info!(script = %script.identity, "Staged script promoted");
                Ok(true)
            }
            Err(e) => {
                self.loaded.release(&script.identity);
                Err(e)
            }
        }
    }

    fn stage(&self, scope: &ElementKey, markup: &str) -> Vec<StagedScript> {
        let (tags, errors) = StagedScriptTag::scan(markup, &self.attrs);
        for error in errors {
            warn!(%scope, %error, "Skipping malformed script tag");
        }

        let mut scripts = Vec::new();
        for (index, tag) in tags.into_iter().enumerate() {
            let (vendor_id, purpose_ids) = match tag.criteria(self.backend()) {
                Ok(criteria) => criteria,
                Err(error) => {
                    warn!(%scope, index, %error, "Invalid staged script criteria, not loading");
                    continue;
                }
            };
            let identity = tag
                .staged_source()
                .map(str::to_string)
                .unwrap_or_else(|| format!("inline:{scope}#{index}"));
            scripts.push(StagedScript {
                identity,
                tag,
                vendor_id,
                purpose_ids,
            });
        }
        scripts
    }

    /// Register the staged scripts of `markup` under `scope` without
    /// checking consent yet. Attach-once per scope; returns how many
    /// scripts were staged by this call.
    pub fn stage_markup(&self, scope: &ElementKey, markup: &str) -> usize {
        let scripts = self.stage(scope, markup);
        if scripts.is_empty() {
            return 0;
        }
        let mut staged = self.staged.lock();
        if staged.contains_key(scope) {
            debug!(%scope, "Scripts already attached");
            return 0;
        }
        let count = scripts.len();
        debug!(%scope, count, "Staged scripts attached");
        staged.insert(scope.clone(), scripts);
        count
    }
}

#[async_trait]
impl BehaviorHost for ScriptActivationController {
    async fn attach(&self, scope: &ElementKey, markup: &str) {
        if self.stage_markup(scope, markup) > 0 {
            self.refresh_scope(scope).await;
        }
    }

    fn detach(&self, scope: &ElementKey) {
        let nested = format!("{scope}/");
        self.staged
            .lock()
            .retain(|key, _| key != scope && !key.as_str().starts_with(&nested));
    }
}
