//! Rule service: single-writer mutations followed by a full engine rebuild.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use rerouter_core::{ResourceType, Rule, RuleDraft, RuleId, RulePatch};

use crate::dnr::to_dnr_rule;
use crate::engine::{DeclarativeEngine, Redirect, RuleSetUpdate};
use crate::error::Result;
use crate::store::{RuleStore, Snapshot};

/// Owns the [`RuleStore`] and keeps the engine in sync with it.
///
/// Every mutation holds `write_lock` across its read-modify-write and the
/// rebuild that follows, so concurrent callers cannot interleave.
pub struct RuleService {
    store: RuleStore,
    engine: Arc<dyn DeclarativeEngine>,
    write_lock: Mutex<()>,
}

impl RuleService {
    pub fn new(store: RuleStore, engine: Arc<dyn DeclarativeEngine>) -> Self {
        Self {
            store,
            engine,
            write_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn DeclarativeEngine> {
        &self.engine
    }

    pub async fn list(&self) -> Result<Vec<Rule>> {
        self.store.list().await
    }

    /// Rules in portable form, ids stripped.
    pub async fn export(&self) -> Result<Vec<RuleDraft>> {
        Ok(crate::convert::export_rules(&self.store.list().await?))
    }

    pub async fn enabled(&self) -> Result<bool> {
        self.store.enabled().await
    }

    pub async fn add(&self, draft: RuleDraft) -> Result<RuleId> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        let id = self.store.add(draft).await?;
        self.commit_locked(snapshot).await?;
        Ok(id)
    }

    pub async fn update(&self, patch: RulePatch) -> Result<Rule> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        let rule = self.store.update(patch).await?;
        self.commit_locked(snapshot).await?;
        Ok(rule)
    }

    pub async fn delete(&self, id: RuleId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        self.store.delete(id).await?;
        self.commit_locked(snapshot).await
    }

    pub async fn toggle(&self, id: RuleId, enabled: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        self.store.toggle(id, enabled).await?;
        self.commit_locked(snapshot).await
    }

    pub async fn import_many(&self, drafts: Vec<RuleDraft>) -> Result<Vec<RuleId>> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        let ids = self.store.import_many(drafts).await?;
        self.commit_locked(snapshot).await?;
        Ok(ids)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.store.snapshot().await?;
        self.store.set_enabled(enabled).await?;
        self.commit_locked(snapshot).await
    }

    /// Recompute the engine's rule set from storage. Run at startup.
    pub async fn rebuild(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.rebuild_locked().await
    }

    /// Where the engine would send `url`, if anywhere.
    pub async fn resolve(&self, url: &str, resource_type: ResourceType) -> Result<Option<Redirect>> {
        Ok(self.engine.test_match_outcome(url, resource_type).await?)
    }

    /// Rebuild after a mutation; if the engine refuses the new set, write
    /// `snapshot` back so a failed mutation leaves storage as it was.
    ///
    /// Caller must hold `write_lock`.
    async fn commit_locked(&self, snapshot: Snapshot) -> Result<()> {
        let Err(e) = self.rebuild_locked().await else {
            return Ok(());
        };
        match self.store.restore(&snapshot).await {
            Ok(()) => warn!(error = %e, "mutation rolled back"),
            Err(restore) => error!(error = %e, restore_error = %restore, "rollback failed"),
        }
        Err(e)
    }

    /// Replace the whole dynamic rule set with the enabled stored rules.
    ///
    /// Caller must hold `write_lock`.
    async fn rebuild_locked(&self) -> Result<usize> {
        let rules = self.store.list().await?;
        let enabled = self.store.enabled().await?;

        let existing = self.engine.dynamic_rules().await?;
        let remove_rule_ids = existing.iter().map(|r| r.id).collect();

        let add_rules: Vec<_> = if enabled {
            rules.iter().filter(|r| r.enabled).map(to_dnr_rule).collect()
        } else {
            Vec::new()
        };
        let active = add_rules.len();

        if let Err(e) = self
            .engine
            .update_dynamic_rules(RuleSetUpdate {
                remove_rule_ids,
                add_rules,
            })
            .await
        {
            warn!(error = %e, "engine rejected rebuilt rule set");
            return Err(e.into());
        }

        info!(active, stored = rules.len(), enabled, "rebuilt dynamic rules");
        Ok(active)
    }
}
