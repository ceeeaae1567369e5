//! Persisted rule state: the rule list, the id counter and the global flag.

use tracing::{debug, info};

use rerouter_core::{Rule, RuleDraft, RuleId, RulePatch};
use rerouter_storage::KvStore;

use crate::error::{Result, RuleError};

/// Key holding the ordered rule array.
pub const RULES_KEY: &str = "rules";
/// Key holding the next id to hand out. Starts at 1, only ever grows.
pub const NEXT_ID_KEY: &str = "nextRuleId";
/// Key holding the global enabled flag.
pub const ENABLED_KEY: &str = "extensionEnabled";

/// Rule list and global flag captured before a mutation.
///
/// The id counter is not part of it: ids burned by a rolled-back mutation
/// stay burned.
#[derive(Debug, Clone)]
pub struct Snapshot {
    rules: Vec<Rule>,
    enabled: bool,
}

/// Rule CRUD over a [`KvStore`].
///
/// Every mutation rewrites the full rule list. The store does no locking of
/// its own: each operation is a read-modify-write, so callers must serialize
/// mutations (see [`crate::RuleService`]).
pub struct RuleStore {
    kv: KvStore,
}

impl RuleStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// All rules in insertion order.
    pub async fn list(&self) -> Result<Vec<Rule>> {
        Ok(self.kv.get_or(RULES_KEY, Vec::new()).await?)
    }

    async fn save(&self, rules: &[Rule]) -> Result<()> {
        self.kv.set(RULES_KEY, rules).await?;
        Ok(())
    }

    /// Reserve `count` consecutive ids and return the first.
    ///
    /// The counter is persisted before the ids are used, so a failed write
    /// afterwards burns the ids instead of handing them out twice.
    async fn reserve_ids(&self, count: u64) -> Result<RuleId> {
        let first: RuleId = self.kv.get_or(NEXT_ID_KEY, 1).await?;
        self.kv.set(NEXT_ID_KEY, &(first + count)).await?;
        debug!(first, count, "reserved rule ids");
        Ok(first)
    }

    /// The id the next added rule will receive.
    pub async fn peek_next_id(&self) -> Result<RuleId> {
        Ok(self.kv.get_or(NEXT_ID_KEY, 1).await?)
    }

    pub async fn add(&self, draft: RuleDraft) -> Result<RuleId> {
        let id = self.reserve_ids(1).await?;
        let mut rules = self.list().await?;
        rules.push(Rule::from_draft(id, draft));
        self.save(&rules).await?;
        info!(rule_id = id, "added rule");
        Ok(id)
    }

    /// Merge `patch` into the rule with `patch.id`.
    pub async fn update(&self, patch: RulePatch) -> Result<Rule> {
        let mut rules = self.list().await?;
        let id = patch.id;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleError::NotFound(id))?;
        rule.apply(patch);
        let merged = rule.clone();
        self.save(&rules).await?;
        info!(rule_id = id, kind = %merged.kind, "updated rule");
        Ok(merged)
    }

    pub async fn delete(&self, id: RuleId) -> Result<()> {
        let mut rules = self.list().await?;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(RuleError::NotFound(id));
        }
        self.save(&rules).await?;
        info!(rule_id = id, "deleted rule");
        Ok(())
    }

    pub async fn toggle(&self, id: RuleId, enabled: bool) -> Result<()> {
        let mut rules = self.list().await?;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleError::NotFound(id))?;
        rule.enabled = enabled;
        self.save(&rules).await?;
        info!(rule_id = id, enabled, "toggled rule");
        Ok(())
    }

    /// Append drafts with freshly assigned ids, in input order.
    pub async fn import_many(&self, drafts: Vec<RuleDraft>) -> Result<Vec<RuleId>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let first = self.reserve_ids(drafts.len() as u64).await?;
        let mut rules = self.list().await?;
        let mut ids = Vec::with_capacity(drafts.len());
        for (offset, draft) in drafts.into_iter().enumerate() {
            let id = first + offset as u64;
            rules.push(Rule::from_draft(id, draft));
            ids.push(id);
        }
        self.save(&rules).await?;
        info!(count = ids.len(), first_id = first, "imported rules");
        Ok(ids)
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            rules: self.list().await?,
            enabled: self.enabled().await?,
        })
    }

    /// Write back a [`Snapshot`] taken earlier.
    pub async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        self.save(&snapshot.rules).await?;
        self.kv.set(ENABLED_KEY, &snapshot.enabled).await?;
        info!(rules = snapshot.rules.len(), "restored rule state");
        Ok(())
    }

    pub async fn enabled(&self) -> Result<bool> {
        Ok(self.kv.get_or(ENABLED_KEY, true).await?)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.kv.set(ENABLED_KEY, &enabled).await?;
        info!(enabled, "set global enabled flag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rerouter_core::RuleType;

    fn store() -> RuleStore {
        RuleStore::new(KvStore::in_memory())
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let store = store();
        let a = store.add(RuleDraft::wildcard("a", "a.com/*", "https://x/")).await.unwrap();
        let b = store.add(RuleDraft::wildcard("b", "b.com/*", "https://y/")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.peek_next_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let store = store();
        let a = store.add(RuleDraft::default()).await.unwrap();
        store.delete(a).await.unwrap();
        let b = store.add(RuleDraft::default()).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn add_defaults_enabled_and_priority() {
        let store = store();
        store.add(RuleDraft::wildcard("a", "a", "https://b/")).await.unwrap();
        let rules = store.list().await.unwrap();
        assert!(rules[0].enabled);
        assert_eq!(rules[0].priority, 1);
    }

    #[tokio::test]
    async fn update_missing_rule_is_not_found() {
        let store = store();
        let err = store.update(RulePatch::new(12)).await.unwrap_err();
        assert!(matches!(err, RuleError::NotFound(12)));
    }

    #[tokio::test]
    async fn update_preserves_id_and_prunes_substitution() {
        let store = store();
        let id = store.add(RuleDraft::regex("r", "^https://a/(.*)", "https://b/\\1")).await.unwrap();

        let mut patch = RulePatch::new(id);
        patch.kind = Some(RuleType::Wildcard);
        patch.to = Some("https://c/".into());
        let merged = store.update(patch).await.unwrap();

        assert_eq!(merged.id, id);
        assert_eq!(merged.regex_substitution, None);
        assert_eq!(store.list().await.unwrap()[0], merged);
    }

    #[tokio::test]
    async fn delete_missing_rule_leaves_list_untouched() {
        let store = store();
        store.add(RuleDraft::wildcard("a", "a", "https://b/")).await.unwrap();
        let before = store.list().await.unwrap();

        let err = store.delete(99).await.unwrap_err();
        assert!(matches!(err, RuleError::NotFound(99)));
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn toggle_sets_flag() {
        let store = store();
        let id = store.add(RuleDraft::default()).await.unwrap();
        store.toggle(id, false).await.unwrap();
        assert!(!store.list().await.unwrap()[0].enabled);
        assert!(matches!(store.toggle(id + 1, true).await, Err(RuleError::NotFound(_))));
    }

    #[tokio::test]
    async fn import_assigns_consecutive_fresh_ids() {
        let store = store();
        store.add(RuleDraft::default()).await.unwrap();
        let ids = store
            .import_many(vec![RuleDraft::default(), RuleDraft::default(), RuleDraft::default()])
            .await
            .unwrap();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(store.peek_next_id().await.unwrap(), 5);
        assert_eq!(store.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn import_of_nothing_keeps_counter() {
        let store = store();
        assert!(store.import_many(Vec::new()).await.unwrap().is_empty());
        assert_eq!(store.peek_next_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restore_rewinds_rules_and_flag_but_not_counter() {
        let store = store();
        store.add(RuleDraft::wildcard("a", "a", "https://b/")).await.unwrap();
        let snapshot = store.snapshot().await.unwrap();

        store.add(RuleDraft::default()).await.unwrap();
        store.set_enabled(false).await.unwrap();
        store.restore(&snapshot).await.unwrap();

        let rules = store.list().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "a");
        assert!(store.enabled().await.unwrap());
        assert_eq!(store.peek_next_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn enabled_defaults_to_true() {
        let store = store();
        assert!(store.enabled().await.unwrap());
        store.set_enabled(false).await.unwrap();
        assert!(!store.enabled().await.unwrap());
    }
}
