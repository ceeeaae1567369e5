use std::cmp::Reverse;
use std::collections::BTreeMap;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tokio::sync::RwLock;
use tracing::debug;

use rerouter_core::{ResourceType, RuleId};

use super::pattern::{substitution_template, url_filter_to_regex};
use super::{DeclarativeEngine, EngineError, Redirect, RuleSetUpdate};
use crate::dnr::DnrRule;

/// A dynamic rule with its condition compiled once at update time.
#[derive(Clone)]
struct CompiledRule {
    rule: DnrRule,
    matcher: Option<Regex>,
    /// Replacement template when the rule redirects via regex substitution.
    template: Option<String>,
}

impl CompiledRule {
    fn compile(rule: DnrRule) -> Result<Self, EngineError> {
        let id = rule.id;
        if id == 0 {
            return Err(EngineError::InvalidRule {
                id,
                reason: "rule id must be at least 1".into(),
            });
        }

        let condition = &rule.condition;
        let redirect = &rule.action.redirect;

        let matcher = match (&condition.url_filter, &condition.regex_filter) {
            (Some(_), Some(_)) => {
                return Err(EngineError::InvalidRule {
                    id,
                    reason: "urlFilter and regexFilter are mutually exclusive".into(),
                })
            }
            (Some(filter), None) => Some(build_regex(id, &url_filter_to_regex(filter))?),
            (None, Some(pattern)) => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| EngineError::InvalidRule {
                        id,
                        reason: format!("invalid regexFilter: {e}"),
                    })?,
            ),
            (None, None) => None,
        };

        let template = match (&redirect.regex_substitution, &redirect.url) {
            (Some(_), _) if condition.regex_filter.is_none() => {
                return Err(EngineError::InvalidRule {
                    id,
                    reason: "regexSubstitution requires a regexFilter".into(),
                })
            }
            (Some(sub), _) => Some(substitution_template(sub)),
            (None, Some(_)) => None,
            (None, None) => {
                return Err(EngineError::InvalidRule {
                    id,
                    reason: "redirect needs a url or a regexSubstitution".into(),
                })
            }
        };

        Ok(Self {
            rule,
            matcher,
            template,
        })
    }

    fn applies_to(&self, url: &str, resource_type: ResourceType) -> bool {
        self.rule.condition.resource_types.contains(&resource_type)
            && self.matcher.as_ref().map_or(true, |m| m.is_match(url))
    }

    fn target(&self, url: &str) -> String {
        match (&self.template, &self.matcher) {
            (Some(template), Some(matcher)) => matcher.replacen(url, 1, template.as_str()).into_owned(),
            _ => self.rule.action.redirect.url.clone().unwrap_or_default(),
        }
    }
}

fn build_regex(id: RuleId, pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| EngineError::InvalidRule {
        id,
        reason: format!("invalid urlFilter: {e}"),
    })
}

/// In-process declarative engine.
///
/// Holds the dynamic rule set in memory, keyed by id. Updates compile into a
/// fresh map and swap it in only when every rule compiled.
#[derive(Default)]
pub struct InMemoryEngine {
    rules: RwLock<BTreeMap<RuleId, CompiledRule>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active rules.
    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

#[async_trait]
impl DeclarativeEngine for InMemoryEngine {
    async fn dynamic_rules(&self) -> Result<Vec<DnrRule>, EngineError> {
        let guard = self.rules.read().await;
        Ok(guard.values().map(|c| c.rule.clone()).collect())
    }

    async fn update_dynamic_rules(&self, update: RuleSetUpdate) -> Result<(), EngineError> {
        // Compile outside the lock; a failed compile leaves the live set alone.
        let mut compiled = Vec::with_capacity(update.add_rules.len());
        for rule in update.add_rules {
            compiled.push(CompiledRule::compile(rule)?);
        }

        let mut guard = self.rules.write().await;
        let mut next = guard.clone();
        let mut removed = 0usize;
        for id in &update.remove_rule_ids {
            if next.remove(id).is_some() {
                removed += 1;
            }
        }

        let added = compiled.len();
        for rule in compiled {
            let id = rule.rule.id;
            if next.insert(id, rule).is_some() {
                return Err(EngineError::DuplicateRuleId(id));
            }
        }

        debug!(removed, added, active = next.len(), "replaced dynamic rules");
        *guard = next;
        Ok(())
    }

    async fn test_match_outcome(
        &self,
        url: &str,
        resource_type: ResourceType,
    ) -> Result<Option<Redirect>, EngineError> {
        let guard = self.rules.read().await;
        // Highest priority wins; ties go to the lowest id.
        let winner = guard
            .values()
            .filter(|c| c.applies_to(url, resource_type))
            .max_by_key(|c| (c.rule.priority, Reverse(c.rule.id)));

        Ok(winner.map(|c| Redirect {
            rule_id: c.rule.id,
            url: c.target(url),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnr::to_dnr_rule;
    use rerouter_core::{Rule, RuleDraft};

    fn wildcard(id: RuleId, from: &str, to: &str) -> DnrRule {
        to_dnr_rule(&Rule::from_draft(id, RuleDraft::wildcard("w", from, to)))
    }

    fn regex(id: RuleId, from: &str, sub: &str) -> DnrRule {
        to_dnr_rule(&Rule::from_draft(id, RuleDraft::regex("r", from, sub)))
    }

    fn add(rules: Vec<DnrRule>) -> RuleSetUpdate {
        RuleSetUpdate {
            remove_rule_ids: Vec::new(),
            add_rules: rules,
        }
    }

    #[tokio::test]
    async fn replace_all_swaps_rule_set() {
        let engine = InMemoryEngine::new();
        engine
            .update_dynamic_rules(add(vec![wildcard(1, "a", "https://x/"), wildcard(2, "b", "https://y/")]))
            .await
            .unwrap();

        engine
            .update_dynamic_rules(RuleSetUpdate {
                remove_rule_ids: vec![1, 2],
                add_rules: vec![wildcard(3, "c", "https://z/")],
            })
            .await
            .unwrap();

        let ids: Vec<_> = engine.dynamic_rules().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn invalid_regex_keeps_previous_set() {
        let engine = InMemoryEngine::new();
        engine
            .update_dynamic_rules(add(vec![wildcard(1, "a", "https://x/")]))
            .await
            .unwrap();

        let err = engine
            .update_dynamic_rules(RuleSetUpdate {
                remove_rule_ids: vec![1],
                add_rules: vec![regex(2, "(unclosed", "https://y/")],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidRule { id: 2, .. }));
        assert_eq!(engine.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_id_rolls_back() {
        let engine = InMemoryEngine::new();
        engine
            .update_dynamic_rules(add(vec![wildcard(1, "a", "https://x/")]))
            .await
            .unwrap();

        let err = engine
            .update_dynamic_rules(add(vec![wildcard(2, "b", "https://y/"), wildcard(1, "c", "https://z/")]))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::DuplicateRuleId(1)));
        let rules = engine.dynamic_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].condition.url_filter.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn redirect_without_target_is_rejected() {
        let engine = InMemoryEngine::new();
        let mut rule = wildcard(1, "a", "https://x/");
        rule.action.redirect.url = None;
        let err = engine.update_dynamic_rules(add(vec![rule])).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule { id: 1, .. }));
        assert!(engine.is_empty().await);
    }

    #[tokio::test]
    async fn wildcard_redirects_to_literal_url() {
        let engine = InMemoryEngine::new();
        engine
            .update_dynamic_rules(add(vec![wildcard(1, "*://old.site/*", "https://new.site/")]))
            .await
            .unwrap();

        let hit = engine
            .test_match_outcome("https://old.site/page", ResourceType::MainFrame)
            .await
            .unwrap();
        assert_eq!(
            hit,
            Some(Redirect {
                rule_id: 1,
                url: "https://new.site/".into()
            })
        );

        let miss = engine
            .test_match_outcome("https://other.site/page", ResourceType::MainFrame)
            .await
            .unwrap();
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn regex_substitutes_first_match() {
        let engine = InMemoryEngine::new();
        engine
            .update_dynamic_rules(add(vec![regex(1, "^https://old\\.site/(.*)$", "https://new.site/\\1")]))
            .await
            .unwrap();

        let hit = engine
            .test_match_outcome("https://OLD.site/a/b?c=1", ResourceType::Script)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.url, "https://new.site/a/b?c=1");
    }

    #[tokio::test]
    async fn resource_type_filter_applies() {
        let engine = InMemoryEngine::new();
        let mut rule = wildcard(1, "a.com", "https://b/");
        rule.condition.resource_types = vec![ResourceType::Image];
        engine.update_dynamic_rules(add(vec![rule])).await.unwrap();

        let url = "https://a.com/x.png";
        assert!(engine.test_match_outcome(url, ResourceType::Image).await.unwrap().is_some());
        assert!(engine.test_match_outcome(url, ResourceType::Script).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn higher_priority_then_lower_id_wins() {
        let engine = InMemoryEngine::new();
        let mut high = wildcard(5, "a.com", "https://high/");
        high.priority = 3;
        engine
            .update_dynamic_rules(add(vec![
                wildcard(2, "a.com", "https://two/"),
                wildcard(1, "a.com", "https://one/"),
                high,
            ]))
            .await
            .unwrap();

        let hit = engine
            .test_match_outcome("https://a.com/", ResourceType::MainFrame)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.rule_id, 5);

        engine
            .update_dynamic_rules(RuleSetUpdate {
                remove_rule_ids: vec![5],
                add_rules: Vec::new(),
            })
            .await
            .unwrap();
        let hit = engine
            .test_match_outcome("https://a.com/", ResourceType::MainFrame)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.rule_id, 1);
    }

    #[tokio::test]
    async fn concurrent_readers_see_whole_sets() {
        let engine = std::sync::Arc::new(InMemoryEngine::new());
        let writer = {
            let engine = engine.clone();
            tokio::spawn(async move {
                for round in 0..20u64 {
                    let base = round * 2 + 1;
                    engine
                        .update_dynamic_rules(RuleSetUpdate {
                            remove_rule_ids: (base.saturating_sub(2)..base).collect(),
                            add_rules: vec![wildcard(base, "a", "https://x/"), wildcard(base + 1, "b", "https://y/")],
                        })
                        .await
                        .unwrap();
                }
            })
        };
        for _ in 0..20 {
            let n = engine.len().await;
            assert!(n == 0 || n == 2, "saw partial rule set of {n}");
        }
        writer.await.unwrap();
        assert_eq!(engine.len().await, 2);
    }
}
