//! Request dispatch for the background process.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use rerouter_bridge::{Message, Request, Resolution, Response, ResponseBody};
use rerouter_core::ResourceType;
use rerouter_rules::{RuleError, RuleService};

use crate::badge::BadgeIndicator;

/// Maps bridge requests onto [`RuleService`] calls.
pub struct Handler {
    service: Arc<RuleService>,
    badge: Arc<BadgeIndicator>,
}

impl Handler {
    pub fn new(service: Arc<RuleService>, badge: Arc<BadgeIndicator>) -> Self {
        Self { service, badge }
    }

    /// Rebuild the engine from storage and set the badge. Run once at startup.
    pub async fn start(&self) -> Result<usize, RuleError> {
        let active = self.service.rebuild().await?;
        self.badge.update(self.service.enabled().await?).await;
        Ok(active)
    }

    /// Decode an envelope body and handle it. Never fails: every problem
    /// becomes an `{ok: false}` response.
    pub async fn handle_message(&self, msg: &Message) -> Response {
        match msg.decode::<Value>() {
            Ok(value) => self.handle_value(value).await,
            Err(e) => Response::failure(e),
        }
    }

    pub async fn handle_value(&self, value: Value) -> Response {
        match Request::from_value(value) {
            Ok(request) => self.handle(request).await,
            Err(error) => {
                warn!(%error, "rejected request body");
                Response::failure(error)
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let kind = request.kind();
        match self.dispatch(request).await {
            Ok(body) => {
                debug!(request = kind, "request handled");
                Response::ok(body)
            }
            Err(e) => {
                warn!(request = kind, error = %e, "request failed");
                Response::failure(e)
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<ResponseBody, RuleError> {
        let service = &self.service;
        let body = match request {
            Request::AddRule { rule } => ResponseBody::Id {
                id: service.add(rule).await?,
            },
            Request::UpdateRule { rule } => ResponseBody::Rule {
                rule: service.update(rule).await?,
            },
            Request::DeleteRule { id } => {
                service.delete(id).await?;
                ResponseBody::Empty {}
            }
            Request::ToggleRule { id, enabled } => {
                service.toggle(id, enabled).await?;
                ResponseBody::Empty {}
            }
            Request::ListRules => ResponseBody::Rules {
                rules: service.list().await?,
            },
            Request::ExportRules => ResponseBody::Exported {
                rules: service.export().await?,
            },
            Request::ImportRules { rules } => {
                service.import_many(rules).await?;
                ResponseBody::Empty {}
            }
            Request::GetEnabled => ResponseBody::Enabled {
                enabled: service.enabled().await?,
            },
            Request::SetEnabled { enabled } => {
                service.set_enabled(enabled).await?;
                self.badge.update(enabled).await;
                ResponseBody::Empty {}
            }
            Request::ResolveUrl { url, resource_type } => {
                let hit = service
                    .resolve(&url, resource_type.unwrap_or(ResourceType::MainFrame))
                    .await?;
                ResponseBody::Resolution {
                    resolution: Resolution {
                        rule_id: hit.as_ref().map(|r| r.rule_id),
                        url: hit.map(|r| r.url),
                    },
                }
            }
        };
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rerouter_rules::{InMemoryEngine, RuleStore};
    use rerouter_storage::KvStore;
    use serde_json::json;

    fn handler() -> (Handler, Arc<BadgeIndicator>) {
        let service = Arc::new(RuleService::new(
            RuleStore::new(KvStore::in_memory()),
            Arc::new(InMemoryEngine::new()),
        ));
        let badge = Arc::new(BadgeIndicator::new());
        (Handler::new(service, badge.clone()), badge)
    }

    async fn send(handler: &Handler, body: Value) -> Value {
        serde_json::to_value(handler.handle_value(body).await).unwrap()
    }

    #[tokio::test]
    async fn add_returns_id_and_list_returns_rule() {
        let (h, _) = handler();
        let reply = send(
            &h,
            json!({"type": "ADD_RULE", "rule": {"name": "a", "from": "*://a.com/*", "to": "https://b.com/"}}),
        )
        .await;
        assert_eq!(reply, json!({"ok": true, "id": 1}));

        let reply = send(&h, json!({"type": "LIST_RULES"})).await;
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["rules"][0]["id"], 1);
        assert_eq!(reply["rules"][0]["type"], "wildcard");
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let (h, _) = handler();
        let reply = send(&h, json!({"type": "NUKE_RULES"})).await;
        assert_eq!(reply, json!({"ok": false, "error": "Unknown message type"}));
    }

    #[tokio::test]
    async fn missing_rule_surfaces_not_found_text() {
        let (h, _) = handler();
        let reply = send(&h, json!({"type": "TOGGLE_RULE", "id": 5, "enabled": true})).await;
        assert_eq!(reply, json!({"ok": false, "error": "rule not found: 5"}));
    }

    #[tokio::test]
    async fn update_returns_merged_rule() {
        let (h, _) = handler();
        send(&h, json!({"type": "ADD_RULE", "rule": {"name": "a", "from": "a", "to": "https://b/"}})).await;
        let reply = send(&h, json!({"type": "UPDATE_RULE", "rule": {"id": 1, "name": "renamed"}})).await;
        assert_eq!(reply["ok"], true);
        assert_eq!(reply["rule"]["name"], "renamed");
        assert_eq!(reply["rule"]["to"], "https://b/");
    }

    #[tokio::test]
    async fn export_strips_ids() {
        let (h, _) = handler();
        send(&h, json!({"type": "ADD_RULE", "rule": {"name": "a", "from": "a", "to": "https://b/"}})).await;
        let reply = send(&h, json!({"type": "EXPORT_RULES"})).await;
        assert_eq!(reply["ok"], true);
        assert!(reply["rules"][0].get("id").is_none());
        assert_eq!(reply["rules"][0]["from"], "a");
    }

    #[tokio::test]
    async fn set_enabled_flips_flag_and_badge() {
        let (h, badge) = handler();
        h.start().await.unwrap();
        assert_eq!(badge.current().await.text, "");

        let reply = send(&h, json!({"type": "SET_ENABLED", "enabled": false})).await;
        assert_eq!(reply, json!({"ok": true}));
        assert_eq!(badge.current().await.text, "OFF");

        let reply = send(&h, json!({"type": "GET_ENABLED"})).await;
        assert_eq!(reply, json!({"ok": true, "enabled": false}));
    }

    #[tokio::test]
    async fn resolve_url_reports_redirect_target() {
        let (h, _) = handler();
        send(
            &h,
            json!({"type": "IMPORT_RULES", "rules": [
                {"name": "r", "from": "^https://old\\.example/(.*)", "type": "regex", "regexSubstitution": "https://new.example/\\1"}
            ]}),
        )
        .await;

        let reply = send(&h, json!({"type": "RESOLVE_URL", "url": "https://old.example/x"})).await;
        assert_eq!(
            reply,
            json!({"ok": true, "resolution": {"ruleId": 1, "url": "https://new.example/x"}})
        );

        let reply = send(&h, json!({"type": "RESOLVE_URL", "url": "https://other.example/"})).await;
        assert_eq!(reply, json!({"ok": true, "resolution": {}}));
    }

    #[tokio::test]
    async fn malformed_envelope_body_is_a_failure() {
        let (h, _) = handler();
        let mut msg = Message::new("ADD_RULE", &Request::ListRules).unwrap();
        msg.payload = b"not json".to_vec();
        let reply = h.handle_message(&msg).await;
        assert!(!reply.ok);
    }
}
