//! Request and response bodies exchanged between the settings client and the
//! background process.
//!
//! Requests are tagged by `type` (`ADD_RULE`, `LIST_RULES`, ...). Responses are
//! `{"ok": true, ...payload}` or `{"ok": false, "error": "..."}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rerouter_core::{ResourceType, Rule, RuleDraft, RuleId, RulePatch};

/// Error text for a body whose `type` is not one of [`Request::TYPES`].
pub const UNKNOWN_MESSAGE_TYPE: &str = "Unknown message type";

/// The closed set of requests the background process understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    AddRule { rule: RuleDraft },
    UpdateRule { rule: RulePatch },
    DeleteRule { id: RuleId },
    ToggleRule { id: RuleId, enabled: bool },
    ListRules,
    ExportRules,
    ImportRules { rules: Vec<RuleDraft> },
    GetEnabled,
    SetEnabled { enabled: bool },
    ResolveUrl {
        url: String,
        #[serde(
            rename = "resourceType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        resource_type: Option<ResourceType>,
    },
}

impl Request {
    /// Every `type` tag, in declaration order.
    pub const TYPES: [&'static str; 10] = [
        "ADD_RULE",
        "UPDATE_RULE",
        "DELETE_RULE",
        "TOGGLE_RULE",
        "LIST_RULES",
        "EXPORT_RULES",
        "IMPORT_RULES",
        "GET_ENABLED",
        "SET_ENABLED",
        "RESOLVE_URL",
    ];

    /// The wire `type` tag of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddRule { .. } => "ADD_RULE",
            Self::UpdateRule { .. } => "UPDATE_RULE",
            Self::DeleteRule { .. } => "DELETE_RULE",
            Self::ToggleRule { .. } => "TOGGLE_RULE",
            Self::ListRules => "LIST_RULES",
            Self::ExportRules => "EXPORT_RULES",
            Self::ImportRules { .. } => "IMPORT_RULES",
            Self::GetEnabled => "GET_ENABLED",
            Self::SetEnabled { .. } => "SET_ENABLED",
            Self::ResolveUrl { .. } => "RESOLVE_URL",
        }
    }

    /// Whether this request changes stored state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListRules | Self::ExportRules | Self::GetEnabled | Self::ResolveUrl { .. }
        )
    }

    /// Decode a JSON body, mapping an unrecognised `type` to
    /// [`UNKNOWN_MESSAGE_TYPE`] and any other shape problem to its serde text.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let known = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| Self::TYPES.iter().any(|known| *known == t));
        if !known {
            return Err(UNKNOWN_MESSAGE_TYPE.to_string());
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

/// Outcome of a `RESOLVE_URL` request. Both fields are absent when nothing
/// matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Resolution {
    pub fn matched(&self) -> bool {
        self.rule_id.is_some()
    }
}

/// A reply body: the `ok` flag plus whatever payload the request produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Payload half of a [`Response`].
///
/// Variant order matters for deserialization: serde tries each in turn and
/// `Empty` accepts anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Error { error: String },
    Rule { rule: Rule },
    Id { id: RuleId },
    Enabled { enabled: bool },
    Resolution { resolution: Resolution },
    Rules { rules: Vec<Rule> },
    Exported { rules: Vec<RuleDraft> },
    Empty {},
}

impl Response {
    pub fn ok(body: ResponseBody) -> Self {
        Self { ok: true, body }
    }

    pub fn empty() -> Self {
        Self::ok(ResponseBody::Empty {})
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            ok: false,
            body: ResponseBody::Error {
                error: error.to_string(),
            },
        }
    }

    /// Split into the payload or the error text.
    pub fn into_result(self) -> Result<ResponseBody, String> {
        match (self.ok, self.body) {
            (true, body) => Ok(body),
            (false, ResponseBody::Error { error }) => Err(error),
            (false, _) => Err("request failed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_are_tagged_by_screaming_type() {
        let value = serde_json::to_value(Request::ToggleRule { id: 4, enabled: true }).unwrap();
        assert_eq!(value, json!({"type": "TOGGLE_RULE", "id": 4, "enabled": true}));

        let value = serde_json::to_value(Request::ListRules).unwrap();
        assert_eq!(value, json!({"type": "LIST_RULES"}));
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let samples = [
            Request::AddRule { rule: RuleDraft::default() },
            Request::UpdateRule { rule: RulePatch::new(1) },
            Request::DeleteRule { id: 1 },
            Request::ToggleRule { id: 1, enabled: false },
            Request::ListRules,
            Request::ExportRules,
            Request::ImportRules { rules: vec![] },
            Request::GetEnabled,
            Request::SetEnabled { enabled: true },
            Request::ResolveUrl { url: "https://a/".into(), resource_type: None },
        ];
        for (req, tag) in samples.iter().zip(Request::TYPES) {
            let value = serde_json::to_value(req).unwrap();
            assert_eq!(value["type"], tag);
            assert_eq!(req.kind(), tag);
        }
    }

    #[test]
    fn add_rule_accepts_client_shape() {
        let req = Request::from_value(json!({
            "type": "ADD_RULE",
            "rule": {"name": "n", "from": "*://a.com/*", "type": "wildcard", "to": "https://b.com/"}
        }))
        .unwrap();
        match req {
            Request::AddRule { rule } => {
                assert_eq!(rule.from, "*://a.com/*");
                assert_eq!(rule.to.as_deref(), Some("https://b.com/"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolve_url_reads_camel_case_resource_type() {
        let req = Request::from_value(json!({
            "type": "RESOLVE_URL",
            "url": "https://a/",
            "resourceType": "sub_frame"
        }))
        .unwrap();
        assert_eq!(
            req,
            Request::ResolveUrl {
                url: "https://a/".into(),
                resource_type: Some(ResourceType::SubFrame)
            }
        );
    }

    #[test]
    fn unknown_or_missing_type_is_reported_verbatim() {
        assert_eq!(
            Request::from_value(json!({"type": "REBOOT"})).unwrap_err(),
            UNKNOWN_MESSAGE_TYPE
        );
        assert_eq!(
            Request::from_value(json!({"id": 1})).unwrap_err(),
            UNKNOWN_MESSAGE_TYPE
        );
    }

    #[test]
    fn known_type_with_bad_fields_is_a_shape_error() {
        let err = Request::from_value(json!({"type": "DELETE_RULE"})).unwrap_err();
        assert_ne!(err, UNKNOWN_MESSAGE_TYPE);
        assert!(err.contains("id"), "{err}");
    }

    #[test]
    fn responses_flatten_payload_next_to_ok() {
        let value = serde_json::to_value(Response::ok(ResponseBody::Id { id: 9 })).unwrap();
        assert_eq!(value, json!({"ok": true, "id": 9}));

        let value = serde_json::to_value(Response::empty()).unwrap();
        assert_eq!(value, json!({"ok": true}));

        let value = serde_json::to_value(Response::failure("rule not found: 3")).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "rule not found: 3"}));
    }

    #[test]
    fn responses_decode_into_matching_body() {
        let resp: Response = serde_json::from_value(json!({"ok": true, "enabled": false})).unwrap();
        assert_eq!(resp.body, ResponseBody::Enabled { enabled: false });

        let resp: Response = serde_json::from_value(json!({"ok": true})).unwrap();
        assert_eq!(resp.body, ResponseBody::Empty {});

        let resp: Response =
            serde_json::from_value(json!({"ok": false, "error": "boom"})).unwrap();
        assert_eq!(resp.into_result().unwrap_err(), "boom");
    }

    #[test]
    fn rule_lists_decode_as_stored_rules() {
        let resp: Response = serde_json::from_value(json!({
            "ok": true,
            "rules": [{"id": 1, "name": "a", "from": "a", "type": "wildcard", "to": "https://b/", "enabled": true, "priority": 1}]
        }))
        .unwrap();
        match resp.body {
            ResponseBody::Rules { rules } => assert_eq!(rules[0].id, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolution_omits_absent_fields() {
        let value = serde_json::to_value(Response::ok(ResponseBody::Resolution {
            resolution: Resolution::default(),
        }))
        .unwrap();
        assert_eq!(value, json!({"ok": true, "resolution": {}}));
    }
}
