use serde::{Deserialize, Serialize};

/// Identifier assigned by the rule store. Never reused.
pub type RuleId = u64;

/// How a rule's `from` pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    /// Glob-style URL filter; redirects to the literal `to` URL.
    #[default]
    Wildcard,
    /// Regular expression; redirects via `regexSubstitution`.
    Regex,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleType::Wildcard => write!(f, "wildcard"),
            RuleType::Regex => write!(f, "regex"),
        }
    }
}

/// Request kinds a declarative rule condition can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Webtransport,
    Webbundle,
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 15] = [
        ResourceType::MainFrame,
        ResourceType::SubFrame,
        ResourceType::Stylesheet,
        ResourceType::Script,
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Object,
        ResourceType::Xmlhttprequest,
        ResourceType::Ping,
        ResourceType::CspReport,
        ResourceType::Media,
        ResourceType::Websocket,
        ResourceType::Webtransport,
        ResourceType::Webbundle,
        ResourceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main_frame",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Object => "object",
            ResourceType::Xmlhttprequest => "xmlhttprequest",
            ResourceType::Ping => "ping",
            ResourceType::CspReport => "csp_report",
            ResourceType::Media => "media",
            ResourceType::Websocket => "websocket",
            ResourceType::Webtransport => "webtransport",
            ResourceType::Webbundle => "webbundle",
            ResourceType::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown resource type '{s}'"))
    }
}

fn default_enabled() -> bool {
    true
}

fn default_priority() -> u32 {
    1
}

/// A stored redirect rule.
///
/// Only one of `to` / `regex_substitution` is meaningful at a time, selected
/// by `kind`. Stored and exchanged as camelCase JSON with the kind under `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_substitution: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

impl Rule {
    /// Materialize a draft under a freshly assigned id.
    pub fn from_draft(id: RuleId, draft: RuleDraft) -> Self {
        Self {
            id,
            name: draft.name,
            from: draft.from,
            kind: draft.kind,
            to: draft.to,
            regex_substitution: draft.regex_substitution,
            enabled: draft.enabled.unwrap_or(true),
            priority: draft.priority.unwrap_or(1),
            resource_types: draft.resource_types,
        }
    }

    /// The portable form of this rule: everything except the id.
    pub fn to_draft(&self) -> RuleDraft {
        RuleDraft {
            name: self.name.clone(),
            from: self.from.clone(),
            kind: self.kind,
            to: self.to.clone(),
            regex_substitution: self.regex_substitution.clone(),
            enabled: Some(self.enabled),
            priority: Some(self.priority),
            resource_types: self.resource_types.clone(),
        }
    }

    pub fn is_regex(&self) -> bool {
        self.kind == RuleType::Regex
    }

    /// Redirect target as shown to the user.
    pub fn target(&self) -> Option<&str> {
        match self.kind {
            RuleType::Regex => self
                .regex_substitution
                .as_deref()
                .or(self.to.as_deref()),
            RuleType::Wildcard => self.to.as_deref(),
        }
    }

    /// Merge a patch into this rule. The stored id always wins.
    ///
    /// `regex_substitution` is dropped whenever the merged kind is not regex.
    pub fn apply(&mut self, patch: RulePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(from) = patch.from {
            self.from = from;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(to) = patch.to {
            self.to = Some(to);
        }
        if let Some(sub) = patch.regex_substitution {
            self.regex_substitution = Some(sub);
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(resource_types) = patch.resource_types {
            self.resource_types = resource_types;
        }
        if self.kind != RuleType::Regex {
            self.regex_substitution = None;
        }
    }
}

/// A rule without an id: the input to add/import and the output of export.
///
/// Any `id` present in incoming JSON is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_substitution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

impl RuleDraft {
    pub fn wildcard(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            kind: RuleType::Wildcard,
            to: Some(to.into()),
            ..Default::default()
        }
    }

    pub fn regex(
        name: impl Into<String>,
        from: impl Into<String>,
        substitution: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            kind: RuleType::Regex,
            regex_substitution: Some(substitution.into()),
            ..Default::default()
        }
    }
}

/// Partial update for an existing rule. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    pub id: RuleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_substitution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<ResourceType>>,
}

impl RulePatch {
    pub fn new(id: RuleId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_json_uses_camel_case_and_type_key() {
        let rule = Rule::from_draft(3, RuleDraft::regex("r", "^https://a/(.*)", "https://b/\\1"));
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["type"], "regex");
        assert_eq!(value["regexSubstitution"], "https://b/\\1");
        assert_eq!(value["enabled"], true);
        assert_eq!(value["priority"], 1);
        assert!(value.get("to").is_none());
        assert!(value.get("resourceTypes").is_none());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let rule: Rule = serde_json::from_str(r#"{"id": 7, "from": "*://a.com/*"}"#).unwrap();
        assert_eq!(rule.kind, RuleType::Wildcard);
        assert!(rule.enabled);
        assert_eq!(rule.priority, 1);
        assert!(rule.name.is_empty());
    }

    #[test]
    fn draft_ignores_supplied_id() {
        let draft: RuleDraft =
            serde_json::from_str(r#"{"id": 99, "name": "x", "from": "a", "to": "https://b/"}"#)
                .unwrap();
        assert_eq!(draft.name, "x");
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn apply_prunes_substitution_when_leaving_regex() {
        let mut rule = Rule::from_draft(1, RuleDraft::regex("r", "^a$", "https://b/"));
        let mut patch = RulePatch::new(42);
        patch.kind = Some(RuleType::Wildcard);
        patch.to = Some("https://c/".into());
        rule.apply(patch);

        assert_eq!(rule.id, 1);
        assert_eq!(rule.kind, RuleType::Wildcard);
        assert_eq!(rule.regex_substitution, None);
        assert_eq!(rule.to.as_deref(), Some("https://c/"));
    }

    #[test]
    fn apply_keeps_untouched_fields() {
        let mut rule = Rule::from_draft(5, RuleDraft::wildcard("keep", "a.com/*", "https://b/"));
        let mut patch = RulePatch::new(5);
        patch.enabled = Some(false);
        rule.apply(patch);

        assert_eq!(rule.name, "keep");
        assert_eq!(rule.to.as_deref(), Some("https://b/"));
        assert!(!rule.enabled);
    }

    #[test]
    fn target_prefers_substitution_for_regex() {
        let mut rule = Rule::from_draft(1, RuleDraft::regex("r", "x", "https://sub/"));
        rule.to = Some("https://to/".into());
        assert_eq!(rule.target(), Some("https://sub/"));
        rule.regex_substitution = None;
        assert_eq!(rule.target(), Some("https://to/"));
    }

    #[test]
    fn resource_type_parses_wire_names() {
        assert_eq!("xmlhttprequest".parse::<ResourceType>(), Ok(ResourceType::Xmlhttprequest));
        assert_eq!("csp_report".parse::<ResourceType>(), Ok(ResourceType::CspReport));
        assert!("document".parse::<ResourceType>().is_err());
        assert_eq!(
            serde_json::to_string(&ResourceType::MainFrame).unwrap(),
            "\"main_frame\""
        );
    }
}
