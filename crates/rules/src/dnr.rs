//! Declarative redirect rule schema and the translation from stored rules.

use serde::{Deserialize, Serialize};

use rerouter_core::{ResourceType, Rule, RuleId, RuleType};

/// Resource types a rule applies to when it names none itself.
pub const DEFAULT_RESOURCE_TYPES: [ResourceType; 10] = [
    ResourceType::MainFrame,
    ResourceType::SubFrame,
    ResourceType::Xmlhttprequest,
    ResourceType::Script,
    ResourceType::Image,
    ResourceType::Stylesheet,
    ResourceType::Font,
    ResourceType::Object,
    ResourceType::Ping,
    ResourceType::Other,
];

/// A rule in the engine's declarative format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrRule {
    pub id: RuleId,
    pub priority: u32,
    pub condition: DnrCondition,
    pub action: DnrAction,
}

/// Which requests a rule matches. At most one of the filters is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrCondition {
    pub resource_types: Vec<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DnrActionType {
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnrAction {
    #[serde(rename = "type")]
    pub kind: DnrActionType,
    pub redirect: DnrRedirect,
}

/// Redirect target: a literal URL or a substitution applied to the regex match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrRedirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_substitution: Option<String>,
}

/// Map a stored rule onto the declarative schema.
///
/// Nothing is validated here; the engine rejects what it cannot compile.
pub fn to_dnr_rule(rule: &Rule) -> DnrRule {
    let resource_types = if rule.resource_types.is_empty() {
        DEFAULT_RESOURCE_TYPES.to_vec()
    } else {
        rule.resource_types.clone()
    };

    let is_regex = rule.kind == RuleType::Regex;
    let condition = DnrCondition {
        resource_types,
        url_filter: (!is_regex).then(|| rule.from.clone()),
        regex_filter: is_regex.then(|| rule.from.clone()),
    };

    let substitution = rule
        .regex_substitution
        .as_ref()
        .filter(|s| is_regex && !s.is_empty());
    let redirect = match substitution {
        Some(sub) => DnrRedirect {
            url: None,
            regex_substitution: Some(sub.clone()),
        },
        None => DnrRedirect {
            url: rule.to.clone(),
            regex_substitution: None,
        },
    };

    DnrRule {
        id: rule.id,
        priority: rule.priority.max(1),
        condition,
        action: DnrAction {
            kind: DnrActionType::Redirect,
            redirect,
        },
    }
}
