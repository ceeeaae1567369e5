//! Import/export formats.
//!
//! Export produces the native format: a JSON array of rules without ids.
//! Import accepts that array, or a third-party redirect export shaped as
//! `{"redirects": [{includePattern, redirectUrl, patternType, description, disabled}]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rerouter_core::{Rule, RuleDraft, RuleType};

use crate::error::{Result, RuleError};

/// Name given to third-party entries that carry no description.
pub const DEFAULT_IMPORTED_NAME: &str = "Imported Rule";

/// Which format an import was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSource {
    Native,
    ThirdParty,
}

/// Drafts ready for [`crate::RuleService::import_many`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub source: ImportSource,
    pub rules: Vec<RuleDraft>,
}

/// One entry of a third-party redirect export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThirdPartyRedirect {
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// `"R"` for regular expressions, anything else is a wildcard.
    #[serde(default)]
    pub pattern_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

impl ThirdPartyRedirect {
    pub fn into_draft(self) -> RuleDraft {
        let is_regex = self.pattern_type.as_deref() == Some("R");
        let target = self.redirect_url.unwrap_or_default();
        let name = self
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_IMPORTED_NAME.to_string());

        RuleDraft {
            name,
            from: self.include_pattern.unwrap_or_default(),
            kind: if is_regex { RuleType::Regex } else { RuleType::Wildcard },
            to: (!is_regex).then(|| target.clone()),
            regex_substitution: is_regex.then_some(target),
            enabled: Some(!self.disabled.unwrap_or(false)),
            priority: None,
            resource_types: Vec::new(),
        }
    }
}

/// Parse import file contents, detecting the format.
///
/// Fails with [`RuleError::InvalidFormat`] before anything reaches the store.
pub fn parse_import(text: &str) -> Result<ImportBatch> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RuleError::InvalidFormat(format!("not valid JSON: {e}")))?;
    import_value(value)
}

/// Same as [`parse_import`] for an already parsed document.
pub fn import_value(value: Value) -> Result<ImportBatch> {
    match value {
        Value::Object(mut map) if matches!(map.get("redirects"), Some(Value::Array(_))) => {
            let redirects = map.remove("redirects").unwrap_or(Value::Null);
            let entries: Vec<ThirdPartyRedirect> = serde_json::from_value(redirects)
                .map_err(|e| RuleError::InvalidFormat(format!("bad redirect entry: {e}")))?;
            Ok(ImportBatch {
                source: ImportSource::ThirdParty,
                rules: entries.into_iter().map(ThirdPartyRedirect::into_draft).collect(),
            })
        }
        Value::Array(items) => {
            let rules: Vec<RuleDraft> = serde_json::from_value(Value::Array(items))
                .map_err(|e| RuleError::InvalidFormat(format!("bad rule entry: {e}")))?;
            Ok(ImportBatch {
                source: ImportSource::Native,
                rules,
            })
        }
        _ => Err(RuleError::InvalidFormat(
            "expected an array of rules or an object with a \"redirects\" array".into(),
        )),
    }
}

/// Strip ids for export.
pub fn export_rules(rules: &[Rule]) -> Vec<RuleDraft> {
    rules.iter().map(Rule::to_draft).collect()
}

/// Pretty-printed native export document.
pub fn export_json(rules: &[RuleDraft]) -> String {
    // Serializing plain data structs cannot fail.
    serde_json::to_string_pretty(rules).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_party_regex_maps_substitution() {
        let batch = parse_import(
            r#"{"redirects": [{
                "includePattern": "^https://old/(.*)",
                "redirectUrl": "https://new/$1",
                "patternType": "R",
                "description": "move",
                "disabled": false
            }]}"#,
        )
        .unwrap();

        assert_eq!(batch.source, ImportSource::ThirdParty);
        let rule = &batch.rules[0];
        assert_eq!(rule.kind, RuleType::Regex);
        assert_eq!(rule.regex_substitution.as_deref(), Some("https://new/$1"));
        assert_eq!(rule.to, None);
        assert_eq!(rule.name, "move");
        assert_eq!(rule.enabled, Some(true));
    }

    #[test]
    fn third_party_wildcard_defaults() {
        let batch = parse_import(r#"{"redirects": [{"patternType": "W", "disabled": true}]}"#).unwrap();
        let rule = &batch.rules[0];
        assert_eq!(rule.kind, RuleType::Wildcard);
        assert_eq!(rule.name, DEFAULT_IMPORTED_NAME);
        assert_eq!(rule.from, "");
        assert_eq!(rule.to.as_deref(), Some(""));
        assert_eq!(rule.regex_substitution, None);
        assert_eq!(rule.enabled, Some(false));
    }

    #[test]
    fn native_array_is_accepted_and_ids_dropped() {
        let batch = parse_import(
            r#"[{"id": 5, "name": "a", "from": "a.com", "type": "wildcard", "to": "https://b/", "enabled": false}]"#,
        )
        .unwrap();
        assert_eq!(batch.source, ImportSource::Native);
        assert_eq!(batch.rules[0].to.as_deref(), Some("https://b/"));
        assert_eq!(batch.rules[0].enabled, Some(false));
    }

    #[test]
    fn other_shapes_are_invalid_format() {
        for text in [r#"{"rules": []}"#, "42", "not json", r#"{"redirects": "x"}"#, "[1, 2]"] {
            let err = parse_import(text).unwrap_err();
            assert!(matches!(err, RuleError::InvalidFormat(_)), "{text}");
        }
    }

    #[test]
    fn export_round_trips_through_import() {
        let mut regex = Rule::from_draft(1, RuleDraft::regex("r", "^a(.*)", "https://b/\\1"));
        regex.enabled = false;
        let wildcard = Rule::from_draft(2, RuleDraft::wildcard("w", "*.c.com/*", "https://d/"));

        let json = export_json(&export_rules(&[regex.clone(), wildcard.clone()]));
        assert!(!json.contains("\"id\""));

        let batch = parse_import(&json).unwrap();
        for (draft, original) in batch.rules.into_iter().zip([regex, wildcard]) {
            let restored = Rule::from_draft(original.id, draft);
            assert_eq!(restored, original);
        }
    }
}
