//! Serialization preferences, persisted by the host as a flat JSON map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// How rewritten stylesheets are laid out, plus scan options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// One indentation step.
    pub indent: String,
    /// Indent the closing brace to the level of the declarations.
    pub indent_closing_brace: bool,
    /// Drop the `;` after the last declaration of a block.
    pub omit_last_semicolon: bool,
    /// Write `0.5em` as `.5em`.
    pub omit_leading_zero: bool,
    /// Keep style rules without declarations.
    pub keep_empty_rules: bool,
    /// Blank lines between consecutive rules.
    pub blank_lines_after_rules: u32,
    /// Collapse whitespace in unknown at-rules instead of copying them verbatim.
    pub format_unknown_rules: bool,
    /// Also scan XML-family resources that are not XHTML content documents.
    pub scan_all_xml: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            indent_closing_brace: false,
            omit_last_semicolon: false,
            omit_leading_zero: false,
            keep_empty_rules: true,
            blank_lines_after_rules: 0,
            format_unknown_rules: false,
            scan_all_xml: false,
        }
    }
}

impl Preferences {
    /// Build preferences from a stored map.
    ///
    /// Unknown keys are ignored and a value of the wrong type falls back to
    /// that key's default, so one bad entry never discards the others.
    pub fn from_map(stored: &Map<String, Value>) -> Self {
        let mut merged = Self::default().to_map();

        for (key, value) in stored {
            if !merged.contains_key(key) {
                continue;
            }
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value.clone());
            if serde_json::from_value::<Self>(Value::Object(candidate)).is_ok() {
                merged.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }

    /// Strict parse of a JSON object, for hosts that keep preferences as text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Error;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.indent, "  ");
        assert!(prefs.keep_empty_rules);
        assert!(!prefs.omit_last_semicolon);
        assert_eq!(prefs.blank_lines_after_rules, 0);
    }

    #[test]
    fn test_round_trip_through_map() {
        let prefs = Preferences {
            indent: "\t".to_string(),
            omit_leading_zero: true,
            blank_lines_after_rules: 2,
            ..Default::default()
        };
        assert_eq!(Preferences::from_map(&prefs.to_map()), prefs);
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let prefs = Preferences::from_map(&map(json!({ "omit_last_semicolon": true })));
        assert!(prefs.omit_last_semicolon);
        assert_eq!(prefs.indent, "  ");
    }

    #[test]
    fn test_bad_value_only_resets_its_key() {
        let stored = map(json!({
            "indent": 4,
            "keep_empty_rules": false,
            "blank_lines_after_rules": -1,
            "legacy_option": "ignored"
        }));
        let prefs = Preferences::from_map(&stored);
        assert_eq!(prefs.indent, "  ");
        assert!(!prefs.keep_empty_rules);
        assert_eq!(prefs.blank_lines_after_rules, 0);
    }

    #[test]
    fn test_from_json_is_strict() {
        let prefs = Preferences::from_json(r#"{"scan_all_xml": true}"#).unwrap();
        assert!(prefs.scan_all_xml);

        let err = Preferences::from_json(r#"{"scan_all_xml": "yes"}"#).unwrap_err();
        assert!(matches!(err, Error::Preferences(_)));
    }
}
