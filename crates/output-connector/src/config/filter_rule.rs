//! Filter rules controlling which events are forwarded.
//!
//! A rule pairs a field name with a regular expression. Rules are grouped:
//! every rule in a group must match for the group to match (AND), and any
//! matching group accepts the event (OR across groups). An event matching no
//! group is dropped; an empty filter configuration accepts everything.
//!
//! A `field` containing a dot addresses one level of nesting: `meta.host`
//! reads `event["meta"]["host"]`.
//!
//! # Example
//!
//! ```yaml
//! filters:
//!   # forward web-tier errors
//!   - - field: meta.host
//!       match: "^web-"
//!     - field: severity
//!       match: "error|fatal"
//!   # ...or anything from the audit source
//!   - - field: logSource
//!       match: "audit"
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// A single field/pattern match rule.
///
/// The pattern is kept as its source string here; compilation to
/// [`regex::Regex`] happens once, at connector construction.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FilterRule {
    /// Event field the rule reads. Dotted names address one nesting level.
    pub field: String,
    /// Regular expression tested against the extracted value (unanchored).
    #[serde(rename = "match")]
    pub pattern: String,
}

/// Deserializes the `filters` config entry: a list of rule groups.
///
/// Lenient by design so a partially broken host config still starts the
/// connector: entries that are not objects with both `field` and `match`
/// are logged and skipped, and anything that is not a list of lists yields
/// an empty configuration (accept everything).
pub fn deserialize_filter_groups<'de, D>(
    deserializer: D,
) -> Result<Vec<Vec<FilterRule>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: JsonValue = Deserialize::deserialize(deserializer)?;

    let JsonValue::Array(raw_groups) = value else {
        if !value.is_null() {
            tracing::error!("OUTPUT | Filter configuration is not a list, ignoring");
        }
        return Ok(Vec::new());
    };

    let mut groups = Vec::with_capacity(raw_groups.len());
    for raw_group in raw_groups {
        let JsonValue::Array(raw_rules) = raw_group else {
            tracing::error!("OUTPUT | Filter group is not a list, ignoring");
            continue;
        };

        let mut rules = Vec::with_capacity(raw_rules.len());
        for raw_rule in raw_rules {
            match serde_json::from_value::<FilterRule>(raw_rule) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::error!("OUTPUT | Failed to parse filter rule: {e}, ignoring");
                }
            }
        }
        // An all-invalid group is kept: filters are configured, so it still
        // counts toward "no group matched" for events.
        groups.push(rules);
    }

    Ok(groups)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "deserialize_filter_groups")]
        filters: Vec<Vec<FilterRule>>,
    }

    #[test]
    fn test_deserialize_groups() {
        let wrapper: Wrapper = serde_json::from_value(json!({
            "filters": [
                [{"field": "logSource", "match": "hostname.*"}],
                [
                    {"field": "meta.host", "match": "^web-"},
                    {"field": "severity", "match": "error"}
                ]
            ]
        }))
        .unwrap();

        assert_eq!(wrapper.filters.len(), 2);
        assert_eq!(wrapper.filters[1].len(), 2);
        assert_eq!(wrapper.filters[0][0].field, "logSource");
        assert_eq!(wrapper.filters[0][0].pattern, "hostname.*");
    }

    #[test]
    fn test_deserialize_missing_defaults_to_empty() {
        let wrapper: Wrapper = serde_json::from_value(json!({})).unwrap();
        assert!(wrapper.filters.is_empty());
    }

    #[test]
    fn test_deserialize_null_yields_empty() {
        let wrapper: Wrapper = serde_json::from_value(json!({ "filters": null })).unwrap();
        assert!(wrapper.filters.is_empty());
    }

    #[test]
    fn test_deserialize_skips_invalid_rules() {
        let wrapper: Wrapper = serde_json::from_value(json!({
            "filters": [
                [
                    {"field": "ok", "match": "yes"},
                    {"field": "missing match"},
                    "not even an object"
                ]
            ]
        }))
        .unwrap();

        assert_eq!(wrapper.filters.len(), 1);
        assert_eq!(wrapper.filters[0].len(), 1);
        assert_eq!(wrapper.filters[0][0].field, "ok");
    }

    #[test]
    fn test_deserialize_keeps_group_with_no_valid_rules() {
        let wrapper: Wrapper = serde_json::from_value(json!({
            "filters": [[{"field": "only field"}]]
        }))
        .unwrap();

        // The group survives (empty) so filters stay "configured".
        assert_eq!(wrapper.filters.len(), 1);
        assert!(wrapper.filters[0].is_empty());
    }

    #[test]
    fn test_deserialize_non_list_yields_empty() {
        let wrapper: Wrapper =
            serde_json::from_value(json!({ "filters": {"field": "x"} })).unwrap();
        assert!(wrapper.filters.is_empty());
    }
}
