//! Filter-matching engine over compiled field/pattern rules.
//!
//! Compiled once at connector construction from the string patterns in
//! [`Config::filters`](crate::config::Config), evaluated against every
//! event. Stateless after compilation.
//!
//! Semantics:
//! - an empty set accepts every event
//! - within a group, every rule must match (AND)
//! - across groups, the first match accepts the event (OR)
//! - a missing field value matches as the empty string, never an error
//!
//! Rejections carry the failing pattern and extracted value per group so
//! the connector can report why an event was dropped.

use regex::Regex;

use crate::config::FilterRule;
use crate::error::ConnectorError;
use crate::event_bus::EventRecord;

/// A filter rule with its pattern compiled.
#[derive(Clone, Debug)]
struct CompiledRule {
    field: String,
    pattern: Regex,
}

/// Why a group failed to match an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMiss {
    /// Index of the group in configuration order.
    pub group: usize,
    /// Source text of the first failing pattern; empty for a group with no
    /// usable rules.
    pub pattern: String,
    /// The value the pattern was tested against.
    pub value: String,
}

/// Outcome of evaluating an event against the filter set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(Vec<GroupMiss>),
}

/// The compiled filter configuration.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    groups: Vec<Vec<CompiledRule>>,
}

impl FilterSet {
    /// Compiles filter groups, skipping rules with an empty field or
    /// pattern. An invalid regular expression fails compilation: filters
    /// are validated here, once, rather than at match time.
    pub fn compile(groups: &[Vec<FilterRule>]) -> Result<Self, ConnectorError> {
        let mut compiled_groups = Vec::with_capacity(groups.len());
        for (group_index, group) in groups.iter().enumerate() {
            let mut compiled = Vec::with_capacity(group.len());
            for rule in group {
                if rule.field.is_empty() || rule.pattern.is_empty() {
                    continue;
                }
                let pattern =
                    Regex::new(&rule.pattern).map_err(|source| ConnectorError::InvalidFilter {
                        group: group_index,
                        pattern: rule.pattern.clone(),
                        source,
                    })?;
                compiled.push(CompiledRule {
                    field: rule.field.clone(),
                    pattern,
                });
            }
            // Groups are kept even when no rule survived: configured filters
            // that cannot match must still reject events, not accept them.
            compiled_groups.push(compiled);
        }
        Ok(Self {
            groups: compiled_groups,
        })
    }

    /// Whether no groups are configured (accept-everything mode).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Evaluates an event against every group in order.
    #[must_use]
    pub fn evaluate(&self, record: &EventRecord) -> FilterDecision {
        if self.groups.is_empty() {
            return FilterDecision::Accept;
        }

        let mut misses = Vec::new();
        for (group_index, group) in self.groups.iter().enumerate() {
            if group.is_empty() {
                misses.push(GroupMiss {
                    group: group_index,
                    pattern: String::new(),
                    value: String::new(),
                });
                continue;
            }

            let mut failed = None;
            for rule in group {
                let value = extract_value(record, &rule.field);
                if !rule.pattern.is_match(&value) {
                    failed = Some(GroupMiss {
                        group: group_index,
                        pattern: rule.pattern.as_str().to_string(),
                        value,
                    });
                    break;
                }
            }

            match failed {
                None => return FilterDecision::Accept,
                Some(miss) => misses.push(miss),
            }
        }

        FilterDecision::Reject(misses)
    }
}

/// Extracts the value a rule tests, as text.
///
/// A dotted field name addresses one level of nesting through its first two
/// segments. Missing and null values become the empty string; strings are
/// used verbatim; everything else is matched against its JSON text.
fn extract_value(record: &EventRecord, field: &str) -> String {
    let mut segments = field.split('.');
    let first = segments.next().unwrap_or(field);
    let value = match segments.next() {
        Some(second) => record.get(first).and_then(|nested| nested.get(second)),
        None => record.get(field),
    };

    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
