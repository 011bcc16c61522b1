//! Field-level predicates used by the filter engine.
//!
//! String filters use a two-level boolean grammar: the pin is split on `&&`
//! first, each AND term is split on `||`, and each branch is a
//! case-insensitive substring test. There is no grouping beyond that split:
//! `a || b && c` means `(a || b) && c`.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::defs::{FilterDefinition, FilterType, Operator};
use crate::hdate::HDate;

/// A compiled string-filter pin: AND of ORs of case-insensitive substrings.
#[derive(Debug, Clone)]
pub struct StringPin {
    terms: Vec<Vec<Regex>>,
}

impl StringPin {
    pub fn compile(pin: &str) -> Self {
        let terms = pin
            .split("&&")
            .map(|term| {
                term.split("||")
                    .map(str::trim)
                    .filter(|branch| !branch.is_empty())
                    .filter_map(|branch| {
                        RegexBuilder::new(&regex::escape(branch))
                            .case_insensitive(true)
                            .build()
                            .ok()
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|branches| !branches.is_empty())
            .collect();
        Self { terms }
    }

    /// An empty or missing haystack never matches.
    pub fn is_match(&self, haystack: Option<&str>) -> bool {
        match haystack {
            None | Some("") => false,
            Some(text) => self
                .terms
                .iter()
                .all(|branches| branches.iter().any(|re| re.is_match(text))),
        }
    }
}

/// `contains == false` negates the whole AND/OR result.
pub fn match_string(pin: &str, haystack: Option<&str>, contains: bool) -> bool {
    let matches = StringPin::compile(pin).is_match(haystack);
    if contains { matches } else { !matches }
}

fn ordering_satisfies(op: Operator, ord: Ordering) -> bool {
    match op {
        Operator::Gt => ord == Ordering::Greater,
        Operator::Gte => ord != Ordering::Less,
        Operator::Lt => ord == Ordering::Less,
        Operator::Lte => ord != Ordering::Greater,
        Operator::Eq => ord == Ordering::Equal,
        Operator::Neq => ord != Ordering::Equal,
        _ => false,
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compare `field <op> value`. Anything unparsable is a non-match.
pub fn match_number(op: Operator, value: &str, field: Option<&Value>) -> bool {
    let Ok(wanted) = value.trim().parse::<f64>() else { return false; };
    let Some(actual) = field.and_then(value_as_number) else { return false; };
    match actual.partial_cmp(&wanted) {
        Some(ord) => ordering_satisfies(op, ord),
        None => false,
    }
}

/// Compare historical dates on their shared calendar fields.
/// Dates with no field in common never match, whatever the operator.
pub fn match_hdate(op: Operator, value: &str, field: Option<&Value>) -> bool {
    let Some(wanted) = HDate::parse(value) else { return false; };
    let Some(actual) = field.and_then(HDate::from_value) else { return false; };
    match actual.compare(&wanted) {
        Some(ord) => ordering_satisfies(op, ord),
        None => false,
    }
}

/// Text used for substring matching.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            Some(parts.join(", "))
        }
        Value::Object(map) => map
            .get("formattedDateString")
            .or_else(|| map.get("label"))
            .and_then(value_text),
    }
}

pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// A filter definition prepared for repeated evaluation over many records.
#[derive(Debug, Clone)]
pub struct FilterPredicate<'a> {
    filter: &'a FilterDefinition,
    pin: Option<StringPin>,
}

impl<'a> FilterPredicate<'a> {
    pub fn new(filter: &'a FilterDefinition) -> Self {
        let pin = match (&filter.value, filter.operator) {
            (Some(value), Some(Operator::Contains | Operator::NotContains)) if filter.filter_type.is_textual() => {
                Some(StringPin::compile(value))
            }
            _ => None,
        };
        Self { filter, pin }
    }

    pub fn filter(&self) -> &FilterDefinition {
        self.filter
    }

    /// Evaluate against the resolved field value. Malformed definitions
    /// (no key, no operator, or no value where one is needed) do not match.
    pub fn test(&self, field: Option<&Value>) -> bool {
        let filter = self.filter;
        let Some(op) = filter.operator else { return false; };
        if filter.key.is_empty() {
            return false;
        }
        match op {
            Operator::NoOp => true,
            Operator::IsEmpty => is_empty_value(field),
            Operator::IsNotEmpty => !is_empty_value(field),
            Operator::Contains | Operator::NotContains => {
                let Some(pin) = &self.pin else { return false; };
                let haystack = field.and_then(value_text);
                let matches = pin.is_match(haystack.as_deref());
                if op == Operator::Contains { matches } else { !matches }
            }
            _ => {
                let Some(value) = &filter.value else { return false; };
                match filter.filter_type {
                    FilterType::Number => match_number(op, value, field),
                    FilterType::HDate => match_hdate(op, value, field),
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_and_or_grammar() {
        let pin = "Apple && Banana||Cherry";
        assert!(match_string(pin, Some("I like Cherry pie and Apple juice"), true));
        assert!(!match_string(pin, Some("I like Cherry pie and Banana bread"), true));
        assert!(match_string(pin, Some("I like Cherry pie and Banana bread"), false));
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        assert!(match_string("tacit", Some("Publius Cornelius TACITUS"), true));
        assert!(!match_string("tacitus", Some("Tacit"), true));
    }

    #[test]
    fn test_regex_characters_are_literal() {
        assert!(match_string("a.c", Some("xa.cx"), true));
        assert!(!match_string("a.c", Some("abc"), true));
        assert!(match_string("(1)", Some("item (1)"), true));
    }

    #[test]
    fn test_empty_haystack_never_matches() {
        assert!(!match_string("a", None, true));
        assert!(!match_string("a", Some(""), true));
        assert!(match_string("a", Some(""), false));
    }

    #[test]
    fn test_empty_branches_are_ignored() {
        assert!(match_string("apple ||", Some("apple"), true));
        assert!(match_string("&& apple", Some("apple"), true));
        assert!(match_string("", Some("anything"), true));
    }

    #[test]
    fn test_match_number() {
        assert!(match_number(Operator::Gt, "3", Some(&json!(4))));
        assert!(!match_number(Operator::Gt, "4", Some(&json!(4))));
        assert!(match_number(Operator::Gte, "4", Some(&json!("4"))));
        assert!(match_number(Operator::Lt, "4.5", Some(&json!(4))));
        assert!(match_number(Operator::Lte, "4", Some(&json!(4.0))));
        assert!(match_number(Operator::Eq, " 7 ", Some(&json!(7))));
        assert!(match_number(Operator::Neq, "7", Some(&json!(8))));
        assert!(!match_number(Operator::Eq, "seven", Some(&json!(7))));
        assert!(!match_number(Operator::Eq, "7", None));
        assert!(!match_number(Operator::Eq, "7", Some(&json!("n/a"))));
    }

    #[test]
    fn test_match_hdate() {
        let born = json!("March 12, 1850");
        assert!(match_hdate(Operator::Gt, "1849", Some(&born)));
        assert!(match_hdate(Operator::Eq, "1850", Some(&born)));
        assert!(match_hdate(Operator::Lt, "April 1850", Some(&born)));
        assert!(!match_hdate(Operator::Neq, "1850", Some(&born)));
    }

    #[test]
    fn test_hdate_without_shared_granularity_never_matches() {
        let year_only = json!("1850");
        assert!(!match_hdate(Operator::Eq, "March", Some(&year_only)));
        assert!(!match_hdate(Operator::Neq, "March", Some(&year_only)));
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!("  "))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!("x"))));
    }

    #[test]
    fn test_predicate_malformed_definitions_do_not_match() {
        let mut f = FilterDefinition::new("f", "label", FilterType::String, Operator::Contains, "a");
        f.key = String::new();
        assert!(!FilterPredicate::new(&f).test(Some(&json!("a"))));

        let mut f = FilterDefinition::new("f", "label", FilterType::String, Operator::Contains, "a");
        f.operator = None;
        assert!(!FilterPredicate::new(&f).test(Some(&json!("a"))));

        let mut f = FilterDefinition::new("f", "label", FilterType::String, Operator::NotContains, "a");
        f.value = None;
        assert!(!FilterPredicate::new(&f).test(Some(&json!("b"))));
    }

    #[test]
    fn test_predicate_dispatch() {
        let f = FilterDefinition::new("f", "tags", FilterType::Select, Operator::Contains, "greek");
        assert!(FilterPredicate::new(&f).test(Some(&json!(["Roman", "Greek"]))));

        let f = FilterDefinition::new("f", "degrees", FilterType::Number, Operator::Gte, "2");
        assert!(FilterPredicate::new(&f).test(Some(&json!(2))));

        let f = FilterDefinition::new("f", "notes", FilterType::String, Operator::IsEmpty, "");
        assert!(FilterPredicate::new(&f).test(None));

        // contains on a number field is not a valid combination
        let f = FilterDefinition::new("f", "degrees", FilterType::Number, Operator::Contains, "2");
        assert!(!FilterPredicate::new(&f).test(Some(&json!(2))));
    }
}
