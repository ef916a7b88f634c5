//! Field validation.
//!
//! Validation results are data: a field→message map that handlers return
//! as a 400 `validation_failed` envelope.

use std::collections::BTreeMap;

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::response::ApiResponse;

/// Field → first failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already failed.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        ApiResponse::ValidationFailed(self).into_response()
    }
}

/// One check on a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Email,
    Numeric,
    OneOf(Vec<String>),
}

impl Rule {
    fn check(&self, field: &str, value: &str) -> Option<String> {
        let ok = match self {
            Rule::Required => !value.trim().is_empty(),
            Rule::MinLength(n) => value.chars().count() >= *n,
            Rule::MaxLength(n) => value.chars().count() <= *n,
            Rule::Email => is_email(value),
            Rule::Numeric => value.trim().parse::<f64>().is_ok(),
            Rule::OneOf(choices) => choices.iter().any(|c| c == value),
        };
        if ok {
            return None;
        }
        Some(match self {
            Rule::Required => format!("{field} is required"),
            Rule::MinLength(n) => format!("{field} must be at least {n} characters"),
            Rule::MaxLength(n) => format!("{field} must be at most {n} characters"),
            Rule::Email => format!("{field} must be a valid email address"),
            Rule::Numeric => format!("{field} must be numeric"),
            Rule::OneOf(choices) => format!("{field} must be one of: {}", choices.join(", ")),
        })
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Ordered per-field rules.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push((name.into(), rules.into_iter().collect()));
        self
    }

    /// Run every rule against values from `lookup`.
    ///
    /// Absent fields only fail `Required`; other rules apply to present
    /// values.
    pub fn check<F>(&self, lookup: F) -> ValidationErrors
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = ValidationErrors::new();
        for (field, rules) in &self.fields {
            let value = lookup(field);
            for rule in rules {
                let failure = match (&value, rule) {
                    (None, Rule::Required) => Some(format!("{field} is required")),
                    (None, _) => None,
                    (Some(value), rule) => rule.check(field, value),
                };
                if let Some(message) = failure {
                    errors.add(field.clone(), message);
                    break;
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_rules_collect_first_failure_per_field() {
        let rules = Rules::new()
            .field("name", [Rule::Required, Rule::MinLength(3)])
            .field("email", [Rule::Required, Rule::Email])
            .field("age", [Rule::Numeric])
            .field("role", [Rule::OneOf(vec!["admin".into(), "user".into()])]);

        let input: HashMap<&str, &str> = [("name", "al"), ("age", "x"), ("role", "user")].into();
        let errors = rules.check(|f| input.get(f).map(|v| v.to_string()));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), Some("name must be at least 3 characters"));
        assert_eq!(errors.get("email"), Some("email is required"));
        assert_eq!(errors.get("age"), Some("age must be numeric"));
        assert_eq!(errors.get("role"), None);
    }

    #[test]
    fn test_email_rule() {
        assert!(is_email("a@b.io"));
        assert!(!is_email("a@b"));
        assert!(!is_email("@b.io"));
        assert!(!is_email("a b@c.io"));
        assert!(!is_email("a@@b.io"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "name is required");
        errors.add("name", "ignored");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({ "name": "name is required" })
        );
        assert!(errors.into_result().is_err());
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
