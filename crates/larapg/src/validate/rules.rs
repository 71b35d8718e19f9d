//! Constraint variants and the pipe-delimited rule syntax.
//!
//! `"required|min:3|max:20"` parses into
//! `[Required, MinLength(3), MaxLength(20)]`. A `regex:` rule consumes the rest
//! of the rule string, so a pattern may contain `|` or `:` as long as the
//! regex rule comes last.

use crate::error::{OrmError, OrmResult};
use crate::validate::errors::ValidationCode;
use crate::value::Value;
use regex::Regex;
use std::collections::HashMap;

/// A single constraint on a field.
#[derive(Debug, Clone)]
pub enum Constraint {
    Required,
    MinLength(usize),
    MaxLength(usize),
    String,
    Numeric,
    Integer,
    Email,
    /// Must equal the sibling `<field>_confirmation`.
    Confirmed,
    /// An upload with an image MIME type must exist.
    Image,
    Regex(Regex),
}

impl Constraint {
    pub fn code(&self) -> ValidationCode {
        match self {
            Self::Required => ValidationCode::Required,
            Self::MinLength(_) => ValidationCode::Min,
            Self::MaxLength(_) => ValidationCode::Max,
            Self::String => ValidationCode::String,
            Self::Numeric => ValidationCode::Numeric,
            Self::Integer => ValidationCode::Integer,
            Self::Email => ValidationCode::Email,
            Self::Confirmed => ValidationCode::Confirmed,
            Self::Image => ValidationCode::Image,
            Self::Regex(_) => ValidationCode::Regex,
        }
    }

    /// Parse one rule such as `min:3` or `email`.
    pub fn parse(rule: &str) -> OrmResult<Self> {
        let rule = rule.trim();
        let (name, arg) = match rule.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (rule, None),
        };

        let constraint = match (name, arg) {
            ("required", None) => Self::Required,
            ("min", Some(n)) => Self::MinLength(parse_len(rule, n)?),
            ("max", Some(n)) => Self::MaxLength(parse_len(rule, n)?),
            ("string", None) => Self::String,
            ("numeric", None) => Self::Numeric,
            ("integer" | "int", None) => Self::Integer,
            ("email", None) => Self::Email,
            ("confirmed", None) => Self::Confirmed,
            ("image", None) => Self::Image,
            ("regex", Some(pattern)) => Self::Regex(
                Regex::new(pattern)
                    .map_err(|e| OrmError::config(format!("invalid regex in rule {rule:?}: {e}")))?,
            ),
            ("min" | "max" | "regex", None) => {
                return Err(OrmError::config(format!("rule {rule:?} requires an argument")));
            }
            (_, Some(_)) if is_known(name) => {
                return Err(OrmError::config(format!("rule {name:?} takes no argument")));
            }
            _ => return Err(OrmError::config(format!("unknown validation rule: {name:?}"))),
        };
        Ok(constraint)
    }

    /// Parse a full rule string such as `required|email`.
    pub fn parse_all(rules: &str) -> OrmResult<Vec<Self>> {
        let mut out = Vec::new();
        let mut rest = rules.trim();
        while !rest.is_empty() {
            if rest.starts_with("regex:") {
                out.push(Self::parse(rest)?);
                break;
            }
            let (rule, tail) = rest.split_once('|').unwrap_or((rest, ""));
            if !rule.trim().is_empty() {
                out.push(Self::parse(rule)?);
            }
            rest = tail.trim_start();
        }
        Ok(out)
    }
}

fn is_known(name: &str) -> bool {
    matches!(
        name,
        "required" | "string" | "numeric" | "integer" | "int" | "email" | "confirmed" | "image"
    )
}

fn parse_len(rule: &str, n: &str) -> OrmResult<usize> {
    n.trim()
        .parse::<usize>()
        .map_err(|_| OrmError::config(format!("invalid length in rule {rule:?}")))
}

/// Constraints and optional default for one field.
#[derive(Debug, Clone)]
pub struct FieldRules {
    pub field: String,
    pub constraints: Vec<Constraint>,
    pub default: Option<Value>,
}

impl FieldRules {
    pub fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::Required))
    }
}

/// The rules for one form, built once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub(crate) fields: Vec<FieldRules>,
    pub(crate) messages: HashMap<String, String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(field, "rule|rule")` pairs, keeping declaration order.
    pub fn parse<I, K, V>(pairs: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (field, rules) in pairs {
            set = set.rule(field, rules.as_ref())?;
        }
        Ok(set)
    }

    /// Add a field with constraints given as a rule string.
    pub fn rule(self, field: impl Into<String>, rules: &str) -> OrmResult<Self> {
        Ok(self.field(field, Constraint::parse_all(rules)?))
    }

    /// Add a field with explicit constraints. Redeclaring a field replaces its
    /// constraints and keeps its position.
    pub fn field(mut self, field: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.constraints = constraints,
            None => self.fields.push(FieldRules {
                field,
                constraints,
                default: None,
            }),
        }
        self
    }

    /// Value used in the sanitized record when the input has none.
    /// Declares the field (without constraints) if it is not declared yet.
    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.field == field) {
            Some(existing) => existing.default = Some(value),
            None => self.fields.push(FieldRules {
                field,
                constraints: Vec::new(),
                default: Some(value),
            }),
        }
        self
    }

    /// Override the message for `"<field>.<rule>"`, e.g. `"email.required"`.
    pub fn with_message(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }

    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pipe_rules_in_order() {
        let c = Constraint::parse_all("required|min:3|max:20|email").unwrap();
        assert!(matches!(
            c.as_slice(),
            [
                Constraint::Required,
                Constraint::MinLength(3),
                Constraint::MaxLength(20),
                Constraint::Email
            ]
        ));
    }

    #[test]
    fn regex_consumes_rest_of_rules() {
        let c = Constraint::parse_all("required|regex:^(cat|dog):[0-9]+$").unwrap();
        assert_eq!(c.len(), 2);
        let Constraint::Regex(re) = &c[1] else {
            panic!("expected regex");
        };
        assert!(re.is_match("dog:42"));
        assert!(!re.is_match("cow:42"));
    }

    #[test]
    fn int_alias_and_whitespace() {
        let c = Constraint::parse_all(" int | string ").unwrap();
        assert!(matches!(c.as_slice(), [Constraint::Integer, Constraint::String]));
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(Constraint::parse("min").is_err());
        assert!(Constraint::parse("min:abc").is_err());
        assert!(Constraint::parse("email:strict").is_err());
        assert!(Constraint::parse("unique:users").is_err());
        assert!(Constraint::parse("regex:(").is_err());
    }

    #[test]
    fn redeclared_field_keeps_position() {
        let set = RuleSet::new()
            .rule("name", "required")
            .unwrap()
            .rule("email", "email")
            .unwrap()
            .rule("name", "min:2")
            .unwrap();
        let names: Vec<_> = set.fields().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, vec!["name", "email"]);
        assert!(!set.fields()[0].is_required());
    }
}
