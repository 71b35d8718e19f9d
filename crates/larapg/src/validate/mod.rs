//! Rule-based input validation.
//!
//! A [`RuleSet`] declares, per field, an ordered list of [`Constraint`]s.
//! [`validate`] checks an [`Input`] against it and returns either a sanitized
//! [`Record`] holding exactly the declared fields, or
//! [`OrmError::ValidationFailed`] (status 422) with every field's messages.
//! There is no partial success.
//!
//! ```ignore
//! use larapg::validate::{validate, Input, RuleSet};
//!
//! let rules = RuleSet::parse([
//!     ("name", "required|string|min:3"),
//!     ("email", "required|email"),
//!     ("password", "required|min:6|confirmed"),
//! ])?;
//! let data = validate(&Input::new(form_record), &rules)?;
//! ```

mod errors;
mod rules;

pub use errors::{ValidationCode, ValidationError, ValidationErrors};
pub use rules::{Constraint, FieldRules, RuleSet};

use crate::error::{OrmError, OrmResult};
use crate::value::{Record, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// MIME types accepted by the `image` rule.
pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

/// Metadata of an uploaded file part, as reported by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }

    pub fn is_image(&self) -> bool {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        IMAGE_MIME_TYPES.contains(&mime.as_str())
    }
}

/// Submitted form fields plus uploaded file metadata, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct Input {
    pub fields: Record,
    pub files: BTreeMap<String, UploadedFile>,
}

impl Input {
    pub fn new(fields: Record) -> Self {
        Self {
            fields,
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }
}

impl From<Record> for Input {
    fn from(fields: Record) -> Self {
        Self::new(fields)
    }
}

/// Best-effort email validation.
///
/// This is intentionally not fully RFC-compliant. Use a `regex:` rule for
/// stricter formats.
pub fn is_email(s: &str) -> bool {
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

/// Decimal number text: `12`, `-3.5`, `+.25`.
pub fn is_numeric(s: &str) -> bool {
    static NUMERIC_RE: OnceLock<regex::Regex> = OnceLock::new();
    NUMERIC_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("invalid built-in numeric regex")
        })
        .is_match(s)
}

/// Integer text: `42`, `-7`.
pub fn is_integer(s: &str) -> bool {
    static INTEGER_RE: OnceLock<regex::Regex> = OnceLock::new();
    INTEGER_RE
        .get_or_init(|| regex::Regex::new(r"^[+-]?\d+$").expect("invalid built-in integer regex"))
        .is_match(s)
}

fn default_message(field: &str, constraint: &Constraint) -> String {
    match constraint {
        Constraint::Required => format!("{field} is required"),
        Constraint::MinLength(n) => format!("{field} must be at least {n} characters"),
        Constraint::MaxLength(n) => format!("{field} must not exceed {n} characters"),
        Constraint::String => format!("{field} must be a string"),
        Constraint::Numeric => format!("{field} must be numeric"),
        Constraint::Integer => format!("{field} must be an integer"),
        Constraint::Email => format!("{field} must be a valid email"),
        Constraint::Confirmed => format!("{field} confirmation does not match"),
        Constraint::Image => format!("{field} must be an image (jpeg, jpg, png, webp, gif)"),
        Constraint::Regex(_) => format!("{field} format is invalid"),
    }
}

/// Check one constraint against a value; `Null` stands in for a missing one.
fn passes(constraint: &Constraint, field: &str, value: &Value, input: &Input) -> bool {
    match constraint {
        Constraint::Required => true,
        Constraint::MinLength(n) => value.to_text().chars().count() >= *n,
        Constraint::MaxLength(n) => value.to_text().chars().count() <= *n,
        Constraint::String => matches!(value, Value::Text(_)),
        Constraint::Numeric => match value {
            Value::Int(_) => true,
            Value::Float(f) => f.is_finite(),
            Value::Text(s) => is_numeric(s),
            _ => false,
        },
        Constraint::Integer => match value {
            Value::Int(_) => true,
            Value::Text(s) => is_integer(s),
            _ => false,
        },
        Constraint::Email => value.as_str().is_some_and(is_email),
        Constraint::Confirmed => input
            .fields
            .get(&format!("{field}_confirmation"))
            .is_some_and(|confirmation| confirmation == value),
        Constraint::Image => input.files.get(field).is_some_and(UploadedFile::is_image),
        Constraint::Regex(re) => re.is_match(&value.to_text()),
    }
}

/// Validate `input` against `rules`.
///
/// Per field, constraints run in declaration order. A field that is absent
/// (missing, null, blank text, and no upload) fails `required` and nothing
/// else is reported for it. Every other constraint is checked against the
/// value, or `Null` when absent, and every failure is collected.
pub fn validate(input: &Input, rules: &RuleSet) -> OrmResult<Record> {
    let mut errors = ValidationErrors::default();

    for field_rules in &rules.fields {
        let field = field_rules.field.as_str();
        let value = input.fields.get(field);
        let present =
            input.files.contains_key(field) || value.is_some_and(|v| !v.is_blank());

        if !present && field_rules.is_required() {
            errors.push(message_for(rules, field, &Constraint::Required));
            continue;
        }

        let value = match value {
            Some(v) if present => v,
            _ => &Value::Null,
        };
        for constraint in &field_rules.constraints {
            if !passes(constraint, field, value, input) {
                errors.push(message_for(rules, field, constraint));
            }
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            target: "larapg.validate",
            failed_fields = errors.fields().len(),
            "validation failed"
        );
        return Err(OrmError::ValidationFailed(errors));
    }

    let mut out = Record::with_capacity(rules.fields.len());
    for field_rules in &rules.fields {
        let value = input
            .fields
            .get(&field_rules.field)
            .filter(|v| !v.is_blank())
            .cloned()
            .or_else(|| field_rules.default.clone())
            .unwrap_or(Value::Null);
        out.insert(field_rules.field.clone(), value);
    }
    Ok(out)
}

fn message_for(rules: &RuleSet, field: &str, constraint: &Constraint) -> ValidationError {
    let code = constraint.code();
    let key = format!("{field}.{}", code.as_str());
    let message = rules
        .messages
        .get(&key)
        .cloned()
        .unwrap_or_else(|| default_message(field, constraint));
    ValidationError::new(field, code, message)
}

impl RuleSet {
    /// Shorthand for [`validate`].
    pub fn validate(&self, input: &Input) -> OrmResult<Record> {
        validate(input, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(pairs: &[(&str, &str)]) -> Input {
        Input::new(pairs.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn errors(result: OrmResult<Record>) -> ValidationErrors {
        match result {
            Err(OrmError::ValidationFailed(e)) => e,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn email_and_number_helpers() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("a b@c.de"));
        assert!(is_numeric("12.50"));
        assert!(is_numeric("-.5"));
        assert!(!is_numeric("1e5"));
        assert!(!is_numeric("12a"));
        assert!(is_integer("+42"));
        assert!(!is_integer("4.2"));
    }

    #[test]
    fn required_blank_bails_before_other_rules() {
        let rules = RuleSet::parse([("name", "required|min:3|email")]).unwrap();
        for blank in ["", "   ", "\t\n"] {
            let e = errors(validate(&input(&[("name", blank)]), &rules));
            assert_eq!(e.messages("name"), vec!["name is required"]);
        }
        let e = errors(validate(&Input::default(), &rules));
        assert_eq!(e.len(), 1);
        assert!(e.has("name", &ValidationCode::Required));
    }

    #[test]
    fn min_max_boundaries() {
        let rules = RuleSet::parse([("username", "min:3|max:20")]).unwrap();
        for len in [2usize, 21] {
            let v = "a".repeat(len);
            assert!(validate(&input(&[("username", v.as_str())]), &rules).is_err(), "len {len}");
        }
        for len in [3usize, 20] {
            let v = "a".repeat(len);
            assert!(validate(&input(&[("username", v.as_str())]), &rules).is_ok(), "len {len}");
        }
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let rules = RuleSet::parse([("name", "max:3")]).unwrap();
        assert!(validate(&input(&[("name", "äöü")]), &rules).is_ok());
    }

    #[test]
    fn non_required_failures_are_all_collected() {
        let rules = RuleSet::parse([("code", "min:5|integer|regex:^[0-9]+$")]).unwrap();
        let e = errors(validate(&input(&[("code", "ab")]), &rules));
        assert_eq!(
            e.messages("code"),
            vec![
                "code must be at least 5 characters",
                "code must be an integer",
                "code format is invalid",
            ]
        );
    }

    #[test]
    fn confirmed_requires_exact_match() {
        let rules = RuleSet::parse([("password", "required|confirmed")]).unwrap();
        let ok = input(&[("password", "secret1"), ("password_confirmation", "secret1")]);
        assert!(validate(&ok, &rules).is_ok());

        let spaced = input(&[("password", "secret1"), ("password_confirmation", "secret1 ")]);
        let e = errors(validate(&spaced, &rules));
        assert_eq!(e.messages("password"), vec!["password confirmation does not match"]);

        let missing = input(&[("password", "secret1")]);
        assert!(validate(&missing, &rules).is_err());
    }

    #[test]
    fn image_checks_upload_mime_type() {
        let rules = RuleSet::parse([("product_image", "required|image")]).unwrap();

        let png = Input::default().with_file(
            "product_image",
            UploadedFile::new("lamp.png", "image/png", 1024),
        );
        assert!(validate(&png, &rules).is_ok());

        let pdf = Input::default().with_file(
            "product_image",
            UploadedFile::new("manual.pdf", "application/pdf", 1024),
        );
        let e = errors(validate(&pdf, &rules));
        assert!(e.has("product_image", &ValidationCode::Image));

        let e = errors(validate(&Input::default(), &rules));
        assert!(e.has("product_image", &ValidationCode::Required));
    }

    #[test]
    fn absent_optional_field_still_runs_its_constraints() {
        let rules = RuleSet::parse([("nickname", "min:3|email")]).unwrap();
        let e = errors(validate(&Input::default(), &rules));
        assert_eq!(
            e.messages("nickname"),
            vec![
                "nickname must be at least 3 characters",
                "nickname must be a valid email",
            ]
        );

        let e = errors(validate(&input(&[("nickname", "    ")]), &rules));
        assert_eq!(e.messages("nickname").len(), 2);

        let rules = RuleSet::parse([("photo", "image")]).unwrap();
        let e = errors(validate(&Input::default(), &rules));
        assert!(e.has("photo", &ValidationCode::Image));
    }

    #[test]
    fn constraints_satisfied_by_absence_pass() {
        let rules = RuleSet::parse([("bio", "max:200")]).unwrap();
        let data = validate(&Input::default(), &rules).unwrap();
        assert_eq!(data.get("bio"), Some(&Value::Null));
    }

    #[test]
    fn blank_input_falls_back_to_default() {
        let rules = RuleSet::new()
            .with_default("role", "member")
            .field("note", Vec::new());
        let form = input(&[("role", "   "), ("note", "\t")]);
        let data = validate(&form, &rules).unwrap();
        assert_eq!(data.get("role"), Some(&Value::from("member")));
        assert_eq!(data.get("note"), Some(&Value::Null));
    }

    #[test]
    fn success_returns_declared_fields_with_defaults() {
        let rules = RuleSet::parse([("name", "required"), ("role", "max:20")])
            .unwrap()
            .with_default("role", "member")
            .with_default("active", true);
        let form = input(&[("name", "Ada"), ("is_admin", "1")]);

        let data = validate(&form, &rules).unwrap();
        assert_eq!(data.columns().collect::<Vec<_>>(), vec!["name", "role", "active"]);
        assert_eq!(data.get("name"), Some(&Value::from("Ada")));
        assert_eq!(data.get("role"), Some(&Value::from("member")));
        assert_eq!(data.get("active"), Some(&Value::Bool(true)));
        assert!(!data.contains("is_admin"));
    }

    #[test]
    fn failure_in_one_field_yields_no_data() {
        let rules = RuleSet::parse([("name", "required"), ("email", "required|email")]).unwrap();
        let form = input(&[("name", "Ada"), ("email", "nope")]);
        let err = validate(&form, &rules).unwrap_err();
        assert_eq!(err.status(), 422);
        let e = err.validation_errors().unwrap();
        assert_eq!(e.fields(), vec!["email"]);
    }

    #[test]
    fn numeric_accepts_numbers_and_numeric_text() {
        let rules = RuleSet::parse([("price", "numeric")]).unwrap();
        assert!(validate(&Input::new(Record::new().set("price", 12.5)), &rules).is_ok());
        assert!(validate(&Input::new(Record::new().set("price", 3)), &rules).is_ok());
        assert!(validate(&input(&[("price", "12.50")]), &rules).is_ok());
        assert!(validate(&input(&[("price", "twelve")]), &rules).is_err());
    }

    #[test]
    fn custom_messages_override_defaults() {
        let rules = RuleSet::parse([("email", "required|email")])
            .unwrap()
            .with_message("email.required", "We need your email");
        let e = errors(validate(&Input::default(), &rules));
        assert_eq!(e.messages("email"), vec!["We need your email"]);
    }

    #[test]
    fn errors_serialize_as_field_map() {
        let rules = RuleSet::parse([("name", "required"), ("age", "integer|max:2")]).unwrap();
        let e = errors(validate(&input(&[("age", "abc")]), &rules));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": ["name is required"],
                "age": ["age must be an integer", "age must not exceed 2 characters"],
            })
        );
    }
}
