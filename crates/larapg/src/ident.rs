//! Safe SQL identifier handling.
//!
//! [`Ident`] is a table or column name that has been checked against the
//! identifier-safe pattern `[A-Za-z_][A-Za-z0-9_]*` (at most 63 bytes, the
//! PostgreSQL limit). Identifiers are always rendered double-quoted so reserved
//! words such as `user` or `order` are usable as names.
//!
//! # Example
//! ```ignore
//! use larapg::Ident;
//!
//! let t = Ident::new("products")?;
//! assert_eq!(t.to_sql(), r#""products""#);
//! # Ok::<(), larapg::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// Maximum identifier length accepted by PostgreSQL (`NAMEDATALEN - 1`).
const MAX_IDENT_LEN: usize = 63;

/// A validated SQL identifier (table or column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate `name` and wrap it.
    pub fn new(name: &str) -> OrmResult<Self> {
        if name.is_empty() {
            return Err(OrmError::InvalidIdent("identifier cannot be empty".into()));
        }
        if name.len() > MAX_IDENT_LEN {
            return Err(OrmError::InvalidIdent(format!(
                "identifier longer than {MAX_IDENT_LEN} bytes: {name}"
            )));
        }
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            if !(first == '_' || first.is_ascii_alphabetic()) {
                return Err(OrmError::InvalidIdent(format!(
                    "invalid identifier start character '{first}' in {name:?}"
                )));
            }
        }
        if let Some(bad) = chars.find(|c| !(*c == '_' || c.is_ascii_alphanumeric())) {
            return Err(OrmError::InvalidIdent(format!(
                "invalid character '{bad}' in identifier {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// The bare name, as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the identifier as SQL (double-quoted).
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        // The pattern check rules out `"`, so no escaping is needed.
        out.push('"');
        out.push_str(&self.0);
        out.push('"');
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `true` if `s` matches the identifier-safe pattern.
pub fn is_valid_ident(s: &str) -> bool {
    Ident::new(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::new("users").unwrap();
        assert_eq!(ident.to_sql(), r#""users""#);
        assert_eq!(ident.as_str(), "users");
    }

    #[test]
    fn ident_underscore_and_digits() {
        assert!(is_valid_ident("_private"));
        assert!(is_valid_ident("product_image2"));
    }

    #[test]
    fn ident_rejects_empty() {
        assert!(Ident::new("").is_err());
    }

    #[test]
    fn ident_rejects_start_digit() {
        assert!(Ident::new("1table").is_err());
    }

    #[test]
    fn ident_rejects_space_and_punctuation() {
        assert!(Ident::new("my table").is_err());
        assert!(Ident::new("users; DROP TABLE x").is_err());
        assert!(Ident::new("a\"b").is_err());
        assert!(Ident::new("public.users").is_err());
    }

    #[test]
    fn ident_rejects_too_long() {
        let long = "a".repeat(64);
        assert!(Ident::new(&long).is_err());
        assert!(Ident::new(&long[..63]).is_ok());
    }
}
