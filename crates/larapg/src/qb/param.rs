//! Bound parameters and built statements.

use crate::value::Value;
use tokio_postgres::types::ToSql;

/// An ordered list of bound values with 1-based placeholder numbering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamList {
    params: Vec<Value>,
}

impl ParamList {
    /// Create a new empty parameter list.
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its placeholder (`$n`).
    pub fn push(&mut self, value: impl Into<Value>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }

    /// Get the current parameter count.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.params
    }
}

/// A statement template plus its ordered bound values.
///
/// Values never appear in [`Statement::sql`]; they travel separately and are
/// sent to the server as bind parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub(crate) fn new(sql: String, params: ParamList) -> Self {
        Self {
            sql,
            params: params.into_values(),
        }
    }

    /// Get all parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }
}
