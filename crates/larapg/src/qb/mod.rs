//! Statement builders for the generic repository.
//!
//! Every function here is pure: it takes a table name (already checked against
//! the allow-list by [`Repository`](crate::Repository)) plus data and returns a
//! [`Statement`]. Values are always bound as `$n` parameters, never spliced
//! into the SQL text. Table and column names are re-checked against the
//! identifier-safe pattern before use.
//!
//! # Usage
//!
//! ```ignore
//! use larapg::{qb, Record};
//!
//! let stmt = qb::insert("products", &Record::new().set("product_name", "Lamp"))?;
//! assert_eq!(stmt.sql, r#"INSERT INTO "products" ("product_name") VALUES ($1) RETURNING *"#);
//! ```

mod param;

pub use param::{ParamList, Statement};

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::value::{Record, Value};

/// Primary key column used by every repository table.
pub const ID_COLUMN: &str = "id";

/// Column holding the soft-delete timestamp.
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

fn table_sql(table: &str) -> OrmResult<String> {
    Ok(Ident::new(table)?.to_sql())
}

fn live_rows_filter() -> String {
    format!("\"{SOFT_DELETE_COLUMN}\" IS NULL")
}

fn id_sql() -> String {
    format!("\"{ID_COLUMN}\"")
}

/// `SELECT * FROM t`
pub fn select_all(table: &str) -> OrmResult<Statement> {
    let sql = format!("SELECT * FROM {}", table_sql(table)?);
    Ok(Statement::new(sql, ParamList::new()))
}

/// `SELECT * FROM t WHERE id = $1 AND deleted_at IS NULL`
pub fn find(table: &str, id: i64) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let sql = format!(
        "SELECT * FROM {} WHERE {} = {} AND {}",
        table_sql(table)?,
        id_sql(),
        params.push(id),
        live_rows_filter()
    );
    Ok(Statement::new(sql, params))
}

/// `INSERT INTO t (cols) VALUES ($1, ...) RETURNING *`
///
/// An empty record inserts a row of column defaults.
pub fn insert(table: &str, record: &Record) -> OrmResult<Statement> {
    let table = table_sql(table)?;
    if record.is_empty() {
        let sql = format!("INSERT INTO {table} DEFAULT VALUES RETURNING *");
        return Ok(Statement::new(sql, ParamList::new()));
    }

    let mut params = ParamList::new();
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        columns.push(Ident::new(column)?.to_sql());
        placeholders.push(params.push(value.clone()));
    }

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(Statement::new(sql, params))
}

/// `UPDATE t SET c = $1, ... WHERE id = $n RETURNING *`
pub fn update(table: &str, id: i64, record: &Record) -> OrmResult<Statement> {
    let table = table_sql(table)?;
    if record.is_empty() {
        return Err(OrmError::Other("UPDATE requires at least one SET column".into()));
    }

    let mut params = ParamList::new();
    let mut sets = Vec::with_capacity(record.len());
    for (column, value) in record.iter() {
        let column = Ident::new(column)?;
        sets.push(format!("{} = {}", column.to_sql(), params.push(value.clone())));
    }

    let sql = format!(
        "UPDATE {table} SET {} WHERE {} = {} RETURNING *",
        sets.join(", "),
        id_sql(),
        params.push(id)
    );
    Ok(Statement::new(sql, params))
}

/// `DELETE FROM t WHERE id = $1`
pub fn delete(table: &str, id: i64) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table_sql(table)?,
        id_sql(),
        params.push(id)
    );
    Ok(Statement::new(sql, params))
}

/// `UPDATE t SET deleted_at = NOW() WHERE id = $1 RETURNING *`
pub fn soft_delete(table: &str, id: i64) -> OrmResult<Statement> {
    let mut params = ParamList::new();
    let sql = format!(
        "UPDATE {} SET \"{SOFT_DELETE_COLUMN}\" = NOW() WHERE {} = {} RETURNING *",
        table_sql(table)?,
        id_sql(),
        params.push(id)
    );
    Ok(Statement::new(sql, params))
}

/// One page of live rows ordered by id.
///
/// `page` is 1-indexed; `page` and `per_page` below 1 are clamped to 1.
pub fn paginate(table: &str, page: i64, per_page: i64) -> OrmResult<Statement> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let offset = (page - 1).saturating_mul(per_page);

    let mut params = ParamList::new();
    let sql = format!(
        "SELECT * FROM {} WHERE {} ORDER BY {} ASC LIMIT {} OFFSET {}",
        table_sql(table)?,
        live_rows_filter(),
        id_sql(),
        params.push(Value::Int(per_page)),
        params.push(Value::Int(offset))
    );
    Ok(Statement::new(sql, params))
}
