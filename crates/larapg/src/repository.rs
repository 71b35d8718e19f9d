//! Generic data access bound to one allow-listed table.
//!
//! ```ignore
//! use larapg::{AllowList, Crud, Entity, Record, Repository};
//!
//! struct Product;
//! impl Entity for Product {
//!     const TABLE: &'static str = "products";
//! }
//!
//! let allow = AllowList::new(["users", "products"])?;
//! let products = Repository::of::<Product>(&client, &allow)?;
//! let created = products.create(Record::new().set("product_name", "Lamp")).await?;
//! let page = products.paginate(1, 10).await?;
//! ```

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::qb::{self, Statement};
use crate::value::Record;
use std::collections::BTreeSet;

/// The fixed set of tables the application may operate on.
///
/// Built once at startup (from config or code) and shared by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    tables: BTreeSet<String>,
}

impl AllowList {
    /// Build an allow-list; every name must be a safe identifier.
    pub fn new<I, S>(tables: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for table in tables {
            let ident = Ident::new(table.as_ref())?;
            set.insert(ident.as_str().to_string());
        }
        Ok(Self { tables: set })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    /// Resolve `table` to an identifier, failing closed when it is not listed.
    pub fn check(&self, table: &str) -> OrmResult<Ident> {
        if !self.contains(table) {
            return Err(OrmError::InvalidTable(table.to_string()));
        }
        Ident::new(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// An entity type names its table; membership in the [`AllowList`] is
/// checked when a repository is built for it.
pub trait Entity {
    const TABLE: &'static str;
}

/// The operations every repository offers.
pub trait Crud: Send + Sync {
    /// Every row, including soft-deleted ones.
    fn all(&self) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;

    /// Live row by id; `None` when missing or soft-deleted.
    fn find(&self, id: i64) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send;

    /// Insert and return the stored row.
    fn create(&self, record: Record) -> impl std::future::Future<Output = OrmResult<Record>> + Send;

    /// Update by id and return the stored row; `None` when no row matched.
    fn update(
        &self,
        id: i64,
        record: Record,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send;

    /// Hard delete; returns the number of rows removed.
    fn delete(&self, id: i64) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Stamp `deleted_at` and return the row; `None` when no row matched.
    fn soft_delete(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = OrmResult<Option<Record>>> + Send;

    /// Live rows for a 1-indexed page, ordered by id.
    fn paginate(
        &self,
        page: i64,
        per_page: i64,
    ) -> impl std::future::Future<Output = OrmResult<Vec<Record>>> + Send;
}

/// A repository bound to a client and one allow-listed table.
pub struct Repository<'c, C: GenericClient> {
    conn: &'c C,
    table: Ident,
}

impl<'c, C: GenericClient> Repository<'c, C> {
    /// Bind to `table`, which must be in `allow`.
    pub fn new(conn: &'c C, allow: &AllowList, table: &str) -> OrmResult<Self> {
        let table = allow.check(table)?;
        Ok(Self { conn, table })
    }

    /// Bind to the table of entity `E`.
    pub fn of<E: Entity>(conn: &'c C, allow: &AllowList) -> OrmResult<Self> {
        Self::new(conn, allow, E::TABLE)
    }

    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    fn log(&self, op: &'static str, stmt: &Statement) {
        tracing::debug!(
            target: "larapg.sql",
            table = %self.table,
            op,
            param_count = stmt.params.len(),
            sql = %stmt.sql,
        );
    }

    async fn fetch_all(&self, op: &'static str, stmt: Statement) -> OrmResult<Vec<Record>> {
        self.log(op, &stmt);
        let rows = self.conn.query(&stmt.sql, &stmt.params_ref()).await?;
        rows.iter().map(Record::from_row).collect()
    }

    async fn fetch_opt(&self, op: &'static str, stmt: Statement) -> OrmResult<Option<Record>> {
        self.log(op, &stmt);
        let row = self.conn.query_opt(&stmt.sql, &stmt.params_ref()).await?;
        row.as_ref().map(Record::from_row).transpose()
    }
}

impl<C: GenericClient> Crud for Repository<'_, C> {
    async fn all(&self) -> OrmResult<Vec<Record>> {
        let stmt = qb::select_all(self.table())?;
        self.fetch_all("all", stmt).await
    }

    async fn find(&self, id: i64) -> OrmResult<Option<Record>> {
        let stmt = qb::find(self.table(), id)?;
        self.fetch_opt("find", stmt).await
    }

    async fn create(&self, record: Record) -> OrmResult<Record> {
        let stmt = qb::insert(self.table(), &record)?;
        self.fetch_opt("create", stmt).await?.ok_or_else(|| {
            OrmError::Other(format!("INSERT INTO {} returned no row", self.table))
        })
    }

    async fn update(&self, id: i64, record: Record) -> OrmResult<Option<Record>> {
        let stmt = qb::update(self.table(), id, &record)?;
        self.fetch_opt("update", stmt).await
    }

    async fn delete(&self, id: i64) -> OrmResult<u64> {
        let stmt = qb::delete(self.table(), id)?;
        self.log("delete", &stmt);
        self.conn.execute(&stmt.sql, &stmt.params_ref()).await
    }

    async fn soft_delete(&self, id: i64) -> OrmResult<Option<Record>> {
        let stmt = qb::soft_delete(self.table(), id)?;
        self.fetch_opt("soft_delete", stmt).await
    }

    async fn paginate(&self, page: i64, per_page: i64) -> OrmResult<Vec<Record>> {
        let stmt = qb::paginate(self.table(), page, per_page)?;
        self.fetch_all("paginate", stmt).await
    }
}
