//! # larapg
//!
//! The persistence backbone of a small PostgreSQL web application:
//!
//! - **Validation**: declarative per-field rules (`required|min:3|email`) that
//!   yield either a sanitized [`Record`] or a 422 error with field messages
//! - **Query builder**: pure functions producing parameterized [`Statement`]s;
//!   values are always bound, never spliced into SQL
//! - **Repository**: CRUD, soft delete and pagination bound to one table from
//!   an explicit [`AllowList`]
//! - **Migrations**: an ordered [`MigrationRegistry`] applied by a
//!   [`MigrationRunner`] (`migrate`, `fresh`, `rollback`)
//!
//! ## Request flow
//!
//! ```ignore
//! use larapg::prelude::*;
//!
//! let rules = RuleSet::parse([
//!     ("product_name", "required|string|min:3|max:255"),
//!     ("product_price", "required|numeric"),
//!     ("product_image", "required|image"),
//! ])?;
//! let data = rules.validate(&input)?;
//!
//! let products = Repository::new(&client, &allow, "products")?;
//! let created = products.create(data).await?;
//! let page = products.paginate(1, 10).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ident;
pub mod migrate;
pub mod prelude;
pub mod qb;
pub mod repository;
pub mod validate;
pub mod value;

pub use client::GenericClient;
pub use config::Config;
pub use error::{OrmError, OrmResult};
pub use ident::Ident;
pub use migrate::{
    Migration, MigrationRegistry, MigrationReport, MigrationRunner, MigrationState,
    SchemaExecutor, SqlMigration,
};
pub use qb::Statement;
pub use repository::{AllowList, Crud, Entity, Repository};
pub use validate::{Input, RuleSet, UploadedFile, ValidationErrors, validate};
pub use value::{Record, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_from, create_pool_with_config};
