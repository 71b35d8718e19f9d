//! Convenient imports for typical `larapg` usage.
//!
//! ```ignore
//! use larapg::prelude::*;
//! ```

pub use crate::{
    AllowList, Config, Crud, Entity, GenericClient, Input, OrmError, OrmResult, Record,
    Repository, RuleSet, UploadedFile, Value, validate,
};

pub use crate::{Migration, MigrationRegistry, MigrationRunner, SqlMigration};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_from};
