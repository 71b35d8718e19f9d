//! Project configuration (`larapg.toml`).
//!
//! ```toml
//! version = "1"
//!
//! [database]
//! url = "${DATABASE_URL}"
//! schema = "public"
//! max_connections = 16
//!
//! [migrations]
//! dir = "database/migrations"
//!
//! [models]
//! dir = "src/models"
//!
//! [tables]
//! allow = ["users", "products"]
//! ```
//!
//! `${VAR}` references are expanded from the environment after `.env` is
//! loaded. When `database.url` is empty the connection is assembled from
//! `DB_HOST`, `DB_PORT`, `DATABASE`, `DB_USER` and `DB_PASSWORD`.

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::repository::AllowList;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "larapg.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub migrations: MigrationsConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub tables: TablesConfig,

    /// Directory relative paths resolve against (the config file's directory).
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            schema: default_schema(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
        }
    }
}

fn default_migrations_dir() -> String {
    "database/migrations".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
        }
    }
}

fn default_models_dir() -> String {
    "src/models".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablesConfig {
    #[serde(default)]
    pub allow: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            database: DatabaseConfig::default(),
            migrations: MigrationsConfig::default(),
            models: ModelsConfig::default(),
            tables: TablesConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Read, expand and validate a config file. Loads `.env` first.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let mut config =
            Self::from_toml(&raw, |key| std::env::var(key).ok()).map_err(|e| match e {
                OrmError::Config(msg) => OrmError::config(format!("{}: {msg}", path.display())),
                other => other,
            })?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        Ok(config)
    }

    /// Parse config text, expanding `${VAR}` with `lookup`.
    pub fn from_toml(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let mut config: Self = toml::from_str(raw)
            .map_err(|e| OrmError::config(format!("failed to parse config: {e}")))?;
        config.expand_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn expand_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> OrmResult<()> {
        self.database.url = expand_env_vars(&self.database.url, lookup)?;
        self.database.schema = expand_env_vars(&self.database.schema, lookup)?;
        self.migrations.dir = expand_env_vars(&self.migrations.dir, lookup)?;
        self.models.dir = expand_env_vars(&self.models.dir, lookup)?;
        Ok(())
    }

    fn validate(&self) -> OrmResult<()> {
        if self.version.trim() != "1" {
            return Err(OrmError::config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        Ident::new(&self.database.schema)
            .map_err(|e| OrmError::config(format!("database.schema: {e}")))?;
        if self.database.max_connections == 0 {
            return Err(OrmError::config("database.max_connections must be > 0"));
        }
        if self.migrations.dir.trim().is_empty() {
            return Err(OrmError::config("migrations.dir must not be empty"));
        }
        if self.models.dir.trim().is_empty() {
            return Err(OrmError::config("models.dir must not be empty"));
        }
        self.allow_list()
            .map_err(|e| OrmError::config(format!("tables.allow: {e}")))?;
        Ok(())
    }

    /// Connection string: `database.url`, or one assembled from `DB_*` variables.
    pub fn database_url(&self) -> OrmResult<String> {
        dotenvy::dotenv().ok();
        self.database_url_with(|key| std::env::var(key).ok())
    }

    pub fn database_url_with(&self, lookup: impl Fn(&str) -> Option<String>) -> OrmResult<String> {
        if !self.database.url.trim().is_empty() {
            return Ok(self.database.url.trim().to_string());
        }

        let Some(dbname) = lookup("DATABASE").filter(|s| !s.is_empty()) else {
            return Err(OrmError::config(
                "no database configured: set database.url, DATABASE_URL or DATABASE/DB_* variables",
            ));
        };

        let mut parts = vec![
            format!("host={}", quote_conn_value(&lookup("DB_HOST").unwrap_or_else(|| "localhost".into()))),
            format!("port={}", quote_conn_value(&lookup("DB_PORT").unwrap_or_else(|| "5432".into()))),
            format!("dbname={}", quote_conn_value(&dbname)),
        ];
        if let Some(user) = lookup("DB_USER").filter(|s| !s.is_empty()) {
            parts.push(format!("user={}", quote_conn_value(&user)));
        }
        if let Some(password) = lookup("DB_PASSWORD").filter(|s| !s.is_empty()) {
            parts.push(format!("password={}", quote_conn_value(&password)));
        }
        Ok(parts.join(" "))
    }

    pub fn allow_list(&self) -> OrmResult<AllowList> {
        AllowList::new(&self.tables.allow)
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.resolve_path(&self.migrations.dir)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.resolve_path(&self.models.dir)
    }
}

/// Quote a libpq key/value connection parameter.
fn quote_conn_value(v: &str) -> String {
    if !v.is_empty() && !v.contains([' ', '\'', '\\']) {
        return v.to_string();
    }
    format!("'{}'", v.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn expand_env_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> OrmResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(OrmError::config(format!(
                    "unterminated env var reference: ${{{key}}}"
                )));
            }
            if key.is_empty() {
                return Err(OrmError::config("invalid env var reference: ${}"));
            }

            let v = lookup(&key).ok_or_else(|| {
                OrmError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn full_config_with_expansion() {
        let raw = r#"
version = "1"

[database]
url = "${DATABASE_URL}"
max_connections = 4

[migrations]
dir = "db/${APP}/migrations"

[tables]
allow = ["users", "products"]
"#;
        let config = Config::from_toml(
            raw,
            env(&[("DATABASE_URL", "postgres://localhost/app"), ("APP", "shop")]),
        )
        .unwrap();

        assert_eq!(config.database.url, "postgres://localhost/app");
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.migrations.dir, "db/shop/migrations");
        assert_eq!(config.models.dir, "src/models");

        let allow = config.allow_list().unwrap();
        assert!(allow.contains("products"));
        assert!(!allow.contains("accounts"));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml("version = \"1\"", env(&[])).unwrap();
        assert_eq!(config.migrations.dir, "database/migrations");
        assert!(config.allow_list().unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(Config::from_toml("version = \"2\"", env(&[])).is_err());
        assert!(Config::from_toml("version = \"1\"\n[tables]\nallow = [\"bad name\"]", env(&[])).is_err());
        assert!(
            Config::from_toml("version = \"1\"\n[database]\nmax_connections = 0", env(&[])).is_err()
        );
        assert!(Config::from_toml("version = \"1\"\n[database]\nurl = \"${NOPE}\"", env(&[])).is_err());
        assert!(Config::from_toml("version = \"1\"\n[database]\nurl = \"${OPEN\"", env(&[])).is_err());
        assert!(Config::from_toml("version = \"1\"\nextra = true", env(&[])).is_err());
    }

    #[test]
    fn database_url_falls_back_to_db_variables() {
        let config = Config::default();
        let url = config
            .database_url_with(env(&[
                ("DB_HOST", "db.internal"),
                ("DATABASE", "shop"),
                ("DB_USER", "app"),
                ("DB_PASSWORD", "it's secret"),
            ]))
            .unwrap();
        assert_eq!(
            url,
            r"host=db.internal port=5432 dbname=shop user=app password='it\'s secret'"
        );

        assert!(config.database_url_with(env(&[])).is_err());
    }

    #[test]
    fn explicit_url_wins() {
        let mut config = Config::default();
        config.database.url = "postgres://u@h/db".to_string();
        let url = config.database_url_with(env(&[("DATABASE", "other")])).unwrap();
        assert_eq!(url, "postgres://u@h/db");
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = Config::default();
        config.base_dir = PathBuf::from("/srv/app");
        assert_eq!(config.migrations_dir(), PathBuf::from("/srv/app/database/migrations"));
        assert_eq!(config.resolve_path("/abs"), PathBuf::from("/abs"));
    }
}
