use anyhow::Context;
use larapg::Config;
use std::path::Path;

/// Load the config file if it exists; generators work without one.
pub fn load_optional_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!(config = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// `--database` wins over the config file and `DB_*` variables.
pub fn resolve_database(config: &Config, database: Option<String>) -> anyhow::Result<String> {
    if let Some(v) = database.filter(|v| !v.trim().is_empty()) {
        return Ok(v);
    }
    config
        .database_url()
        .context("database connection is required: pass --database, set database.url or DATABASE_URL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let cfg = load_optional_config(Path::new("/definitely/not/here/larapg.toml")).unwrap();
        assert_eq!(cfg.migrations.dir, "database/migrations");
    }

    #[test]
    fn database_flag_overrides_config() {
        let mut cfg = Config::default();
        cfg.database.url = "postgres://from-config/db".to_string();
        let url = resolve_database(&cfg, Some("postgres://from-flag/db".to_string())).unwrap();
        assert_eq!(url, "postgres://from-flag/db");

        let url = resolve_database(&cfg, None).unwrap();
        assert_eq!(url, "postgres://from-config/db");
    }
}
