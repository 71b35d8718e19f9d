use crate::cli::{MakeMigrationArgs, MakeModelArgs};
use crate::settings::load_optional_config;
use anyhow::Context;
use chrono::Utc;
use heck::{ToSnakeCase, ToUpperCamelCase};
use larapg::{Ident, MigrationRegistry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub fn run_model(args: MakeModelArgs) -> anyhow::Result<()> {
    let cfg = load_optional_config(&args.config)?;
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| cfg.models_dir());

    let model = ModelNames::new(&args.name)?;
    let path = write_model(&dir, &model)?;
    println!("created {}", path.display());

    if args.migration {
        let migrations_dir = cfg.migrations_dir();
        for path in write_migration(&migrations_dir, &format!("create_{}_table", model.table))? {
            println!("created {}", path.display());
        }
    }

    if !cfg.tables.allow.iter().any(|t| t == &model.table) {
        println!(
            "note: add \"{}\" to [tables] allow in {} before using the repository",
            model.table,
            args.config.display()
        );
    }
    Ok(())
}

pub fn run_migration(args: MakeMigrationArgs) -> anyhow::Result<()> {
    let cfg = load_optional_config(&args.config)?;
    let dir = args.dir.clone().unwrap_or_else(|| cfg.migrations_dir());
    for path in write_migration(&dir, &args.name)? {
        println!("created {}", path.display());
    }
    Ok(())
}

/// Names derived from a model name such as `ProductCategory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNames {
    /// `ProductCategory`
    pub type_name: String,
    /// `product_category`
    pub module: String,
    /// `product_categories`
    pub table: String,
}

impl ModelNames {
    pub fn new(name: &str) -> anyhow::Result<Self> {
        let module = normalize_name(name)?;
        if module.starts_with(|c: char| c.is_ascii_digit()) {
            anyhow::bail!("model name must not start with a digit: {name}");
        }
        let table = pluralize(&module);
        Ident::new(&table).with_context(|| format!("invalid table name derived from {name}"))?;
        Ok(Self {
            type_name: module.to_upper_camel_case(),
            module,
            table,
        })
    }
}

pub fn normalize_name(name: &str) -> anyhow::Result<String> {
    let mut s = name
        .to_snake_case()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    while s.contains("__") {
        s = s.replace("__", "_");
    }
    let s = s.trim_matches('_').to_string();
    if s.is_empty() {
        anyhow::bail!("name becomes empty after normalization: {name:?}");
    }
    Ok(s)
}

/// Naive English plural for table names.
pub fn pluralize(word: &str) -> String {
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// `create_widgets_table` → `widgets`.
pub fn table_for_migration(name: &str) -> &str {
    let name = name.strip_prefix("create_").unwrap_or(name);
    name.strip_suffix("_table")
        .filter(|t| !t.is_empty())
        .unwrap_or(name)
}

fn current_version() -> anyhow::Result<i64> {
    Utc::now()
        .format("%Y%m%d%H%M%S")
        .to_string()
        .parse::<i64>()
        .context("failed to create migration version")
}

fn existing_versions(dir: &Path) -> anyhow::Result<HashSet<i64>> {
    if !dir.exists() {
        return Ok(HashSet::new());
    }
    let registry = MigrationRegistry::from_dir(dir)
        .with_context(|| format!("failed to read existing migrations in {}", dir.display()))?;
    Ok(registry.versions().into_iter().collect())
}

pub fn migration_templates(table: &Ident) -> (String, String) {
    let t = table.to_sql();
    let up = format!(
        "\
CREATE TABLE IF NOT EXISTS {t} (
    id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMP NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMP NULL
);
"
    );
    let down = format!("DROP TABLE IF EXISTS {t};\n");
    (up, down)
}

/// Write `<version>_<name>.up.sql` and `.down.sql`; returns both paths.
pub fn write_migration(dir: &Path, name: &str) -> anyhow::Result<Vec<PathBuf>> {
    let name = normalize_name(name)?;
    let table = Ident::new(table_for_migration(&name))
        .with_context(|| format!("cannot derive a table name from migration {name:?}"))?;

    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let used = existing_versions(dir)?;
    let mut version = current_version()?;
    while used.contains(&version) {
        version += 1;
    }

    let base = format!("{version}_{name}");
    let up_path = dir.join(format!("{base}.up.sql"));
    let down_path = dir.join(format!("{base}.down.sql"));
    for path in [&up_path, &down_path] {
        if path.exists() {
            anyhow::bail!("refusing to overwrite existing file: {}", path.display());
        }
    }

    let (up, down) = migration_templates(&table);
    let header = format!(
        "-- Migration: {base}\n-- Created at: {} UTC\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    );
    std::fs::write(&up_path, format!("{header}{up}"))
        .with_context(|| format!("failed to write {}", up_path.display()))?;
    std::fs::write(&down_path, format!("{header}{down}"))
        .with_context(|| format!("failed to write {}", down_path.display()))?;

    Ok(vec![up_path, down_path])
}

pub fn model_template(model: &ModelNames) -> String {
    format!(
        "\
//! `{ty}` model backed by the `{table}` table.

use larapg::Entity;

pub struct {ty};

impl Entity for {ty} {{
    const TABLE: &'static str = \"{table}\";
}}
",
        ty = model.type_name,
        table = model.table,
    )
}

fn write_model(dir: &Path, model: &ModelNames) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.rs", model.module));
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }
    std::fs::write(&path, model_template(model))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir(tag: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("lara-make-{tag}-{nonce}"));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn model_names() {
        let m = ModelNames::new("ProductCategory").unwrap();
        assert_eq!(m.type_name, "ProductCategory");
        assert_eq!(m.module, "product_category");
        assert_eq!(m.table, "product_categories");

        assert_eq!(ModelNames::new("user").unwrap().table, "users");
        assert_eq!(ModelNames::new("Box").unwrap().table, "boxes");
        assert_eq!(ModelNames::new("Day").unwrap().table, "days");
        assert!(ModelNames::new("--").is_err());
        assert!(ModelNames::new("9lives").is_err());
    }

    #[test]
    fn table_names_from_migration_names() {
        assert_eq!(table_for_migration("create_widgets_table"), "widgets");
        assert_eq!(table_for_migration("create_users"), "users");
        assert_eq!(table_for_migration("widgets"), "widgets");
        assert_eq!(table_for_migration("create__table"), "_table");
    }

    #[test]
    fn migration_template_is_existence_guarded() {
        let (up, down) = migration_templates(&Ident::new("widgets").unwrap());
        assert!(up.starts_with(r#"CREATE TABLE IF NOT EXISTS "widgets" ("#));
        assert!(up.contains("id BIGSERIAL PRIMARY KEY"));
        assert!(up.contains("created_at TIMESTAMP"));
        assert!(up.contains("deleted_at TIMESTAMP NULL"));
        assert_eq!(down, "DROP TABLE IF EXISTS \"widgets\";\n");
    }

    #[test]
    fn write_migration_creates_loadable_pair() {
        let dir = make_temp_dir("migration");
        let first = write_migration(&dir, "CreateWidgetsTable").unwrap();
        let second = write_migration(&dir, "create_gadgets_table").unwrap();
        assert_eq!(first.len(), 2);
        assert!(first[0].to_string_lossy().ends_with("_create_widgets_table.up.sql"));

        let registry = MigrationRegistry::from_dir(&dir).unwrap();
        assert_eq!(registry.len(), 2);
        let versions = registry.versions();
        assert!(versions[0] < versions[1], "second migration gets a later version");
        assert!(second[1].exists());

        std::fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn write_migration_rejects_unreadable_migrations_dir() {
        let dir = make_temp_dir("broken");
        std::fs::write(dir.join("20240101000000_orphan.down.sql"), "SELECT 1;").unwrap();

        let err = write_migration(&dir, "create_widgets_table").unwrap_err();
        assert!(format!("{err:#}").contains("failed to read existing migrations"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        std::fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn write_model_refuses_overwrite() {
        let dir = make_temp_dir("model");
        let model = ModelNames::new("Product").unwrap();

        let path = write_model(&dir, &model).unwrap();
        let src = std::fs::read_to_string(&path).unwrap();
        assert!(src.contains("pub struct Product;"));
        assert!(src.contains("const TABLE: &'static str = \"products\";"));

        assert!(write_model(&dir, &model).is_err());
        std::fs::remove_dir_all(dir).expect("cleanup");
    }
}
