use super::{Migration, SqlMigration};
use crate::error::{OrmError, OrmResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Every migration the program knows, ordered by version.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<i64, Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a migration. Versions must be unique.
    pub fn register(&mut self, migration: impl Migration + 'static) -> OrmResult<()> {
        let version = migration.version();
        if let Some(existing) = self.migrations.get(&version) {
            return Err(OrmError::config(format!(
                "duplicate migration version {version}: '{}' vs '{}'",
                existing.name(),
                migration.name()
            )));
        }
        self.migrations.insert(version, Box::new(migration));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, migration: impl Migration + 'static) -> OrmResult<Self> {
        self.register(migration)?;
        Ok(self)
    }

    /// Load SQL migrations from a directory.
    ///
    /// Recognized file names:
    /// - `20261019120000_create_users_table.up.sql` (up)
    /// - `20261019120000_create_users_table.down.sql` (down, optional)
    /// - `001_seed.sql` (up)
    ///
    /// Other files are ignored. A down script without an up script is an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> OrmResult<Self> {
        let mut registry = Self::new();
        for file in scan_dir(dir.as_ref())? {
            let up_sql = read_script(&file.up_path)?;
            let mut migration = SqlMigration::new(file.version, file.name, up_sql);
            if let Some(down_path) = &file.down_path {
                migration = migration.with_down(read_script(down_path)?);
            }
            registry.register(migration)?;
        }
        Ok(registry)
    }

    /// Ascending version order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &dyn Migration> {
        self.migrations.values().map(|m| &**m as &dyn Migration)
    }

    pub fn versions(&self) -> Vec<i64> {
        self.migrations.keys().copied().collect()
    }

    pub fn get(&self, version: i64) -> Option<&dyn Migration> {
        self.migrations.get(&version).map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Up,
    Down,
}

#[derive(Debug)]
struct DiskMigration {
    version: i64,
    name: String,
    up_path: PathBuf,
    down_path: Option<PathBuf>,
}

#[derive(Debug)]
struct PartialDiskMigration {
    name: String,
    up_path: Option<PathBuf>,
    down_path: Option<PathBuf>,
}

fn parse_file_name(file_name: &str) -> Option<(i64, String, FileKind)> {
    let (stem, kind) = if let Some(stem) = file_name.strip_suffix(".down.sql") {
        (stem, FileKind::Down)
    } else if let Some(stem) = file_name.strip_suffix(".up.sql") {
        (stem, FileKind::Up)
    } else {
        (file_name.strip_suffix(".sql")?, FileKind::Up)
    };

    let (version, name) = stem.split_once('_')?;
    if name.is_empty() || version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version = version.parse::<i64>().ok()?;
    Some((version, name.to_string(), kind))
}

fn scan_dir(dir: &Path) -> OrmResult<Vec<DiskMigration>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        OrmError::config(format!(
            "failed to read migrations dir {}: {e}",
            dir.display()
        ))
    })?;

    let mut by_version: BTreeMap<i64, PartialDiskMigration> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| {
            OrmError::config(format!("failed to read entry in {}: {e}", dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((version, name, kind)) = parse_file_name(file_name) else {
            tracing::debug!(target: "larapg.migrate", file = file_name, "skipping non-migration file");
            continue;
        };

        let slot = by_version
            .entry(version)
            .or_insert_with(|| PartialDiskMigration {
                name: name.clone(),
                up_path: None,
                down_path: None,
            });

        if slot.name != name {
            return Err(OrmError::config(format!(
                "conflicting migration names for version {version}: '{}' vs '{}'",
                slot.name, name
            )));
        }

        let target = match kind {
            FileKind::Up => &mut slot.up_path,
            FileKind::Down => &mut slot.down_path,
        };
        if target.is_some() {
            return Err(OrmError::config(format!(
                "duplicate {} script for migration version {version}",
                if kind == FileKind::Up { "up" } else { "down" }
            )));
        }
        *target = Some(path);
    }

    let mut out = Vec::with_capacity(by_version.len());
    for (version, partial) in by_version {
        let Some(up_path) = partial.up_path else {
            return Err(OrmError::config(format!(
                "migration {version}_{} has a down script but no up script",
                partial.name
            )));
        };
        out.push(DiskMigration {
            version,
            name: partial.name,
            up_path,
            down_path: partial.down_path,
        });
    }
    Ok(out)
}

fn read_script(path: &Path) -> OrmResult<String> {
    fs::read_to_string(path)
        .map_err(|e| OrmError::config(format!("failed to read migration {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_temp_dir() -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("larapg-registry-test-{nonce}"));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn parse_file_name_variants() {
        assert_eq!(
            parse_file_name("20261019120000_create_users_table.up.sql"),
            Some((20261019120000, "create_users_table".to_string(), FileKind::Up))
        );
        assert_eq!(
            parse_file_name("002_products.down.sql"),
            Some((2, "products".to_string(), FileKind::Down))
        );
        assert_eq!(
            parse_file_name("3_seed.sql"),
            Some((3, "seed".to_string(), FileKind::Up))
        );
        assert!(parse_file_name("README.md").is_none());
        assert!(parse_file_name("v1_init.sql").is_none());
        assert!(parse_file_name("001_.up.sql").is_none());
        assert!(parse_file_name("001.up.sql").is_none());
    }

    #[test]
    fn from_dir_orders_by_version_not_name() {
        let dir = make_temp_dir();
        fs::write(dir.join("10_c.up.sql"), "SELECT 10;").expect("write");
        fs::write(dir.join("9_b.up.sql"), "SELECT 9;").expect("write");
        fs::write(dir.join("9_b.down.sql"), "SELECT -9;").expect("write");
        fs::write(dir.join("1_a.up.sql"), "SELECT 1;").expect("write");
        fs::write(dir.join("notes.txt"), "ignored").expect("write");

        let registry = MigrationRegistry::from_dir(&dir).expect("load");
        assert_eq!(registry.versions(), vec![1, 9, 10]);
        assert_eq!(registry.get(9).map(|m| m.name()), Some("b"));

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn from_dir_rejects_down_without_up() {
        let dir = make_temp_dir();
        fs::write(dir.join("3_x.down.sql"), "DROP TABLE x;").expect("write");

        let err = MigrationRegistry::from_dir(&dir).expect_err("must fail");
        assert!(err.to_string().contains("no up script"));

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn from_dir_rejects_conflicting_names() {
        let dir = make_temp_dir();
        fs::write(dir.join("4_users.up.sql"), "SELECT 1;").expect("write");
        fs::write(dir.join("4_accounts.down.sql"), "SELECT 1;").expect("write");

        assert!(MigrationRegistry::from_dir(&dir).is_err());

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn from_missing_dir_is_an_error() {
        let dir = std::env::temp_dir().join("larapg-registry-test-does-not-exist");
        assert!(MigrationRegistry::from_dir(dir).is_err());
    }

    #[test]
    fn register_rejects_duplicate_versions() {
        let mut registry = MigrationRegistry::new();
        registry
            .register(SqlMigration::new(1, "a", "SELECT 1"))
            .expect("first");
        let err = registry
            .register(SqlMigration::new(1, "b", "SELECT 1"))
            .expect_err("duplicate");
        assert!(err.to_string().contains("duplicate migration version 1"));
        assert_eq!(registry.len(), 1);
    }
}
