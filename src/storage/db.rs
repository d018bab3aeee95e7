use std::path::Path;

use anyhow::anyhow;
use rusqlite::Connection;

use crate::{
    config::Database,
    storage::{error::StorageError, schema},
};

fn open_in_memory() -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open_in_memory()
}

fn open_from_file(path: &Path) -> Result<rusqlite::Connection, rusqlite::Error> {
    Connection::open(path)
}

/// opens the connection described by the config and makes sure the schema exists
pub fn open(config: &Database) -> Result<rusqlite::Connection, StorageError> {
    let db = if config.in_memory {
        open_in_memory()?
    } else {
        let path = config.path.as_deref().ok_or_else(|| {
            StorageError::Internal(anyhow!("database.path is required unless in_memory = true"))
        })?;
        open_from_file(path)?
    };
    db.busy_timeout(config.busy_timeout())?;
    schema::init(&db)?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::{
        config::Database,
        storage::{db::open, error::StorageError, schema},
    };

    fn table_names(db: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = db
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();

        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn open_in_memory_db_initializes_schema() {
        let db = open(&Database::in_memory()).unwrap();
        let tables = table_names(&db);

        for table in schema::tables::ALL_TABLES {
            assert!(tables.contains(&table.to_string()));
        }
    }

    #[test]
    fn open_on_disk_db_is_reopenable() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = Database::on_disk(dir.path().join("catalogue.db"));

        drop(open(&config)?);
        let db = open(&config)?;

        assert!(table_names(&db).contains(&schema::TRACKS.to_string()));
        Ok(())
    }

    #[test]
    fn open_on_disk_without_path_fails() {
        let config = Database {
            in_memory: false,
            path: None,
            busy_timeout_ms: 100,
        };

        let err = open(&config).unwrap_err();
        assert!(matches!(err, StorageError::Internal(_)));
    }
}
