use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use rusqlite::{OptionalExtension, params};

use crate::{
    config,
    domain::track::{Track, TrackKey},
    storage::{
        db,
        error::StorageError,
        schema::{columns::*, tables::*},
    },
};

/// Owns the catalogue of tracks.
///
/// The only component allowed to touch the `tracks` table. All
/// operations take `&self`, so a single instance can be shared between
/// request threads behind an `Arc`.
pub struct CatalogueStore {
    db: Mutex<rusqlite::Connection>,
}

impl CatalogueStore {
    /// opens a database connection and creates the schema when missing
    pub fn open(config: &config::Database) -> Result<Self, StorageError> {
        let db = db::open(config)?;
        match &config.path {
            Some(path) if !config.in_memory => {
                log::info!("catalogue opened at {}", path.to_string_lossy());
            }
            _ => {
                log::info!("catalogue opened in memory");
            }
        }
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Flushes and closes the underlying connection.
    pub fn close(self) -> Result<(), StorageError> {
        let conn = self
            .db
            .into_inner()
            .map_err(|_| StorageError::Internal(anyhow!("catalogue lock poisoned")))?;
        conn.close().map_err(|(_, e)| StorageError::Database(e))?;
        log::info!("catalogue closed");
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StorageError> {
        self.db
            .lock()
            .map_err(|e| StorageError::Internal(anyhow!("catalogue lock poisoned: {e}")))
    }

    /// Inserts the track unless its key is already taken.
    ///
    /// The existence check and the write are one statement, so the
    /// uniqueness of (artist, title) holds even with several connections
    /// writing to the same database file.
    pub fn add(&self, track: &Track) -> Result<(), StorageError> {
        let inserted = self.conn()?.execute(
            &format!(
                "INSERT INTO {TRACKS} ({ARTIST}, {TITLE}, {PAYLOAD}) VALUES (?1, ?2, ?3)
                 ON CONFLICT ({ARTIST}, {TITLE}) DO NOTHING"
            ),
            params![track.artist(), track.title(), track.payload],
        )?;

        if inserted == 0 {
            return Err(StorageError::Conflict(track.key.clone()));
        }
        Ok(())
    }

    pub fn get(&self, key: &TrackKey) -> Result<Track, StorageError> {
        let payload: Option<Vec<u8>> = self
            .conn()?
            .query_row(
                &format!("SELECT {PAYLOAD} FROM {TRACKS} WHERE {ARTIST} = ?1 AND {TITLE} = ?2"),
                params![key.artist, key.title],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Track {
                key: key.clone(),
                payload,
            }),
            None => Err(StorageError::TrackNotFound(key.clone())),
        }
    }

    /// keys of all tracks, oldest addition first
    pub fn list(&self) -> Result<Vec<TrackKey>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARTIST}, {TITLE} FROM {TRACKS} ORDER BY {SEQ}"
        ))?;

        let keys = stmt
            .query_map([], |row| Ok(TrackKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn delete(&self, key: &TrackKey) -> Result<(), StorageError> {
        let removed = self.conn()?.execute(
            &format!("DELETE FROM {TRACKS} WHERE {ARTIST} = ?1 AND {TITLE} = ?2"),
            params![key.artist, key.title],
        )?;

        if removed == 0 {
            return Err(StorageError::TrackNotFound(key.clone()));
        }
        Ok(())
    }

    /// removes every track, returns how many were removed
    pub fn clear(&self) -> Result<usize, StorageError> {
        Ok(self.conn()?.execute(&format!("DELETE FROM {TRACKS}"), [])?)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        let count: i64 =
            self.conn()?
                .query_row(&format!("SELECT COUNT(*) FROM {TRACKS}"), [], |row| row.get(0))?;

        usize::try_from(count).map_err(|e| {
            StorageError::Internal(anyhow!("Strange conversion error to usize after select count: {e}"))
        })
    }
}
