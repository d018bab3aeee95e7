use thiserror::Error;

use crate::domain::track::TrackKey;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("track {0} already exists")]
    Conflict(TrackKey),

    #[error("track {0} not found")]
    TrackNotFound(TrackKey),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
