use rusqlite::Connection;

pub mod tables {
    pub const TRACKS: &str = "tracks";

    pub const ALL_TABLES: &[&str] = &[TRACKS];
}

pub mod columns {
    pub const SEQ: &str = "seq";
    pub const ARTIST: &str = "artist";
    pub const TITLE: &str = "title";
    pub const PAYLOAD: &str = "payload";
}

pub use columns::*;
pub use tables::*;

// `seq` keeps insertion order; AUTOINCREMENT never hands out a used value twice
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    artist TEXT NOT NULL,
    title TEXT NOT NULL,
    payload BLOB NOT NULL,
    UNIQUE (artist, title)
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
