use std::fmt::Display;

/// Identifies a track in the catalogue.
///
/// Matching is exact and case-sensitive on both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey {
    pub artist: String,
    pub title: String,
}

impl TrackKey {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl Display for TrackKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' by '{}'", self.title, self.artist)
    }
}

/// Represent a music track stored in the catalogue.
///
/// `payload` is the raw audio file, never inspected here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub key: TrackKey,
    pub payload: Vec<u8>,
}

impl Track {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: TrackKey::new(artist, title),
            payload,
        }
    }

    pub fn artist(&self) -> &str {
        &self.key.artist
    }

    pub fn title(&self) -> &str {
        &self.key.title
    }
}
