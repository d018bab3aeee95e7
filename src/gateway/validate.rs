//! Boundary checks on request bodies.
//!
//! Each request shape is checked once here and turned into domain values,
//! so nothing malformed ever reaches the store or the provider. Binary
//! fields are base64 decoded exactly once, here.

use std::fmt::Display;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::track::{Track, TrackKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Artist,
    Title,
    Payload,
    EncodedFragment,
}

impl Field {
    /// name of the member in the JSON body
    pub fn key(self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::Title => "title",
            Field::Payload => "payload",
            Field::EncodedFragment => "encoded_fragment",
        }
    }

    /// older clients send the song as `encoded_song`
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Payload => &["encoded_song"],
            _ => &[],
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Field::Artist => "Artist",
            Field::Title => "Title",
            Field::Payload => "Payload",
            Field::EncodedFragment => "Encoded fragment",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No data provided")]
    NoData,

    #[error("{0} is required")]
    Missing(Field),

    #[error("{0} must be a string")]
    WrongType(Field),

    #[error("{0} must not be empty")]
    Empty(Field),

    #[error("Invalid content format: {0} must be Base64 encoded string")]
    InvalidEncoding(Field),
}

impl ValidationError {
    pub fn field(&self) -> Option<Field> {
        match self {
            ValidationError::NoData => None,
            ValidationError::Missing(f)
            | ValidationError::WrongType(f)
            | ValidationError::Empty(f)
            | ValidationError::InvalidEncoding(f) => Some(*f),
        }
    }
}

fn object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    match body.as_object() {
        Some(map) if !map.is_empty() => Ok(map),
        _ => Err(ValidationError::NoData),
    }
}

fn string_field<'a>(map: &'a Map<String, Value>, field: Field) -> Result<&'a str, ValidationError> {
    let value = std::iter::once(field.key())
        .chain(field.aliases().iter().copied())
        .find_map(|key| map.get(key))
        .ok_or(ValidationError::Missing(field))?;

    value.as_str().ok_or(ValidationError::WrongType(field))
}

fn text_field(map: &Map<String, Value>, field: Field) -> Result<String, ValidationError> {
    let text = string_field(map, field)?;
    if text.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(text.to_string())
}

fn binary_field(map: &Map<String, Value>, field: Field) -> Result<Vec<u8>, ValidationError> {
    let encoded = string_field(map, field)?;
    STANDARD
        .decode(encoded)
        .map_err(|_| ValidationError::InvalidEncoding(field))
}

/// `{artist, title, payload}`
pub fn add_track(body: &Value) -> Result<Track, ValidationError> {
    let map = object(body)?;
    let artist = text_field(map, Field::Artist)?;
    let title = text_field(map, Field::Title)?;
    let payload = binary_field(map, Field::Payload)?;
    Ok(Track::new(artist, title, payload))
}

/// `{artist, title}`
pub fn track_key(body: &Value) -> Result<TrackKey, ValidationError> {
    let map = object(body)?;
    let artist = text_field(map, Field::Artist)?;
    let title = text_field(map, Field::Title)?;
    Ok(TrackKey::new(artist, title))
}

/// `{encoded_fragment}`, returns the decoded fragment
pub fn identify(body: &Value) -> Result<Vec<u8>, ValidationError> {
    let map = object(body)?;
    let fragment = binary_field(map, Field::EncodedFragment)?;
    if fragment.is_empty() {
        return Err(ValidationError::Empty(Field::EncodedFragment));
    }
    Ok(fragment)
}
