//! Orchestration of the user facing flows.
//!
//! Identification is a short, linear state machine:
//! `Validating -> Identifying -> LookingUp -> Done`. Every stage either
//! advances or finishes with a specific [`GatewayError`]; nothing is retried
//! and nothing is written, so an abandoned flow leaves no state behind.
//!
//! Catalogue management is one validation step followed by exactly one
//! store call.

use std::fmt::Display;

use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::track::{Track, TrackKey},
    identify::{IdentificationApi, IdentifyOutcome, ProviderStatus},
    storage::{catalogue::CatalogueStore, error::StorageError},
};

pub mod validate;

use validate::ValidationError;

/// Step of a flow, attached to collaborator failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Identifying,
    LookingUp,
    Adding,
    Deleting,
    Listing,
    Clearing,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Identifying => "identifying",
            Stage::LookingUp => "looking up",
            Stage::Adding => "adding",
            Stage::Deleting => "deleting",
            Stage::Listing => "listing",
            Stage::Clearing => "clearing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Track already exists")]
    Conflict(TrackKey),

    #[error("Track not found")]
    TrackNotFound(TrackKey),

    /// provider does not know the fragment
    #[error("No match found for fragment")]
    NoMatch,

    /// provider knows the song but it was never added here
    #[error("Track not found in catalogue")]
    NotInCatalogue(TrackKey),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Failed to identify music: provider error while {stage}")]
    Upstream { stage: Stage, status: ProviderStatus },

    #[error("Catalogue failure while {stage}")]
    Internal {
        stage: Stage,
        #[source]
        source: StorageError,
    },
}

impl GatewayError {
    fn from_storage(stage: Stage, err: StorageError) -> Self {
        match err {
            StorageError::Conflict(key) => GatewayError::Conflict(key),
            StorageError::TrackNotFound(key) => GatewayError::TrackNotFound(key),
            source => GatewayError::Internal { stage, source },
        }
    }
}

enum IdentifyState<'a> {
    Validating(&'a Value),
    Identifying(Vec<u8>),
    LookingUp(TrackKey),
    Done(Result<Track, GatewayError>),
}

impl IdentifyState<'_> {
    fn stage(&self) -> Option<Stage> {
        match self {
            IdentifyState::Validating(_) => Some(Stage::Validating),
            IdentifyState::Identifying(_) => Some(Stage::Identifying),
            IdentifyState::LookingUp(_) => Some(Stage::LookingUp),
            IdentifyState::Done(_) => None,
        }
    }
}

pub struct Gateway {
    store: CatalogueStore,
    identifier: Box<dyn IdentificationApi>,
}

impl Gateway {
    pub fn new(store: CatalogueStore, identifier: Box<dyn IdentificationApi>) -> Self {
        Self { store, identifier }
    }

    /// closes the catalogue, consuming the gateway
    pub fn shutdown(self) -> Result<(), StorageError> {
        self.store.close()
    }

    /// Identify flow for a raw `{encoded_fragment}` body
    pub fn identify(&self, body: &Value) -> Result<Track, GatewayError> {
        self.run_identify(IdentifyState::Validating(body))
    }

    /// Identify flow for an already decoded fragment
    pub fn identify_fragment(&self, fragment: Vec<u8>) -> Result<Track, GatewayError> {
        if fragment.is_empty() {
            return Err(ValidationError::Empty(validate::Field::EncodedFragment).into());
        }
        self.run_identify(IdentifyState::Identifying(fragment))
    }

    fn run_identify(&self, mut state: IdentifyState<'_>) -> Result<Track, GatewayError> {
        loop {
            state = match state {
                IdentifyState::Done(result) => {
                    if let Err(e) = &result {
                        log::debug!("identify finished: {e}");
                    }
                    return result;
                }
                state => {
                    if let Some(stage) = state.stage() {
                        log::debug!("identify: {stage}");
                    }
                    self.step(state)
                }
            }
        }
    }

    fn step<'a>(&self, state: IdentifyState<'a>) -> IdentifyState<'a> {
        match state {
            IdentifyState::Validating(body) => match validate::identify(body) {
                Ok(fragment) => IdentifyState::Identifying(fragment),
                Err(e) => IdentifyState::Done(Err(e.into())),
            },

            IdentifyState::Identifying(fragment) => match self.identifier.identify(&fragment) {
                IdentifyOutcome::Match(key) => IdentifyState::LookingUp(key),
                IdentifyOutcome::NoMatch => IdentifyState::Done(Err(GatewayError::NoMatch)),
                IdentifyOutcome::RateLimited => {
                    log::warn!("fingerprinting provider is throttling requests");
                    IdentifyState::Done(Err(GatewayError::RateLimited))
                }
                IdentifyOutcome::ProviderError(status) => {
                    log::warn!(
                        "fingerprinting provider failed: {status} {}",
                        status.detail().unwrap_or_default()
                    );
                    IdentifyState::Done(Err(GatewayError::Upstream {
                        stage: Stage::Identifying,
                        status,
                    }))
                }
            },

            IdentifyState::LookingUp(key) => IdentifyState::Done(match self.store.get(&key) {
                Ok(track) => Ok(track),
                Err(StorageError::TrackNotFound(key)) => Err(GatewayError::NotInCatalogue(key)),
                Err(e) => {
                    log::warn!("catalogue lookup of {key} failed: {e}");
                    Err(GatewayError::Internal {
                        stage: Stage::LookingUp,
                        source: e,
                    })
                }
            }),

            done @ IdentifyState::Done(_) => done,
        }
    }

    /// `{artist, title, payload}` body
    pub fn add_track(&self, body: &Value) -> Result<TrackKey, GatewayError> {
        let track = validate::add_track(body)?;
        self.add(track)
    }

    pub fn add(&self, track: Track) -> Result<TrackKey, GatewayError> {
        self.store
            .add(&track)
            .map_err(|e| GatewayError::from_storage(Stage::Adding, e))?;
        log::info!("added {}", track.key);
        Ok(track.key)
    }

    /// `{artist, title}` body
    pub fn delete_track(&self, body: &Value) -> Result<TrackKey, GatewayError> {
        let key = validate::track_key(body)?;
        self.delete(key)
    }

    pub fn delete(&self, key: TrackKey) -> Result<TrackKey, GatewayError> {
        self.store
            .delete(&key)
            .map_err(|e| GatewayError::from_storage(Stage::Deleting, e))?;
        log::info!("deleted {key}");
        Ok(key)
    }

    /// `{artist, title}` body
    pub fn search_track(&self, body: &Value) -> Result<Track, GatewayError> {
        let key = validate::track_key(body)?;
        self.search(&key)
    }

    pub fn search(&self, key: &TrackKey) -> Result<Track, GatewayError> {
        self.store
            .get(key)
            .map_err(|e| GatewayError::from_storage(Stage::LookingUp, e))
    }

    pub fn list(&self) -> Result<Vec<TrackKey>, GatewayError> {
        self.store
            .list()
            .map_err(|e| GatewayError::from_storage(Stage::Listing, e))
    }

    pub fn clear(&self) -> Result<usize, GatewayError> {
        let removed = self
            .store
            .clear()
            .map_err(|e| GatewayError::from_storage(Stage::Clearing, e))?;
        log::info!("catalogue cleared, {removed} tracks removed");
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rusqlite::Connection;
    use serde_json::json;

    use super::*;
    use crate::storage::schema;

    /// Provider that always answers the same and counts calls
    pub(crate) struct MockProvider {
        outcome: IdentifyOutcome,
        pub calls: Arc<AtomicUsize>,
        pub last_fragment: Arc<Mutex<Option<Vec<u8>>>>,
    }

    impl MockProvider {
        pub(crate) fn answering(outcome: IdentifyOutcome) -> Self {
            Self {
                outcome,
                calls: Arc::new(AtomicUsize::new(0)),
                last_fragment: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl IdentificationApi for MockProvider {
        fn identify(&self, fragment: &[u8]) -> IdentifyOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_fragment.lock().unwrap() = Some(fragment.to_vec());
            self.outcome.clone()
        }
    }

    pub(crate) fn setup_gateway(outcome: IdentifyOutcome) -> (Gateway, Arc<AtomicUsize>) {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        let provider = MockProvider::answering(outcome);
        let calls = Arc::clone(&provider.calls);
        (
            Gateway::new(CatalogueStore::from_existing_conn(conn), Box::new(provider)),
            calls,
        )
    }

    fn blinding_lights_key() -> TrackKey {
        TrackKey::new("The Weeknd", "Blinding Lights")
    }

    #[test]
    fn test_identify_success_returns_full_track() {
        let (gateway, calls) = setup_gateway(IdentifyOutcome::Match(blinding_lights_key()));
        gateway
            .add(Track::new("The Weeknd", "Blinding Lights", b"full song".to_vec()))
            .unwrap();

        let track = gateway.identify(&json!({"encoded_fragment": "YWJj"})).unwrap();

        assert_eq!(track.key, blinding_lights_key());
        assert_eq!(track.payload, b"full song");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identify_passes_decoded_fragment_to_provider() {
        let conn = Connection::open_in_memory().unwrap();
        schema::init(&conn).unwrap();
        let provider = MockProvider::answering(IdentifyOutcome::NoMatch);
        let seen = Arc::clone(&provider.last_fragment);
        let gateway = Gateway::new(CatalogueStore::from_existing_conn(conn), Box::new(provider));

        let _ = gateway.identify(&json!({"encoded_fragment": "YWJj"}));

        assert_eq!(seen.lock().unwrap().as_deref(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_identify_invalid_input_never_calls_provider() {
        let (gateway, calls) = setup_gateway(IdentifyOutcome::NoMatch);

        let err = gateway
            .identify(&json!({"encoded_fragment": "not base64!!"}))
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation(ValidationError::InvalidEncoding(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identify_no_match() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::NoMatch);

        let err = gateway.identify(&json!({"encoded_fragment": "YWJj"})).unwrap_err();

        assert!(matches!(err, GatewayError::NoMatch));
    }

    #[test]
    fn test_identify_match_missing_from_catalogue() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::Match(blinding_lights_key()));

        let err = gateway.identify(&json!({"encoded_fragment": "YWJj"})).unwrap_err();

        assert!(matches!(err, GatewayError::NotInCatalogue(ref key) if *key == blinding_lights_key()));
        assert_eq!(err.to_string(), "Track not found in catalogue");
        assert_ne!(err.to_string(), GatewayError::NoMatch.to_string());
    }

    #[test]
    fn test_identify_rate_limited_is_not_retried() {
        let (gateway, calls) = setup_gateway(IdentifyOutcome::RateLimited);

        let err = gateway.identify_fragment(b"abc".to_vec()).unwrap_err();

        assert!(matches!(err, GatewayError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identify_provider_error_carries_status() {
        let (gateway, _) =
            setup_gateway(IdentifyOutcome::ProviderError(ProviderStatus::Http(503)));

        let err = gateway.identify_fragment(b"abc".to_vec()).unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Upstream {
                stage: Stage::Identifying,
                status: ProviderStatus::Http(503)
            }
        ));
    }

    #[test]
    fn test_identify_empty_fragment_is_invalid() {
        let (gateway, calls) = setup_gateway(IdentifyOutcome::NoMatch);

        let err = gateway.identify_fragment(Vec::new()).unwrap_err();

        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_add_twice_conflicts() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::NoMatch);
        let body = json!({"artist": "The Weeknd", "title": "Blinding Lights", "payload": "eA=="});

        assert_eq!(gateway.add_track(&body).unwrap(), blinding_lights_key());

        let err = gateway.add_track(&body).unwrap_err();
        assert!(matches!(err, GatewayError::Conflict(_)));
        assert_eq!(err.to_string(), "Track already exists");
    }

    #[test]
    fn test_invalid_add_leaves_catalogue_untouched() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::NoMatch);

        let err = gateway
            .add_track(&json!({"artist": "The Weeknd", "title": 7, "payload": "eA=="}))
            .unwrap_err();

        assert_eq!(err.to_string(), "Title must be a string");
        assert!(gateway.list().unwrap().is_empty());
    }

    #[test]
    fn test_delete_then_search_is_not_found() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::NoMatch);
        let key_body = json!({"artist": "The Weeknd", "title": "Blinding Lights"});

        gateway
            .add(Track::new("The Weeknd", "Blinding Lights", b"x".to_vec()))
            .unwrap();
        gateway.delete_track(&key_body).unwrap();

        let err = gateway.search_track(&key_body).unwrap_err();
        assert!(matches!(err, GatewayError::TrackNotFound(_)));
        assert_eq!(err.to_string(), "Track not found");
    }

    #[test]
    fn test_clear_counts() {
        let (gateway, _) = setup_gateway(IdentifyOutcome::NoMatch);
        gateway.add(Track::new("A", "one", vec![1])).unwrap();
        gateway.add(Track::new("B", "two", vec![2])).unwrap();

        assert_eq!(gateway.clear().unwrap(), 2);
        assert!(gateway.list().unwrap().is_empty());
    }
}
