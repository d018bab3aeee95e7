//! Contract with the external fingerprinting provider.
//!
//! The gateway only sees [`IdentificationApi`] and the small
//! [`IdentifyOutcome`] vocabulary, so the provider can be swapped or mocked.

use std::fmt::Display;

use crate::domain::track::TrackKey;

pub mod audd;

/// Normalized answer of the fingerprinting provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
    Match(TrackKey),
    NoMatch,
    /// provider asked us to slow down, surfaced as is and never retried
    RateLimited,
    ProviderError(ProviderStatus),
}

/// What went wrong on the provider side, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// non-success HTTP status from the provider
    Http(u16),
    /// provider answered 200 but reported an error in the body
    Api { code: i64, message: String },
    /// timeout or connection failure
    Unavailable,
    /// body could not be understood
    InvalidResponse(String),
}

impl ProviderStatus {
    /// human readable explanation from the provider, when there is one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ProviderStatus::Api { message, .. } => Some(message),
            ProviderStatus::InvalidResponse(reason) => Some(reason),
            ProviderStatus::Http(_) | ProviderStatus::Unavailable => None,
        }
    }
}

impl Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStatus::Http(status) => write!(f, "http_{status}"),
            ProviderStatus::Api { code, .. } => write!(f, "api_{code}"),
            ProviderStatus::Unavailable => write!(f, "unavailable"),
            ProviderStatus::InvalidResponse(_) => write!(f, "invalid_response"),
        }
    }
}

/// Trait for fragment identification.
///
/// Implement this trait to create mock implementations for testing.
/// The fragment is already decoded; implementations do not re-validate it.
pub trait IdentificationApi: Send + Sync {
    fn identify(&self, fragment: &[u8]) -> IdentifyOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_codes() {
        assert_eq!(ProviderStatus::Http(503).to_string(), "http_503");
        assert_eq!(
            ProviderStatus::Api {
                code: 300,
                message: "recognition failed".into()
            }
            .to_string(),
            "api_300"
        );
        assert_eq!(ProviderStatus::Unavailable.to_string(), "unavailable");
        assert_eq!(ProviderStatus::Unavailable.detail(), None);
    }
}
