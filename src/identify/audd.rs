//! AudD HTTP client
//!
//! Sends a fragment to the AudD recognition endpoint and maps the answer
//! onto [`IdentifyOutcome`]. See: https://docs.audd.io/
//!
//! ### Error reporting
//! AudD reports most failures with HTTP 200 and `"status": "error"` in the
//! body. Error codes 901 and 902 mean the request quota is exhausted and are
//! treated like an HTTP 429.

use std::time::Duration;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;

use crate::{
    config::ProviderConfig,
    domain::track::TrackKey,
    identify::{IdentificationApi, IdentifyOutcome, ProviderStatus},
};

const QUOTA_ERROR_CODES: &[i64] = &[901, 902];

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    status: String,
    result: Option<RecognizeResult>,
    error: Option<RecognizeError>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    artist: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeError {
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

/// AudD API client
pub struct AuddClient {
    api_token: Option<String>,
    http_client: reqwest::blocking::Client,
    base_url: String,
}

impl AuddClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        Self::with_timeout(
            config.base_url.clone(),
            config.api_token.clone(),
            config.timeout(),
        )
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_token,
            http_client,
            base_url: base_url.into(),
        })
    }

    fn send(&self, fragment: &[u8]) -> Result<(u16, String), ProviderStatus> {
        let audio = STANDARD.encode(fragment);
        let mut form = vec![("audio", audio.as_str()), ("return", "")];
        if let Some(token) = &self.api_token {
            form.push(("api_token", token.as_str()));
        }

        let response = self
            .http_client
            .post(&self.base_url)
            .form(&form)
            .send()
            .map_err(|e| {
                log::warn!("fingerprinting provider unreachable: {e}");
                ProviderStatus::Unavailable
            })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| {
            if e.is_timeout() {
                ProviderStatus::Unavailable
            } else {
                ProviderStatus::InvalidResponse(e.to_string())
            }
        })?;

        Ok((status, body))
    }
}

impl IdentificationApi for AuddClient {
    fn identify(&self, fragment: &[u8]) -> IdentifyOutcome {
        match self.send(fragment) {
            Ok((status, body)) => interpret(status, &body),
            Err(status) => IdentifyOutcome::ProviderError(status),
        }
    }
}

/// maps an HTTP status and body of the provider onto an outcome
fn interpret(status: u16, body: &str) -> IdentifyOutcome {
    if status == 429 {
        return IdentifyOutcome::RateLimited;
    }
    if !(200..300).contains(&status) {
        return IdentifyOutcome::ProviderError(ProviderStatus::Http(status));
    }

    let response: RecognizeResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            return IdentifyOutcome::ProviderError(ProviderStatus::InvalidResponse(e.to_string()));
        }
    };

    if response.status != "success" {
        return match response.error {
            Some(err) if QUOTA_ERROR_CODES.contains(&err.error_code) => IdentifyOutcome::RateLimited,
            Some(err) => IdentifyOutcome::ProviderError(ProviderStatus::Api {
                code: err.error_code,
                message: err.error_message,
            }),
            None => IdentifyOutcome::ProviderError(ProviderStatus::InvalidResponse(format!(
                "status '{}' without error details",
                response.status
            ))),
        };
    }

    match response.result {
        None => IdentifyOutcome::NoMatch,
        Some(RecognizeResult {
            artist: Some(artist),
            title: Some(title),
        }) => IdentifyOutcome::Match(TrackKey::new(artist, title)),
        Some(_) => IdentifyOutcome::ProviderError(ProviderStatus::InvalidResponse(
            "result is missing artist or title".into(),
        )),
    }
}
