use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::HttpConfig,
    domain::track::{Track, TrackKey},
    gateway::Gateway,
    http::error::ApiError,
};

pub struct HttpServer {
    gateway: Gateway,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(gateway: Gateway, config: HttpConfig) -> Self {
        Self { gateway, config }
    }

    /// Serves requests until the process exits; each request runs on a worker thread.
    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (GET) (/) => {
                Ok(Response::text("Welcome to Shamzam!"))
            },
            (POST) (/catalogue/add) => {
                self.handle_add(request)
            },
            (DELETE) (/catalogue/delete) => {
                self.handle_delete(request)
            },
            (GET) (/catalogue/list) => {
                self.handle_list()
            },
            (POST) (/catalogue/search) => {
                self.handle_search(request)
            },
            (DELETE) (/catalogue/clear) => {
                self.handle_clear()
            },
            (POST) (/music/identify) => {
                self.handle_identify(request)
            },
            _ => Err(ApiError::NotFound {
                reason: "route_not_found",
                message: format!("no route for {} {}", request.method(), request.url()),
            })
        );

        let response = match result {
            Ok(r) => r,
            Err(e) => e.into_response(),
        };

        info!("Response: {} {} {}", request.method(), request.url(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn json_body(request: &Request) -> Result<Value, ApiError> {
        Ok(rouille::input::json_input::<Value>(request)?)
    }

    fn handle_add(&self, request: &Request) -> Result<Response, ApiError> {
        let body = Self::json_body(request)?;
        self.gateway.add_track(&body)?;
        Ok(Response::json(&MessageResponse::new("Track added successfully")).with_status_code(201))
    }

    fn handle_delete(&self, request: &Request) -> Result<Response, ApiError> {
        let body = Self::json_body(request)?;
        self.gateway.delete_track(&body)?;
        Ok(Response::json(&MessageResponse::new("Track deleted successfully")))
    }

    fn handle_list(&self) -> Result<Response, ApiError> {
        let keys = self.gateway.list()?;
        Ok(Response::json(&ListResponse::from_domain(keys)))
    }

    fn handle_search(&self, request: &Request) -> Result<Response, ApiError> {
        let body = Self::json_body(request)?;
        let track = self.gateway.search_track(&body)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }

    fn handle_clear(&self) -> Result<Response, ApiError> {
        let removed = self.gateway.clear()?;
        Ok(Response::json(&ClearResponse {
            message: "Catalogue cleared successfully".into(),
            removed,
        }))
    }

    fn handle_identify(&self, request: &Request) -> Result<Response, ApiError> {
        let body = Self::json_body(request)?;
        let track = self.gateway.identify(&body)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }
}

#[derive(Serialize, Deserialize)]
struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TrackResponse {
    message: String,
    artist: String,
    title: String,
    /// base64 of the stored bytes
    payload: String,
}

impl TrackResponse {
    fn from_domain(track: &Track) -> Self {
        Self {
            message: "Track found".into(),
            artist: track.artist().to_string(),
            title: track.title().to_string(),
            payload: STANDARD.encode(&track.payload),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct TrackEntry {
    artist: String,
    title: String,
}

#[derive(Serialize, Deserialize)]
struct ListResponse {
    message: String,
    tracks: Vec<TrackEntry>,
}

impl ListResponse {
    fn from_domain(keys: Vec<TrackKey>) -> Self {
        let message = if keys.is_empty() {
            "No tracks found"
        } else {
            "Tracks listed"
        };
        Self {
            message: message.into(),
            tracks: keys
                .into_iter()
                .map(|k| TrackEntry {
                    artist: k.artist,
                    title: k.title,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ClearResponse {
    message: String,
    removed: usize,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
