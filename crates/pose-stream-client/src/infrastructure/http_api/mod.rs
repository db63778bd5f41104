//! HTTP side channel to the pose backend.
//!
//! Two endpoints sit next to the WebSocket:
//!
//! - `POST {api}/start_session` with `{"exercise": id}` tells the backend
//!   which reference pose to load before streaming starts.
//! - `GET {api}/exercises` lists the exercises the backend knows.
//!
//! Both are one-shot requests.  The streaming session treats a failed
//! `start_session` as a warning, not an error.

use std::time::Duration;

use pose_stream_core::ExerciseId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend rejected the session: {0}")]
    Rejected(String),
}

/// A session the backend accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub exercise: String,
    /// Joint angles of the reference pose, as sent by the backend.
    pub reference_angles: serde_json::Value,
}

#[derive(Serialize)]
struct StartSessionRequest<'a> {
    exercise: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StartSessionResponse {
    Ok {
        exercise: String,
        #[serde(default)]
        reference_angles: serde_json::Value,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ExercisesResponse {
    exercises: Vec<String>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Request {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Asks the backend to prepare a session for `exercise`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Request`] for transport or status failures and
    /// [`ApiError::Rejected`] when the backend answers `"status": "error"`.
    pub async fn start_session(&self, exercise: &ExerciseId) -> Result<SessionStart, ApiError> {
        let url = format!("{}/start_session", self.base_url);
        debug!("POST {url} exercise={exercise}");

        let response: StartSessionResponse = self
            .client
            .post(&url)
            .json(&StartSessionRequest {
                exercise: exercise.as_str(),
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|source| ApiError::Request { url, source })?;

        match response {
            StartSessionResponse::Ok {
                exercise,
                reference_angles,
            } => Ok(SessionStart {
                exercise,
                reference_angles,
            }),
            StartSessionResponse::Error { message } => Err(ApiError::Rejected(message)),
        }
    }

    /// Lists the exercises the backend can score against.
    ///
    /// # Errors
    ///
    /// [`ApiError::Request`] for transport, status, or body failures.
    pub async fn list_exercises(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/exercises", self.base_url);
        debug!("GET {url}");

        let body: ExercisesResponse = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?
            .json()
            .await
            .map_err(|source| ApiError::Request { url, source })?;
        Ok(body.exercises)
    }
}
