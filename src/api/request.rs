use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::ApiError;

/// Description of an outbound request, held as a value so the gateway can
/// re-stamp the `Authorization` header and replay it after a refresh.
///
/// Callers must not set `Authorization` themselves; the gateway owns that
/// header and overwrites whatever is present.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach an extra header. Invalid names/values are ignored rather
    /// than failing the whole request description.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Stamp (or re-stamp) the bearer credential. Gateway-internal.
    pub(crate) fn set_bearer(&mut self, token: &str) {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            self.headers.insert(header::AUTHORIZATION, value);
        }
    }

    pub(crate) fn clear_authorization(&mut self) {
        self.headers.remove(header::AUTHORIZATION);
    }
}

/// A completed HTTP exchange: status plus the already-read body.
///
/// The gateway hands these back for every status except the 401s it
/// recovers from itself; converting failure statuses into [`ApiError`]s is
/// the typed client's job.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode failed: {}", e)))
    }

    /// Convert a failure status into the error taxonomy; success statuses
    /// pass through.
    pub fn into_result(self) -> Result<ApiResponse, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }
}
