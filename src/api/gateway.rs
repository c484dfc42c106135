use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::auth::TokenStore;

use super::{ApiError, ApiRequest, ApiResponse, Transport};

/// Token refresh endpoint
const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Callback fired when the session can no longer be recovered and the user
/// must re-authenticate. The hosting application decides what that means
/// (typically: navigate to the login screen).
pub type SessionInvalidated = Arc<dyn Fn() + Send + Sync>;

/// Authenticated request gateway.
///
/// Every outbound request goes through [`Gateway::send`], which attaches
/// the current access token, and on a 401 runs the refresh protocol once:
/// rotate the token pair via the refresh endpoint, replay the original
/// request exactly once, and return whatever the replay yields. If the
/// refresh protocol itself fails the token store is cleared, the
/// session-invalidated callback fires, and the original 401 still flows
/// back to the caller so local error handling can run.
///
/// Concurrent 401s coalesce on a single refresh: whichever call wins the
/// refresh gate rotates the pair, and the others adopt the rotated access
/// token instead of re-invoking the refresh endpoint.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: Arc<TokenStore>,
    refresh_gate: Mutex<()>,
    on_invalidated: std::sync::Mutex<Option<SessionInvalidated>>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<TokenStore>) -> Self {
        Self {
            transport,
            store,
            refresh_gate: Mutex::new(()),
            on_invalidated: std::sync::Mutex::new(None),
        }
    }

    /// Register the session-invalidated callback. Replaces any previous
    /// handler.
    pub fn set_session_invalidated(&self, callback: SessionInvalidated) {
        *self
            .on_invalidated
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    /// Builder form of [`set_session_invalidated`](Self::set_session_invalidated).
    pub fn with_session_invalidated(self, callback: SessionInvalidated) -> Self {
        self.set_session_invalidated(callback);
        self
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Dispatch a request with the current credential attached.
    ///
    /// Returns the response for any status except a first 401, which is
    /// handled by the refresh protocol. Only transport failures surface as
    /// `Err`.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        // The gateway owns the Authorization header
        request.clear_authorization();
        let sent_with = self.store.get().map(|pair| pair.access_token);
        if let Some(ref token) = sent_with {
            request.set_bearer(token);
        }

        let response = self.transport.dispatch(&request).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!(path = %request.path, "Access token rejected, entering refresh protocol");
        match self.refreshed_access_token(sent_with.as_deref()).await {
            Ok(access_token) => {
                // Replay exactly once; a second 401 here is returned as-is
                request.set_bearer(&access_token);
                self.transport.dispatch(&request).await
            }
            Err(e) => {
                warn!(error = %e, path = %request.path, "Session refresh failed, invalidating session");
                self.invalidate_session();
                Ok(response)
            }
        }
    }

    /// Obtain a usable access token after a 401, refreshing at most once.
    ///
    /// `stale_access` is the token the failing request was sent with. If
    /// the store already holds a different one by the time we get the
    /// gate, another call refreshed first and we adopt its result.
    async fn refreshed_access_token(
        &self,
        stale_access: Option<&str>,
    ) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.store.get();
        if let Some(ref pair) = current {
            if stale_access != Some(pair.access_token.as_str()) {
                debug!("Token pair already rotated by a concurrent refresh");
                return Ok(pair.access_token.clone());
            }
        }
        let Some(pair) = current else {
            return Err(ApiError::RefreshFailed("no refresh token held".into()));
        };

        let request = ApiRequest::post(REFRESH_PATH)
            .with_json(serde_json::json!({ "refreshToken": pair.refresh_token }));
        let response = self
            .transport
            .dispatch(&request)
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
        if !response.is_success() {
            return Err(ApiError::RefreshFailed(format!(
                "refresh endpoint returned {}",
                response.status
            )));
        }

        let rotated: RefreshResponse = response
            .json()
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
        // The backend may rotate only the access token; keep the old
        // refresh token in that case
        let refresh_token = rotated.refresh_token.unwrap_or(pair.refresh_token);
        self.store.set(rotated.access_token.clone(), refresh_token);
        debug!("Access token refreshed");

        Ok(rotated.access_token)
    }

    /// Clear the store and, if a session was actually live, fire the
    /// session-invalidated callback. Firing is keyed on the clear so
    /// concurrent refresh failures signal at most once.
    fn invalidate_session(&self) {
        if self.store.clear() {
            let callback = self
                .on_invalidated
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}
