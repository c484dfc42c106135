//! High-level API client for the NeuroMon backend.
//!
//! `ApiClient` wires the transport, token store, and gateway together and
//! exposes the auth endpoints plus generic helpers for the domain
//! endpoints. Domain payloads (analyses, devices, recording sessions,
//! notifications, chat) are opaque to this crate; the hosting application
//! supplies its own serde types through the generic helpers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::{KeyringTokens, Session, TokenPair, TokenStore};
use crate::config::Config;
use crate::models::UserProfile;

use super::gateway::SessionInvalidated;
use super::{ApiError, ApiRequest, ApiResponse, Gateway, HttpTransport, Transport};

/// Login endpoint
const LOGIN_PATH: &str = "/auth/login";

/// Logout endpoint (best-effort; local clear happens regardless)
const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: UserProfile,
}

/// API client for the NeuroMon backend.
/// Clone is cheap - the gateway and store are shared behind Arcs.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Arc<Gateway>,
    // Auth endpoints dispatch here directly: a 401 from login means bad
    // credentials, not an expired access token, so the gateway's refresh
    // protocol must never run for them
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Build a client over an explicit transport and store. This is the
    /// composition-root constructor; tests inject doubles here.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<TokenStore>) -> Self {
        Self {
            gateway: Arc::new(Gateway::new(transport.clone(), store)),
            transport,
        }
    }

    /// Build a production client from configuration: reqwest transport
    /// against `config.api_base_url`, tokens persisted in the OS keychain.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.api_base_url.clone())?;
        let store = TokenStore::new(Box::new(KeyringTokens::new(config.keyring_service.clone())));
        Ok(Self::new(Arc::new(transport), Arc::new(store)))
    }

    /// Register the handler fired when the session is forcibly
    /// invalidated (refresh token rejected or unreachable).
    pub fn on_session_invalidated(&self, callback: SessionInvalidated) {
        self.gateway.set_session_invalidated(callback);
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        self.gateway.store()
    }

    /// Whether a token pair is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.store().get().is_some()
    }

    /// Authenticate and install the issued token pair as the current
    /// session. Any prior session is replaced; a rejected login leaves it
    /// untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).with_json(serde_json::json!({
            "email": email,
            "password": password,
        }));

        let response = self.transport.dispatch(&request).await?.into_result()?;
        let login: LoginResponse = response.json()?;

        self.store()
            .set(login.access_token.clone(), login.refresh_token.clone());
        debug!(user = %login.user.id, "Login succeeded");

        Ok(Session::new(
            TokenPair::new(login.access_token, login.refresh_token),
            login.user,
        ))
    }

    /// End the session. The server call is best-effort: the local tokens
    /// are cleared whatever it returns, and a 401 never triggers a refresh
    /// of a session that is being discarded anyway. Explicit logout does
    /// not fire the session-invalidated callback.
    pub async fn logout(&self) {
        let mut request = ApiRequest::post(LOGOUT_PATH);
        if let Some(pair) = self.store().get() {
            request.set_bearer(&pair.access_token);
        }
        match self.transport.dispatch(&request).await {
            Ok(response) if !response.is_success() => {
                warn!(status = %response.status, "Logout endpoint returned an error, clearing locally");
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed, clearing locally");
            }
            Ok(_) => {}
        }
        self.store().clear();
    }

    /// Dispatch a raw request through the gateway. Callers that need the
    /// full response (status, headers) use this; everyone else goes
    /// through the typed helpers below.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.gateway.send(request).await
    }

    /// GET a domain endpoint and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.gateway
            .send(ApiRequest::get(path))
            .await?
            .into_result()?
            .json()
    }

    /// POST a JSON body to a domain endpoint and decode the response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        self.gateway
            .send(ApiRequest::post(path).with_json(body))
            .await?
            .into_result()?
            .json()
    }
}
