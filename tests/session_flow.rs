//! End-to-end session lifecycle tests: login, token expiry and refresh,
//! refresh-token revocation, and concurrent-expiry coalescing, driven
//! through the public API against a stateful backend double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use tokio::sync::Barrier;

use neuromon_client::{ApiClient, ApiError, ApiRequest, ApiResponse, TokenStore, Transport};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn response(status: StatusCode, body: &str) -> ApiResponse {
    ApiResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

fn bearer(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Backend double holding the server's view of which tokens are valid.
struct FakeBackend {
    state: Mutex<BackendState>,
    refresh_calls: AtomicUsize,
}

struct BackendState {
    valid_access: Option<String>,
    valid_refresh: Option<String>,
    refresh_revoked: bool,
    issued: u32,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                valid_access: None,
                valid_refresh: None,
                refresh_revoked: false,
                issued: 0,
            }),
            refresh_calls: AtomicUsize::new(0),
        })
    }

    /// Server-side expiry of the current access token. The refresh token
    /// stays valid.
    fn expire_access(&self) {
        self.state.lock().unwrap().valid_access = None;
    }

    /// Revoke the refresh token entirely; the next refresh attempt fails.
    fn revoke_refresh(&self) {
        self.state.lock().unwrap().refresh_revoked = true;
    }

    fn issue_pair(state: &mut BackendState) -> (String, String) {
        state.issued += 1;
        let access = format!("T{}", state.issued);
        let refresh = format!("R{}", state.issued);
        state.valid_access = Some(access.clone());
        state.valid_refresh = Some(refresh.clone());
        (access, refresh)
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        match request.path.as_str() {
            "/auth/login" => {
                let body = request.body.as_ref().expect("login sends a body");
                if body["email"] == "a@x.com" && body["password"] == "p" {
                    let (access, refresh) = Self::issue_pair(&mut state);
                    Ok(response(
                        StatusCode::OK,
                        &format!(
                            r#"{{"accessToken":"{}","refreshToken":"{}",
                                "user":{{"id":"u-7","displayName":"Ana Silva","role":"patient"}}}}"#,
                            access, refresh
                        ),
                    ))
                } else {
                    Ok(response(StatusCode::UNAUTHORIZED, "bad credentials"))
                }
            }
            "/auth/refresh" => {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                let body = request.body.as_ref().expect("refresh sends a body");
                let presented = body["refreshToken"].as_str().unwrap_or_default();
                if !state.refresh_revoked && state.valid_refresh.as_deref() == Some(presented) {
                    let (access, refresh) = Self::issue_pair(&mut state);
                    Ok(response(
                        StatusCode::OK,
                        &format!(
                            r#"{{"accessToken":"{}","refreshToken":"{}"}}"#,
                            access, refresh
                        ),
                    ))
                } else {
                    Ok(response(StatusCode::UNAUTHORIZED, "refresh token invalid"))
                }
            }
            _ => {
                let presented = bearer(request);
                let expected = state.valid_access.as_ref().map(|t| format!("Bearer {}", t));
                if presented.is_some() && presented == expected {
                    Ok(response(StatusCode::OK, r#"{"ok":true}"#))
                } else {
                    Ok(response(StatusCode::UNAUTHORIZED, ""))
                }
            }
        }
    }
}

fn client_over(backend: Arc<FakeBackend>) -> (ApiClient, Arc<AtomicUsize>) {
    let client = ApiClient::new(backend, Arc::new(TokenStore::in_memory()));
    let invalidations = Arc::new(AtomicUsize::new(0));
    let counter = invalidations.clone();
    client.on_session_invalidated(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (client, invalidations)
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    init_tracing();
    let backend = FakeBackend::new();
    let (client, invalidations) = client_over(backend.clone());

    // Login issues the first pair
    let session = client.login("a@x.com", "p").await.unwrap();
    assert_eq!(session.tokens.access_token, "T1");
    assert_eq!(session.tokens.refresh_token, "R1");
    let pair = client.store().get().unwrap();
    assert_eq!((pair.access_token.as_str(), pair.refresh_token.as_str()), ("T1", "R1"));

    // A protected call with a live token succeeds without refreshing
    let body: serde_json::Value = client.get_json("/user/me").await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);

    // Server expires T1: the next call refreshes with R1 and replays
    backend.expire_access();
    let body: serde_json::Value = client.get_json("/analysis").await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    let pair = client.store().get().unwrap();
    assert_eq!((pair.access_token.as_str(), pair.refresh_token.as_str()), ("T2", "R2"));
    assert_eq!(invalidations.load(Ordering::SeqCst), 0);

    // Refresh token revoked: the next expiry is terminal for the session
    backend.expire_access();
    backend.revoke_refresh();
    let result: Result<serde_json::Value, _> = client.get_json("/device").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(client.store().get(), None);
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_failed_refresh_propagates_original_error_alongside_invalidation() {
    init_tracing();
    let backend = FakeBackend::new();
    let (client, invalidations) = client_over(backend.clone());

    client.login("a@x.com", "p").await.unwrap();
    backend.expire_access();
    backend.revoke_refresh();

    // The raw response the caller sees is the original 401, not a swallowed
    // error; invalidation happened alongside it
    let response = client.send(ApiRequest::get("/notifications")).await.unwrap();
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);

    // Subsequent unauthenticated calls do not signal again
    let response = client.send(ApiRequest::get("/notifications")).await.unwrap();
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);
}

/// Transport double for the concurrent-expiry stress case: holds the first
/// two protected calls at a barrier so both observe a 401 before either
/// can refresh.
struct RacingBackend {
    inner: Arc<FakeBackend>,
    barrier: Barrier,
    gated: AtomicUsize,
}

#[async_trait]
impl Transport for RacingBackend {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let is_stale_protected = !request.path.starts_with("/auth/")
            && bearer(request).as_deref() == Some("Bearer T1");
        if is_stale_protected && self.gated.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
        self.inner.dispatch(request).await
    }
}

#[tokio::test]
async fn test_concurrent_401s_coalesce_into_one_refresh() {
    init_tracing();
    let inner = FakeBackend::new();
    let (seed_client, _) = client_over(inner.clone());
    seed_client.login("a@x.com", "p").await.unwrap();
    inner.expire_access();

    let backend = Arc::new(RacingBackend {
        inner: inner.clone(),
        barrier: Barrier::new(2),
        gated: AtomicUsize::new(0),
    });
    let client = ApiClient::new(backend, seed_client.store().clone());
    inner.refresh_calls.store(0, Ordering::SeqCst);

    let (a, b) = tokio::join!(
        client.get_json::<serde_json::Value>("/analysis"),
        client.get_json::<serde_json::Value>("/appointments"),
    );

    // Both requests recovered, the refresh endpoint was hit exactly once,
    // and the store holds a single consistent rotated pair
    assert_eq!(a.unwrap()["ok"], true);
    assert_eq!(b.unwrap()["ok"], true);
    assert_eq!(inner.refresh_calls.load(Ordering::SeqCst), 1);
    let pair = client.store().get().unwrap();
    assert_eq!((pair.access_token.as_str(), pair.refresh_token.as_str()), ("T2", "R2"));
}
