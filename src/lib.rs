//! Session and API-access core for the NeuroMon clinical monitoring client.
//!
//! This crate owns the two pieces of client state with real failure
//! semantics: the [`auth::TokenStore`] holding the current access/refresh
//! token pair, and the [`api::Gateway`] that attaches credentials to every
//! outbound request and transparently recovers from access-token expiry
//! with a single refresh-and-retry cycle.
//!
//! The hosting application (UI shell, dashboards, chat) talks to the
//! backend exclusively through [`api::ApiClient`] and subscribes to the
//! gateway's session-invalidated event to route the user back to login
//! when the refresh token itself is rejected.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse, Gateway, SessionInvalidated, Transport};
pub use auth::{Session, TokenPair, TokenStore};
pub use config::Config;
pub use models::{Role, UserProfile};
