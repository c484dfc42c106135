//! Authenticated API-access layer for the NeuroMon backend.
//!
//! This module provides:
//! - `Gateway`: credential attachment plus the refresh-once-and-retry
//!   policy for expired access tokens
//! - `ApiClient`: login/logout and generic pass-through helpers for the
//!   domain endpoints (`/analysis`, `/device`, `/session`, ...)
//! - `Transport`: the HTTP seam, implemented over reqwest in production
//!   and scripted in tests
//!
//! The backend uses bearer-token authentication; the gateway owns the
//! `Authorization` header end to end.

pub mod client;
pub mod error;
pub mod gateway;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::{Gateway, SessionInvalidated};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{HttpTransport, Transport};
