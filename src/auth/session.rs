use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// The current access/refresh token pair.
///
/// Both tokens are opaque strings minted by the backend. They travel
/// together: a pair with only one half present is treated as
/// unauthenticated everywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Snapshot of the authenticated identity returned by login.
///
/// The [`TokenStore`](crate::auth::TokenStore) remains the single source of
/// truth for the tokens after login; this value is what the hosting
/// application keeps around for display (who is signed in, since when).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub tokens: TokenPair,
    pub user: UserProfile,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(tokens: TokenPair, user: UserProfile) -> Self {
        Self {
            tokens,
            user,
            created_at: Utc::now(),
        }
    }

    /// Time elapsed since login, for display.
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    /// Minutes since login (for display), clamped at zero against clock skew.
    pub fn age_minutes(&self) -> i64 {
        self.age().num_minutes().max(0)
    }
}
