//! Authentication module for managing the current session's tokens.
//!
//! This module provides:
//! - `Session` / `TokenPair`: the authenticated-identity value types
//! - `TokenStore`: atomic, durable holder of the current token pair
//! - `KeyringTokens`: OS-keychain persistence via keyring
//!
//! The token pair survives application restarts until explicitly cleared.

pub mod session;
pub mod store;

pub use session::{Session, TokenPair};
pub use store::{KeyringTokens, TokenPersistence, TokenStore};
