//! Domain types shared with the hosting application.

pub mod user;

pub use user::{Role, UserProfile};
