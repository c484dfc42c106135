use serde::{Deserialize, Serialize};

/// Role assigned by the backend at login time.
///
/// Authorization decisions happen server-side; the client only carries the
/// role to pick which shell (patient app, doctor console, admin tools) to
/// render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    Researcher,
}

/// Identity of the currently authenticated user, as returned by the login
/// endpoint alongside the token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}
