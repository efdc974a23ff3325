use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Session;

/// Session changes pushed by the auth service to its subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuthEvent {
    /// A session was established (sign-in, or sign-up with immediate login)
    SignedIn { session: Session },

    /// An expired access token was exchanged for a fresh one
    TokenRefreshed { session: Session },

    /// The session was discarded
    SignedOut,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn { session } | Self::TokenRefreshed { session } => Some(session),
            Self::SignedOut => None,
        }
    }
}

/// A device storage key was written or removed.
///
/// Delivered to every listener on the process, filtered by `device_id` on the
/// receiving side. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub device_id: Uuid,
    pub key: String,
    pub value: Option<String>,
}
