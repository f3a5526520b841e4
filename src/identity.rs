// Identity provider - external single-user session boundary
//
// The real system delegates sessions to a hosted identity service; this
// trait is that boundary. `StaticIdentity` is the in-process stand-in used
// by tests and the demo binary.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The signed-in account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Session boundary: who is signed in, and signing in/out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session's user, or `None` when signed out.
    async fn current_user(&self) -> Option<CurrentUser>;

    async fn sign_in(&self, email: &str) -> Result<CurrentUser, IdentityError>;

    async fn sign_out(&self);
}

/// In-process identity provider holding a single optional session.
///
/// Accepts any non-empty email and derives the user id from it, so signing
/// in with the same email in a later process sees the same records.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    session: RwLock<Option<CurrentUser>>,
}

impl StaticIdentity {
    /// Signed-out provider.
    pub fn new() -> Self {
        StaticIdentity::default()
    }

    /// Provider already signed in as the given user.
    pub fn signed_in(id: &str, email: &str) -> Self {
        StaticIdentity {
            session: RwLock::new(Some(CurrentUser {
                id: id.to_string(),
                email: email.to_string(),
            })),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<CurrentUser> {
        self.session.read().unwrap().clone()
    }

    async fn sign_in(&self, email: &str) -> Result<CurrentUser, IdentityError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(IdentityError::InvalidCredentials(
                "email must not be empty".to_string(),
            ));
        }
        let user = CurrentUser {
            id: uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, email.as_bytes()).to_string(),
            email: email.to_string(),
        };
        *self.session.write().unwrap() = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) {
        *self.session.write().unwrap() = None;
    }
}
