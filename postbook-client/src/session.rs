use crate::error::PostbookError;
use crate::models::{Comment, User};
use std::sync::{Arc, OnceLock};

/// Session-scoped holder of the acting user.
///
/// Clones share the same slot. The user is installed at most once (by the
/// login flow) and is read-only afterwards; an empty slot means "not
/// logged in".
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    user: Arc<OnceLock<User>>,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        let context = Self::default();
        let _ = context.user.set(user);
        context
    }

    pub fn sign_in(&self, user: User) -> Result<(), PostbookError> {
        let user_id = user.id;
        self.user
            .set(user)
            .map_err(|_| PostbookError::AlreadySignedIn)?;
        tracing::info!("Signed in as user {}", user_id);
        Ok(())
    }

    pub fn get(&self) -> Option<&User> {
        self.user.get()
    }

    /// Guard run before every mutation, ahead of any network call.
    pub fn require(&self) -> Result<&User, PostbookError> {
        self.get().ok_or_else(|| {
            tracing::warn!("Mutation rejected: no current user");
            PostbookError::AuthorizationRequired("You need to login first".to_string())
        })
    }

    /// Whether edit/delete controls should be offered for `comment`.
    ///
    /// Advisory only: the resource is the authority on who may change what.
    pub fn can_modify(&self, comment: &Comment) -> bool {
        self.get().is_some_and(|user| user.email == comment.email)
    }
}
