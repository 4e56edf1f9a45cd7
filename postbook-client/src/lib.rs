pub mod comment_list;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod post_list;
pub mod resource;
pub mod session;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use comment_list::CommentListController;
pub use config::{ClientConfig, FeedConfig};
pub use error::{ErrorKind, PostbookError};
pub use http_client::HttpClient;
pub use models::{Comment, CommentDraft, Post, PostDraft, User};
pub use post_list::PostListController;
pub use resource::RemoteResource;
pub use session::UserContext;
pub use sync::{ListEvent, Operation, SubmitPolicy, SyncState};

use std::sync::Arc;

/// Entry point tying the resource client, the session user and the list
/// controllers together.
///
/// Every controller handed out shares the same resource and user context.
#[derive(Clone)]
pub struct Postbook {
    remote: Arc<dyn RemoteResource>,
    user: UserContext,
    feed_config: FeedConfig,
    policy: SubmitPolicy,
}

impl Postbook {
    /// Build a client talking HTTP to `config.base_url`.
    pub fn new(config: &ClientConfig, feed_config: FeedConfig) -> Result<Self, PostbookError> {
        feed_config.validate()?;
        tracing::debug!("Creating Postbook client for {}", config.base_url);
        Ok(Self::with_resource(
            Arc::new(HttpClient::new(config)?),
            feed_config,
        ))
    }

    /// Build from environment variables (see [`ClientConfig::from_env`]).
    pub fn from_env() -> Result<Self, PostbookError> {
        Self::new(&ClientConfig::from_env()?, FeedConfig::from_env()?)
    }

    pub fn with_resource(remote: Arc<dyn RemoteResource>, feed_config: FeedConfig) -> Self {
        Self {
            remote,
            user: UserContext::anonymous(),
            feed_config,
            policy: SubmitPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch user `user_id` and install it as the session's acting user.
    pub async fn sign_in(&self, user_id: i64) -> Result<User, PostbookError> {
        if self.user.get().is_some() {
            return Err(PostbookError::AlreadySignedIn);
        }
        let user = self.remote.get_user(user_id).await?;
        self.user.sign_in(user.clone())?;
        Ok(user)
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.get()
    }

    pub fn user_context(&self) -> &UserContext {
        &self.user
    }

    pub fn remote(&self) -> Arc<dyn RemoteResource> {
        self.remote.clone()
    }

    pub fn feed(&self) -> PostListController {
        PostListController::new(self.remote.clone(), self.user.clone(), &self.feed_config)
            .with_policy(self.policy)
    }

    pub fn comments(&self, post_id: i64) -> CommentListController {
        CommentListController::new(
            post_id,
            self.remote.clone(),
            self.user.clone(),
            &self.feed_config,
        )
        .with_policy(self.policy)
    }
}
