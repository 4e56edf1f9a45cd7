use crate::error::PostbookError;
use crate::models::{Comment, CommentDraft, Post, PostDraft, User};
use async_trait::async_trait;

/// The external post/comment resource.
///
/// Every call is one request/response round trip: no retries, no caching,
/// no batching. A failure is returned as `Err` and the caller decides what
/// the user sees.
#[async_trait]
pub trait RemoteResource: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<Post>, PostbookError>;
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, PostbookError>;
    async fn create_post(&self, draft: &PostDraft) -> Result<Post, PostbookError>;
    async fn create_comment(&self, draft: &CommentDraft) -> Result<Comment, PostbookError>;
    /// `patch` is the full merged record; its `post_id` selects the parent post.
    async fn update_comment(&self, id: i64, patch: &Comment) -> Result<Comment, PostbookError>;
    async fn delete_comment(&self, post_id: i64, id: i64) -> Result<(), PostbookError>;
    async fn get_user(&self, id: i64) -> Result<User, PostbookError>;
}
