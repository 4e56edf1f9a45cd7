//! In-memory [`RemoteResource`] for controller tests.

use crate::error::PostbookError;
use crate::models::{Comment, CommentDraft, Post, PostDraft, User};
use crate::resource::RemoteResource;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Default)]
struct MockState {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    next_id: i64,
    forced_id: Option<i64>,
    calls: Vec<&'static str>,
    failing: HashSet<&'static str>,
    gates: HashMap<&'static str, oneshot::Receiver<()>>,
    update_reply: Option<Comment>,
}

pub(crate) struct MockResource {
    state: Mutex<MockState>,
}

impl MockResource {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 500,
                ..MockState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn with_posts(self, posts: Vec<Post>) -> Self {
        self.lock().posts = posts;
        self
    }

    pub(crate) fn with_comments(self, comments: Vec<Comment>) -> Self {
        self.lock().comments = comments;
        self
    }

    /// Make every call to `operation` answer with HTTP 500.
    pub(crate) fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Every created entity gets this id instead of a fresh one.
    pub(crate) fn force_id(&self, id: i64) {
        self.lock().forced_id = Some(id);
    }

    pub(crate) fn reply_to_update_with(&self, comment: Comment) {
        self.lock().update_reply = Some(comment);
    }

    /// The next call to `operation` waits until the returned sender fires.
    pub(crate) fn hold_next(&self, operation: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.insert(operation, rx);
        tx
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    async fn wait_gate(&self, operation: &'static str) {
        let gate = self.lock().gates.remove(operation);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    fn record(&self, operation: &'static str) -> Result<(), PostbookError> {
        let mut state = self.lock();
        state.calls.push(operation);
        if state.failing.contains(operation) {
            return Err(PostbookError::ServerError {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn next_id(&self) -> i64 {
        let mut state = self.lock();
        if let Some(id) = state.forced_id {
            return id;
        }
        state.next_id += 1;
        state.next_id
    }
}

#[async_trait]
impl RemoteResource for MockResource {
    async fn list_posts(&self) -> Result<Vec<Post>, PostbookError> {
        self.record("list_posts")?;
        Ok(self.lock().posts.clone())
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, PostbookError> {
        self.record("list_comments")?;
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post, PostbookError> {
        self.wait_gate("create_post").await;
        self.record("create_post")?;
        Ok(Post {
            id: self.next_id(),
            user_id: draft.user_id,
            title: draft.title.clone(),
            body: draft.body.clone(),
        })
    }

    async fn create_comment(&self, draft: &CommentDraft) -> Result<Comment, PostbookError> {
        self.wait_gate("create_comment").await;
        self.record("create_comment")?;
        Ok(Comment {
            id: self.next_id(),
            post_id: draft.post_id,
            name: draft.name.clone(),
            email: draft.email.clone(),
            body: draft.body.clone(),
        })
    }

    async fn update_comment(&self, id: i64, patch: &Comment) -> Result<Comment, PostbookError> {
        self.wait_gate("update_comment").await;
        self.record("update_comment")?;
        let reply = self.lock().update_reply.take();
        Ok(reply.unwrap_or_else(|| Comment {
            id,
            ..patch.clone()
        }))
    }

    async fn delete_comment(&self, _post_id: i64, _id: i64) -> Result<(), PostbookError> {
        self.wait_gate("delete_comment").await;
        self.record("delete_comment")
    }

    async fn get_user(&self, id: i64) -> Result<User, PostbookError> {
        self.record("get_user")?;
        Ok(user(id))
    }
}

pub(crate) fn user(id: i64) -> User {
    User {
        id,
        name: format!("User {}", id),
        username: format!("user{}", id),
        email: format!("user{}@example.com", id),
    }
}

pub(crate) fn post(id: i64) -> Post {
    Post {
        id,
        user_id: 1,
        title: format!("title {}", id),
        body: format!("body {}", id),
    }
}

pub(crate) fn comment(post_id: i64, id: i64) -> Comment {
    Comment {
        id,
        post_id,
        name: Some(format!("comment {}", id)),
        email: format!("author{}@example.com", id),
        body: format!("body {}", id),
    }
}
