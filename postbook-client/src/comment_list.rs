use crate::config::FeedConfig;
use crate::error::PostbookError;
use crate::models::{Comment, CommentDraft};
use crate::post_list::dedup_by_id;
use crate::resource::RemoteResource;
use crate::session::UserContext;
use crate::sync::{
    ListEvent, Observers, Operation, SubmissionGuard, Submissions, SubmitPolicy, SubscriptionId,
    SyncState,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct CommentListState {
    comments: Vec<Comment>,
    window: usize,
}

impl CommentListState {
    fn visible_count(&self) -> usize {
        self.window.min(self.comments.len())
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.comments.iter().position(|c| c.id == id)
    }
}

/// Comments of a single post, revealed a few at a time.
///
/// The window starts at `comments_shown` and grows by `comments_increment`
/// on [`show_more`](Self::show_more). Only an explicit reload shrinks it.
/// Responses are applied to the list as it is when they arrive; a response
/// for a comment that has meanwhile disappeared is discarded.
#[derive(Clone)]
pub struct CommentListController {
    post_id: i64,
    remote: Arc<dyn RemoteResource>,
    user: UserContext,
    default_window: usize,
    increment: usize,
    policy: SubmitPolicy,
    state: Arc<Mutex<CommentListState>>,
    submissions: Arc<Submissions>,
    observers: Arc<Observers<ListEvent<Comment>>>,
}

impl CommentListController {
    pub fn new(
        post_id: i64,
        remote: Arc<dyn RemoteResource>,
        user: UserContext,
        config: &FeedConfig,
    ) -> Self {
        let state = CommentListState {
            window: config.comments_shown,
            ..CommentListState::default()
        };
        Self {
            post_id,
            remote,
            user,
            default_window: config.comments_shown,
            increment: config.comments_increment.max(1),
            policy: SubmitPolicy::default(),
            state: Arc::new(Mutex::new(state)),
            submissions: Arc::new(Submissions::default()),
            observers: Arc::new(Observers::default()),
        }
    }

    pub fn with_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, CommentListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ListEvent<Comment>) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Replace the collection and reset the window to its default.
    ///
    /// Comments belonging to another post and repeated ids are dropped.
    pub fn load_initial(&self, comments: Vec<Comment>) {
        let before = comments.len();
        let comments: Vec<Comment> = comments
            .into_iter()
            .filter(|c| c.post_id == self.post_id)
            .collect();
        if comments.len() != before {
            tracing::warn!(
                "Dropped {} comments not belonging to post {}",
                before - comments.len(),
                self.post_id
            );
        }
        let comments = dedup_by_id(comments);
        let len = comments.len();
        {
            let mut state = self.lock();
            state.comments = comments;
            state.window = self.default_window;
        }
        self.observers.notify_all(&[
            ListEvent::Loaded { len },
            ListEvent::WindowChanged {
                window: self.default_window,
            },
        ]);
    }

    pub async fn load(&self) -> Result<usize, PostbookError> {
        match self.remote.list_comments(self.post_id).await {
            Ok(comments) => {
                self.load_initial(comments);
                Ok(self.len())
            }
            Err(e) => Err(self.fail(Operation::Load, e)),
        }
    }

    /// Submit a new comment as the current user.
    ///
    /// The created comment is inserted right after the visible window and the
    /// window grows by one, so it shows up without pushing unseen comments
    /// further down.
    pub async fn create_comment(
        &self,
        name: Option<String>,
        body: impl Into<String>,
    ) -> Result<Comment, PostbookError> {
        let email = self.user.require()?.email.clone();
        let body = body.into();

        if body.trim().is_empty() {
            return Err(PostbookError::InvalidRequest(
                "Comment body is required".to_string(),
            ));
        }

        let submission = self.begin(Operation::Create)?;

        let draft = CommentDraft {
            post_id: self.post_id,
            email,
            name,
            body,
        };
        let created = match self.remote.create_comment(&draft).await {
            Ok(comment) => comment,
            Err(e) => return Err(self.fail(Operation::Create, e)),
        };

        let applied = {
            let mut state = self.lock();
            if created.post_id != self.post_id {
                Err(PostbookError::InconsistentResponse(format!(
                    "comment {} belongs to post {}, expected {}",
                    created.id, created.post_id, self.post_id
                )))
            } else if state.position(created.id).is_some() {
                Err(PostbookError::DuplicateId {
                    kind: "comment",
                    id: created.id,
                })
            } else {
                let index = state.window.min(state.comments.len());
                state.comments.insert(index, created.clone());
                state.window += 1;
                Ok((index, state.window))
            }
        };
        drop(submission);

        match applied {
            Ok((index, window)) => {
                tracing::info!(
                    "Comment created: id={}, post_id={}, index={}",
                    created.id,
                    self.post_id,
                    index
                );
                self.observers.notify_all(&[
                    ListEvent::Inserted {
                        index,
                        item: created.clone(),
                    },
                    ListEvent::WindowChanged { window },
                ]);
                Ok(created)
            }
            Err(e) => Err(self.fail(Operation::Create, e)),
        }
    }

    /// Change name and body of an existing comment.
    ///
    /// `name: None` keeps the current name. The id must be present locally;
    /// anything else is a caller bug and is reported as
    /// [`PostbookError::UnknownEntry`] without touching the network.
    pub async fn update_comment(
        &self,
        id: i64,
        name: Option<String>,
        body: impl Into<String>,
    ) -> Result<Comment, PostbookError> {
        self.user.require()?;
        let body = body.into();

        let existing = self.get(id).ok_or_else(|| {
            tracing::error!("Update requested for comment {} which is not in the list", id);
            PostbookError::UnknownEntry { kind: "comment", id }
        })?;

        if body.trim().is_empty() {
            return Err(PostbookError::InvalidRequest(
                "Comment body is required".to_string(),
            ));
        }

        let merged = Comment {
            name: name.or(existing.name.clone()),
            body,
            ..existing
        };

        let submission = self.begin(Operation::Update)?;

        let updated = match self.remote.update_comment(id, &merged).await {
            Ok(comment) => comment,
            Err(e) => return Err(self.fail(Operation::Update, e)),
        };

        let applied = {
            let mut state = self.lock();
            if updated.id != id || updated.post_id != self.post_id {
                Err(PostbookError::InconsistentResponse(format!(
                    "update of comment {} returned comment {} of post {}",
                    id, updated.id, updated.post_id
                )))
            } else {
                match state.position(id) {
                    Some(index) => {
                        state.comments[index] = updated.clone();
                        Ok(Some(index))
                    }
                    None => Ok(None),
                }
            }
        };
        drop(submission);

        match applied {
            Ok(Some(index)) => {
                tracing::info!("Comment updated: id={}, post_id={}", id, self.post_id);
                self.observers.notify(&ListEvent::Replaced {
                    index,
                    item: updated.clone(),
                });
                Ok(updated)
            }
            Ok(None) => {
                tracing::warn!("Comment {} was removed before its update arrived", id);
                self.observers.notify(&ListEvent::Discarded {
                    operation: Operation::Update,
                    id,
                });
                Ok(updated)
            }
            Err(e) => Err(self.fail(Operation::Update, e)),
        }
    }

    /// Delete a comment. Deleting an id that is not in the list still asks
    /// the resource and, on success, is a no-op locally.
    pub async fn delete_comment(&self, id: i64) -> Result<(), PostbookError> {
        self.user.require()?;
        let submission = self.begin(Operation::Delete)?;

        if let Err(e) = self.remote.delete_comment(self.post_id, id).await {
            return Err(self.fail(Operation::Delete, e));
        }

        let removed = {
            let mut state = self.lock();
            let before = state.comments.len();
            state.comments.retain(|c| c.id != id);
            state.comments.len() != before
        };
        drop(submission);

        if removed {
            tracing::info!("Comment deleted: id={}, post_id={}", id, self.post_id);
            self.observers.notify(&ListEvent::Removed { id });
        } else {
            tracing::debug!("Comment {} already absent after delete", id);
        }
        Ok(())
    }

    /// Reveal up to `comments_increment` more comments. Returns the number
    /// of comments now visible.
    pub fn show_more(&self) -> usize {
        let (window, visible, changed) = {
            let mut state = self.lock();
            let target = (state.window + self.increment).min(state.comments.len());
            let changed = target > state.window;
            if changed {
                state.window = target;
            }
            (state.window, state.visible_count(), changed)
        };
        if changed {
            self.observers.notify(&ListEvent::WindowChanged { window });
        }
        visible
    }

    /// The visible prefix of the list.
    pub fn visible_slice(&self) -> Vec<Comment> {
        let state = self.lock();
        state.comments[..state.visible_count()].to_vec()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.lock().comments.clone()
    }

    pub fn get(&self, id: i64) -> Option<Comment> {
        let state = self.lock();
        state.position(id).map(|i| state.comments[i].clone())
    }

    pub fn len(&self) -> usize {
        self.lock().comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window(&self) -> usize {
        self.lock().window
    }

    pub fn has_more(&self) -> bool {
        self.hidden_count() > 0
    }

    pub fn hidden_count(&self) -> usize {
        let state = self.lock();
        state.comments.len() - state.visible_count()
    }

    pub fn state(&self) -> SyncState {
        self.submissions.state()
    }

    /// Whether edit/delete should be offered for `comment`. Advisory only.
    pub fn can_modify(&self, comment: &Comment) -> bool {
        self.user.can_modify(comment)
    }

    fn begin(&self, operation: Operation) -> Result<SubmissionGuard, PostbookError> {
        let submission = self.submissions.begin(self.policy)?;
        self.observers.notify(&ListEvent::Submitting { operation });
        Ok(submission)
    }

    fn fail(&self, operation: Operation, error: PostbookError) -> PostbookError {
        tracing::error!(
            "Comment list of post {} {:?} failed: {}",
            self.post_id,
            operation,
            error
        );
        self.observers.notify(&ListEvent::Failed {
            operation,
            error: error.to_string(),
        });
        error
    }
}
