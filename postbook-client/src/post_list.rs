use crate::config::FeedConfig;
use crate::error::PostbookError;
use crate::models::{Identified, Post, PostDraft};
use crate::resource::RemoteResource;
use crate::session::UserContext;
use crate::sync::{
    ListEvent, Observers, Operation, SubmissionGuard, Submissions, SubmitPolicy, SubscriptionId,
    SyncState,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct PostListState {
    posts: Vec<Post>,
    page: usize,
}

impl PostListState {
    fn last_page(&self, page_size: usize) -> usize {
        self.posts.len().saturating_sub(1) / page_size
    }
}

/// Paginated, newest-first feed of posts.
///
/// Cloning yields another handle to the same list.
#[derive(Clone)]
pub struct PostListController {
    remote: Arc<dyn RemoteResource>,
    user: UserContext,
    page_size: usize,
    policy: SubmitPolicy,
    state: Arc<Mutex<PostListState>>,
    submissions: Arc<Submissions>,
    observers: Arc<Observers<ListEvent<Post>>>,
}

impl PostListController {
    pub fn new(remote: Arc<dyn RemoteResource>, user: UserContext, config: &FeedConfig) -> Self {
        Self {
            remote,
            user,
            page_size: config.page_size.max(1),
            policy: SubmitPolicy::default(),
            state: Arc::new(Mutex::new(PostListState::default())),
            submissions: Arc::new(Submissions::default()),
            observers: Arc::new(Observers::default()),
        }
    }

    pub fn with_policy(mut self, policy: SubmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, PostListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ListEvent<Post>) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Replace the collection wholesale and go back to the first page.
    pub fn load_initial(&self, posts: Vec<Post>) {
        let posts = dedup_by_id(posts);
        let len = posts.len();
        {
            let mut state = self.lock();
            state.posts = posts;
            state.page = 0;
        }
        tracing::debug!("Post list loaded with {} posts", len);
        self.observers.notify_all(&[
            ListEvent::Loaded { len },
            ListEvent::PageChanged { page: 0 },
        ]);
    }

    /// Fetch the feed from the resource and install it.
    pub async fn load(&self) -> Result<usize, PostbookError> {
        match self.remote.list_posts().await {
            Ok(posts) => {
                self.load_initial(posts);
                Ok(self.len())
            }
            Err(e) => Err(self.fail(Operation::Load, e)),
        }
    }

    pub async fn create_post(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Post, PostbookError> {
        let user_id = self.user.require()?.id;
        let title = title.into();
        let body = body.into();

        if title.trim().is_empty() || body.trim().is_empty() {
            return Err(PostbookError::InvalidRequest(
                "Title and body are required".to_string(),
            ));
        }

        let submission = self.begin(Operation::Create)?;

        let draft = PostDraft {
            user_id,
            title,
            body,
        };
        let created = match self.remote.create_post(&draft).await {
            Ok(post) => post,
            Err(e) => return Err(self.fail(Operation::Create, e)),
        };

        let result = {
            let mut state = self.lock();
            if state.posts.iter().any(|p| p.id == created.id) {
                Err(PostbookError::DuplicateId {
                    kind: "post",
                    id: created.id,
                })
            } else {
                state.posts.insert(0, created.clone());
                state.page = 0;
                Ok(())
            }
        };
        drop(submission);

        match result {
            Ok(()) => {
                tracing::info!("Post created: id={}, user_id={}", created.id, user_id);
                self.observers.notify_all(&[
                    ListEvent::Inserted {
                        index: 0,
                        item: created.clone(),
                    },
                    ListEvent::PageChanged { page: 0 },
                ]);
                Ok(created)
            }
            Err(e) => Err(self.fail(Operation::Create, e)),
        }
    }

    pub fn next_page(&self) -> usize {
        self.move_page(|page| page + 1)
    }

    pub fn prev_page(&self) -> usize {
        self.move_page(|page| page.saturating_sub(1))
    }

    /// Move to `page`, clamped to the pages that hold at least one post.
    pub fn go_to_page(&self, page: usize) -> usize {
        self.move_page(|_| page)
    }

    /// Reads the current page, picks the target and stores it under one lock.
    fn move_page(&self, to: impl FnOnce(usize) -> usize) -> usize {
        let (page, changed) = {
            let mut state = self.lock();
            let target = to(state.page).min(state.last_page(self.page_size));
            let changed = target != state.page;
            state.page = target;
            (target, changed)
        };
        if changed {
            self.observers.notify(&ListEvent::PageChanged { page });
        }
        page
    }

    /// Posts on the current page.
    pub fn visible_slice(&self) -> Vec<Post> {
        let state = self.lock();
        let start = (state.page * self.page_size).min(state.posts.len());
        let end = (start + self.page_size).min(state.posts.len());
        state.posts[start..end].to_vec()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn page(&self) -> usize {
        self.lock().page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.lock().last_page(self.page_size) + 1
    }

    pub fn state(&self) -> SyncState {
        self.submissions.state()
    }

    fn begin(&self, operation: Operation) -> Result<SubmissionGuard, PostbookError> {
        let submission = self.submissions.begin(self.policy)?;
        self.observers.notify(&ListEvent::Submitting { operation });
        Ok(submission)
    }

    fn fail(&self, operation: Operation, error: PostbookError) -> PostbookError {
        tracing::error!("Post list {:?} failed: {}", operation, error);
        self.observers.notify(&ListEvent::Failed {
            operation,
            error: error.to_string(),
        });
        error
    }
}

pub(crate) fn dedup_by_id<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    let before = items.len();
    let items: Vec<T> = items.into_iter().filter(|i| seen.insert(i.id())).collect();
    if items.len() != before {
        tracing::warn!("Dropped {} entries with duplicate ids", before - items.len());
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{post, user, MockResource};
    use std::time::Duration;

    fn feed(remote: Arc<MockResource>, user: UserContext, page_size: usize) -> PostListController {
        let config = FeedConfig {
            page_size,
            ..FeedConfig::default()
        };
        PostListController::new(remote, user, &config)
    }

    fn record(controller: &PostListController) -> Arc<Mutex<Vec<ListEvent<Post>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        controller.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[tokio::test]
    async fn created_post_is_prepended_and_page_reset() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote.clone(), UserContext::signed_in(user(1)), 10);
        controller.load_initial(vec![post(1)]);

        let created = controller.create_post("Hello", "World").await.unwrap();

        assert_eq!(controller.posts(), vec![created.clone(), post(1)]);
        assert_eq!(created.user_id, 1);
        assert_eq!(controller.page(), 0);
        assert_eq!(controller.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn create_post_moves_back_to_first_page() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote, UserContext::signed_in(user(1)), 2);
        controller.load_initial((1..=5).map(post).collect());
        controller.next_page();
        assert_eq!(controller.page(), 1);

        let created = controller.create_post("t", "b").await.unwrap();

        assert_eq!(controller.page(), 0);
        assert_eq!(controller.visible_slice()[0], created);
    }

    #[tokio::test]
    async fn anonymous_create_makes_no_request() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote.clone(), UserContext::anonymous(), 10);
        controller.load_initial(vec![post(1)]);

        let err = controller.create_post("t", "b").await.unwrap_err();

        assert!(err.is_authorization_required());
        assert!(remote.calls().is_empty());
        assert_eq!(controller.posts(), vec![post(1)]);
    }

    #[tokio::test]
    async fn blank_title_is_rejected_locally() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote.clone(), UserContext::signed_in(user(1)), 10);

        let err = controller.create_post("   ", "b").await.unwrap_err();

        assert!(matches!(err, PostbookError::InvalidRequest(_)));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_create_leaves_state_and_reports() {
        let remote = Arc::new(MockResource::new());
        remote.fail_on("create_post");
        let controller = feed(remote.clone(), UserContext::signed_in(user(1)), 10);
        controller.load_initial(vec![post(1)]);
        let events = record(&controller);

        let err = controller.create_post("t", "b").await.unwrap_err();

        assert!(matches!(err, PostbookError::ServerError { status: 500, .. }));
        assert_eq!(controller.posts(), vec![post(1)]);
        assert_eq!(controller.state(), SyncState::Idle);
        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(ListEvent::Failed {
                operation: Operation::Create,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn duplicate_id_from_resource_is_rejected() {
        let remote = Arc::new(MockResource::new());
        remote.force_id(1);
        let controller = feed(remote, UserContext::signed_in(user(1)), 10);
        controller.load_initial(vec![post(1)]);

        let err = controller.create_post("t", "b").await.unwrap_err();

        assert!(matches!(err, PostbookError::DuplicateId { id: 1, .. }));
        assert_eq!(controller.len(), 1);
    }

    #[tokio::test]
    async fn successive_creates_grow_by_one_with_unique_ids() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote, UserContext::signed_in(user(1)), 10);
        controller.load_initial(vec![post(1), post(2)]);

        for n in 0..5 {
            controller.create_post(format!("t{}", n), "b").await.unwrap();
            assert_eq!(controller.len(), 3 + n);
        }

        let ids: HashSet<i64> = controller.posts().iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), controller.len());
    }

    #[test]
    fn pagination_is_clamped() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 3);
        controller.load_initial((1..=7).map(post).collect());

        assert_eq!(controller.prev_page(), 0);
        assert_eq!(controller.next_page(), 1);
        assert_eq!(controller.next_page(), 2);
        assert_eq!(controller.next_page(), 2);
        assert_eq!(controller.page_count(), 3);

        let ids: Vec<i64> = controller.visible_slice().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7]);
        assert_eq!(controller.go_to_page(99), 2);
    }

    #[test]
    fn empty_feed_stays_on_first_page() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 3);

        assert_eq!(controller.next_page(), 0);
        assert!(controller.visible_slice().is_empty());
        assert_eq!(controller.page_count(), 1);
    }

    #[test]
    fn exact_multiple_of_page_size_has_no_empty_page() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 2);
        controller.load_initial((1..=4).map(post).collect());

        controller.go_to_page(5);

        assert_eq!(controller.page(), 1);
        assert_eq!(controller.visible_slice().len(), 2);
    }

    #[test]
    fn load_initial_resets_page_and_drops_duplicates() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 2);
        controller.load_initial((1..=6).map(post).collect());
        controller.next_page();

        controller.load_initial(vec![post(1), post(2), post(1)]);

        assert_eq!(controller.page(), 0);
        assert_eq!(controller.len(), 2);
    }

    #[test]
    fn page_change_notifies_only_on_change() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 2);
        controller.load_initial((1..=3).map(post).collect());
        let events = record(&controller);

        controller.next_page();
        controller.next_page();

        assert_eq!(
            *events.lock().unwrap(),
            vec![ListEvent::PageChanged { page: 1 }]
        );
    }

    #[tokio::test]
    async fn load_fetches_from_resource() {
        let remote = Arc::new(MockResource::new().with_posts(vec![post(1), post(2)]));
        let controller = feed(remote, UserContext::anonymous(), 10);

        assert_eq!(controller.load().await.unwrap(), 2);
        assert_eq!(controller.visible_slice().len(), 2);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_posts() {
        let remote = Arc::new(MockResource::new());
        remote.fail_on("list_posts");
        let controller = feed(remote, UserContext::anonymous(), 10);
        controller.load_initial(vec![post(9)]);

        assert!(controller.load().await.is_err());
        assert_eq!(controller.posts(), vec![post(9)]);
    }

    #[tokio::test]
    async fn reject_policy_refuses_overlapping_create() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote.clone(), UserContext::signed_in(user(1)), 10)
            .with_policy(SubmitPolicy::RejectWhileSubmitting);
        let _pending = controller.submissions.begin(SubmitPolicy::ArrivalOrder).unwrap();

        let err = controller.create_post("t", "b").await.unwrap_err();

        assert!(matches!(err, PostbookError::SubmissionInFlight));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn abandoned_create_does_not_block_the_feed() {
        let remote = Arc::new(MockResource::new());
        let controller = feed(remote.clone(), UserContext::signed_in(user(1)), 10)
            .with_policy(SubmitPolicy::RejectWhileSubmitting);
        let _release = remote.hold_next("create_post");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), controller.create_post("t", "b")).await;

        assert!(abandoned.is_err());
        assert_eq!(controller.state(), SyncState::Idle);
        assert!(controller.posts().is_empty());
        let created = controller.create_post("again", "b").await.unwrap();
        assert_eq!(controller.posts(), vec![created]);
    }

    #[test]
    fn paging_from_several_handles_loses_no_step() {
        let controller = feed(Arc::new(MockResource::new()), UserContext::anonymous(), 1);
        controller.load_initial((1..=100).map(post).collect());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let handle = controller.clone();
                scope.spawn(move || {
                    for _ in 0..10 {
                        handle.next_page();
                    }
                });
            }
        });

        assert_eq!(controller.page(), 40);
    }
}
