//! Shared plumbing for the list controllers: submission tracking, change
//! events and the observer registry.

use crate::error::PostbookError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Submitting,
}

/// What to do when a mutation is requested while another one for the same
/// list is still waiting for its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPolicy {
    /// Issue it anyway. Each response is reconciled against the list as it
    /// is when that response arrives, so arrival order wins.
    #[default]
    ArrivalOrder,
    /// Refuse with [`PostbookError::SubmissionInFlight`] before any request.
    RejectWhileSubmitting,
}

/// Change notification delivered to subscribers of a list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent<T> {
    Loaded { len: usize },
    Submitting { operation: Operation },
    Inserted { index: usize, item: T },
    Replaced { index: usize, item: T },
    Removed { id: i64 },
    /// A successful response that no longer applies to the current list.
    Discarded { operation: Operation, id: i64 },
    WindowChanged { window: usize },
    PageChanged { page: usize },
    Failed { operation: Operation, error: String },
}

/// In-flight mutation counter shared by every handle to one list.
#[derive(Debug, Default)]
pub(crate) struct Submissions {
    in_flight: AtomicUsize,
}

impl Submissions {
    /// Count a new submission. The returned guard releases it when dropped,
    /// including when the mutation future is dropped before its response.
    pub(crate) fn begin(
        self: &Arc<Self>,
        policy: SubmitPolicy,
    ) -> Result<SubmissionGuard, PostbookError> {
        match policy {
            SubmitPolicy::ArrivalOrder => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
            }
            SubmitPolicy::RejectWhileSubmitting => {
                if let Err(busy) =
                    self.in_flight
                        .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                {
                    tracing::warn!("Submission rejected: {} still in flight", busy);
                    return Err(PostbookError::SubmissionInFlight);
                }
            }
        }
        Ok(SubmissionGuard {
            submissions: Arc::clone(self),
        })
    }

    pub(crate) fn state(&self) -> SyncState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SyncState::Submitting
        } else {
            SyncState::Idle
        }
    }
}

#[derive(Debug)]
pub(crate) struct SubmissionGuard {
    submissions: Arc<Submissions>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        let _ = self.submissions.in_flight.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |n| n.checked_sub(1),
        );
    }
}

pub type SubscriptionId = u64;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Synchronous observer registry.
///
/// Callbacks run on the caller's task, in subscription order, before the
/// notifying call returns. They may subscribe or unsubscribe re-entrantly.
pub struct Observers<E> {
    inner: Mutex<ObserverList<E>>,
}

struct ObserverList<E> {
    next_id: SubscriptionId,
    callbacks: Vec<(SubscriptionId, Callback<E>)>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ObserverList {
                next_id: 0,
                callbacks: Vec::new(),
            }),
        }
    }
}

impl<E> Observers<E> {
    fn lock(&self) -> MutexGuard<'_, ObserverList<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut list = self.lock();
        let id = list.next_id;
        list.next_id += 1;
        list.callbacks.push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut list = self.lock();
        let before = list.callbacks.len();
        list.callbacks.retain(|(sid, _)| *sid != id);
        list.callbacks.len() != before
    }

    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> =
            self.lock().callbacks.iter().map(|(_, cb)| cb.clone()).collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn notify_all(&self, events: &[E]) {
        for event in events {
            self.notify(event);
        }
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.lock().callbacks.len())
            .finish()
    }
}
