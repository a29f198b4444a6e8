//! Observer abstraction
//!
//! Anything that wants to hear about job changes implements one of these
//! traits; closures work out of the box. Registration goes through
//! [`JobStore::subscribe`](super::JobStore::subscribe) and ends when the
//! returned [`Subscription`] is dropped or unsubscribed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use deckwatch_core::domain::job::JobId;

use super::JobStore;
use super::view::{JobView, ListView};

/// Receives every change to one job
pub trait JobObserver: Send + Sync {
    fn notify(&self, view: &JobView);
}

impl<F> JobObserver for F
where
    F: Fn(&JobView) + Send + Sync,
{
    fn notify(&self, view: &JobView) {
        self(view)
    }
}

/// Receives every change to the job list
pub trait ListObserver: Send + Sync {
    fn notify(&self, view: &ListView);
}

impl<F> ListObserver for F
where
    F: Fn(&ListView) + Send + Sync,
{
    fn notify(&self, view: &ListView) {
        self(view)
    }
}

/// A registered observer plus the switch its subscription flips on removal
pub(crate) struct Registration<O: ?Sized> {
    pub(crate) key: u64,
    active: Arc<AtomicBool>,
    observer: Box<O>,
}

impl<O: ?Sized> Registration<O> {
    pub(crate) fn new(key: u64, observer: Box<O>) -> (Arc<Self>, Arc<AtomicBool>) {
        let active = Arc::new(AtomicBool::new(true));
        let registration = Arc::new(Self {
            key,
            active: Arc::clone(&active),
            observer,
        });
        (registration, active)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Registration<dyn JobObserver> {
    pub(crate) fn deliver(&self, view: &JobView) {
        if self.is_active() {
            self.observer.notify(view);
        }
    }
}

impl Registration<dyn ListObserver> {
    pub(crate) fn deliver(&self, view: &ListView) {
        if self.is_active() {
            self.observer.notify(view);
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SubscriptionTarget {
    Job(JobId),
    List,
}

/// Handle for a registered observer
///
/// Unsubscribing (explicitly or by dropping the handle) takes effect before
/// the call returns: the observer is not invoked again, even if a response
/// for its job is already on the way.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: JobStore,
    target: SubscriptionTarget,
    key: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new(
        store: JobStore,
        target: SubscriptionTarget,
        key: u64,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            target,
            key,
            active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop receiving notifications
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.store.remove_observer(&self.target, self.key);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.target)
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}
