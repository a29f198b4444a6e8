//! View binder
//!
//! Connects a rendering surface to the store and the poller. While a binding
//! is alive the surface is re-rendered on every change and the job keeps
//! being polled; once the job is terminal (or unknown to the service), or
//! the binding is dropped, polling is released.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use deckwatch_core::domain::job::JobId;
use tracing::debug;

use crate::poller::{PollLease, PollTarget, Poller};
use crate::store::{JobObserver, JobStore, JobView, ListObserver, ListView, Subscription, lock};

/// Renders one job
///
/// Implementations must not block: they run on the thread that applied the
/// change.
pub trait JobSurface: Send + Sync {
    fn render(&self, view: &JobView);
}

/// Renders the job list
pub trait ListSurface: Send + Sync {
    fn render(&self, view: &ListView);
}

type LeaseSlot = Arc<Mutex<Option<PollLease>>>;

/// Binds surfaces to jobs
#[derive(Clone)]
pub struct ViewBinder {
    store: JobStore,
    poller: Poller,
    detail_interval: Duration,
    list_interval: Duration,
}

impl ViewBinder {
    pub fn new(
        store: JobStore,
        poller: Poller,
        detail_interval: Duration,
        list_interval: Duration,
    ) -> Self {
        Self {
            store,
            poller,
            detail_interval,
            list_interval,
        }
    }

    /// Binds `surface` to the job with `id`
    ///
    /// The surface is rendered right away if the job is already known.
    /// Otherwise a fetch is started (shared with any other caller fetching
    /// the same job) and the surface renders when it lands.
    pub fn bind_job(&self, id: &JobId, surface: Arc<dyn JobSurface>) -> JobBinding {
        let lease: LeaseSlot = Arc::new(Mutex::new(None));
        let subscription = self.store.subscribe(
            id,
            JobSurfaceObserver {
                surface,
                lease: Arc::clone(&lease),
            },
        );

        let view = self.store.view(id);
        if !finished(&view) {
            let acquired = self
                .poller
                .acquire(PollTarget::Job(id.clone()), self.detail_interval);
            *lock(&lease) = Some(acquired);

            // The job may have finished while the lease was being acquired
            if finished(&self.store.view(id)) {
                let released = lock(&lease).take();
                drop(released);
            }
        }

        if view.is_loading() {
            let store = self.store.clone();
            let id = id.clone();
            tokio::spawn(async move {
                if let Err(e) = store.fetch(&id).await {
                    debug!("Initial fetch of job {} failed: {}", id, e);
                }
            });
        }

        debug!("Bound surface to job {}", id);
        JobBinding {
            id: id.clone(),
            subscription: Some(subscription),
            lease,
        }
    }

    /// Binds `surface` to the job list
    ///
    /// Polling is released once every listed job is terminal, unless the
    /// poller keeps settled lists on a slower interval.
    pub fn bind_list(&self, surface: Arc<dyn ListSurface>) -> ListBinding {
        let lease: LeaseSlot = Arc::new(Mutex::new(None));
        let release_when_settled = self.poller.policy().settled_interval.is_none();
        let subscription = self.store.subscribe_list(ListSurfaceObserver {
            surface,
            lease: Arc::clone(&lease),
            release_when_settled,
        });

        let view = self.store.list_view();
        if !(release_when_settled && settled(&view)) {
            let acquired = self.poller.acquire(PollTarget::List, self.list_interval);
            *lock(&lease) = Some(acquired);

            if release_when_settled && settled(&self.store.list_view()) {
                let released = lock(&lease).take();
                drop(released);
            }
        }

        if view.is_loading() {
            let store = self.store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.refresh_list().await {
                    debug!("Initial list fetch failed: {}", e);
                }
            });
        }

        debug!("Bound surface to job list");
        ListBinding {
            subscription: Some(subscription),
            lease,
        }
    }
}

fn finished(view: &JobView) -> bool {
    view.is_terminal() || view.is_not_found()
}

fn settled(view: &ListView) -> bool {
    !view.is_loading() && view.all_terminal()
}

struct JobSurfaceObserver {
    surface: Arc<dyn JobSurface>,
    lease: LeaseSlot,
}

impl JobObserver for JobSurfaceObserver {
    fn notify(&self, view: &JobView) {
        if finished(view) {
            let released = lock(&self.lease).take();
            drop(released);
        }
        self.surface.render(view);
    }
}

struct ListSurfaceObserver {
    surface: Arc<dyn ListSurface>,
    lease: LeaseSlot,
    release_when_settled: bool,
}

impl ListObserver for ListSurfaceObserver {
    fn notify(&self, view: &ListView) {
        if self.release_when_settled && settled(view) {
            let released = lock(&self.lease).take();
            drop(released);
        }
        self.surface.render(view);
    }
}

/// A live surface-to-job binding
///
/// Dropping it (or calling [`JobBinding::unbind`]) stops rendering first and
/// then releases polling.
#[must_use = "dropping a JobBinding unbinds immediately"]
pub struct JobBinding {
    id: JobId,
    subscription: Option<Subscription>,
    lease: LeaseSlot,
}

impl JobBinding {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Whether this binding still holds a poll lease
    pub fn is_polling(&self) -> bool {
        lock(&self.lease).is_some()
    }

    pub fn unbind(self) {}
}

impl Drop for JobBinding {
    fn drop(&mut self) {
        drop(self.subscription.take());
        let released = lock(&self.lease).take();
        drop(released);
        debug!("Unbound surface from job {}", self.id);
    }
}

impl std::fmt::Debug for JobBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobBinding")
            .field("id", &self.id)
            .field("polling", &self.is_polling())
            .finish()
    }
}

/// A live surface-to-list binding
#[must_use = "dropping a ListBinding unbinds immediately"]
pub struct ListBinding {
    subscription: Option<Subscription>,
    lease: LeaseSlot,
}

impl ListBinding {
    /// Whether this binding still holds a poll lease
    pub fn is_polling(&self) -> bool {
        lock(&self.lease).is_some()
    }

    pub fn unbind(self) {}
}

impl Drop for ListBinding {
    fn drop(&mut self) {
        drop(self.subscription.take());
        let released = lock(&self.lease).take();
        drop(released);
        debug!("Unbound surface from job list");
    }
}

impl std::fmt::Debug for ListBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListBinding")
            .field("polling", &self.is_polling())
            .finish()
    }
}
