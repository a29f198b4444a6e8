//! Job store
//!
//! The single authoritative, in-memory map from job id to the latest snapshot
//! the service reported. Every view of a job reads from here, so two views of
//! the same job never disagree.
//!
//! All mutation funnels through [`JobStore::upsert`], which replaces a
//! snapshot wholesale and then notifies that job's observers in call order.
//! Fetches are deduplicated: while a request for an id is outstanding, further
//! callers wait for the same response instead of issuing their own.
//!
//! List rows are kept apart from detail snapshots. The list endpoint returns
//! a trimmed row per job, so loading the list never replaces a detail
//! snapshot; the list view shows the detail snapshot for a row instead
//! whenever it is at least as far along.

mod observer;
mod view;

pub use observer::{JobObserver, ListObserver, Subscription};
pub use view::{JobView, ListView, RefreshNotice};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use deckwatch_client::{ClientError, JobTransport, Result};
use deckwatch_core::domain::job::{Job, JobId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use observer::{Registration, SubscriptionTarget};

type JobRegistration = Arc<Registration<dyn JobObserver>>;
type ListRegistration = Arc<Registration<dyn ListObserver>>;

type FetchOutcome = Option<Result<Arc<Job>>>;
type ListOutcome = Option<Result<Vec<Arc<Job>>>>;

/// Lock a mutex, carrying on if an observer panicked while it was held
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to the job cache
///
/// Cloning is cheap and every clone sees the same cache. Construct one per
/// application session; nothing in this crate holds a global instance.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    transport: Arc<dyn JobTransport>,
    state: Mutex<StoreState>,
    next_key: AtomicU64,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<JobId, Entry>,
    list: ListEntry,
    in_flight: HashMap<JobId, watch::Receiver<FetchOutcome>>,
    list_in_flight: Option<watch::Receiver<ListOutcome>>,
}

#[derive(Default)]
struct Entry {
    snapshot: Option<Arc<Job>>,
    notice: Option<RefreshNotice>,
    observers: Vec<JobRegistration>,
    /// Held while a change is applied and delivered, so observers see
    /// changes in the order they were made
    delivery: Arc<Mutex<()>>,
}

#[derive(Default)]
struct ListEntry {
    /// Rows as the list endpoint returned them, in server order
    rows: Option<Vec<Arc<Job>>>,
    notice: Option<RefreshNotice>,
    observers: Vec<ListRegistration>,
    delivery: Arc<Mutex<()>>,
}

impl Entry {
    fn view(&self, id: &JobId) -> JobView {
        JobView {
            id: id.clone(),
            job: self.snapshot.clone(),
            notice: self.notice.clone(),
        }
    }

    fn is_idle(&self) -> bool {
        self.snapshot.is_none() && self.notice.is_none() && self.observers.is_empty()
    }
}

impl StoreState {
    fn list_view(&self) -> ListView {
        let jobs = self
            .list
            .rows
            .iter()
            .flatten()
            .map(|row| self.freshest(row))
            .collect();

        ListView {
            jobs,
            notice: self.list.notice.clone(),
            loaded: self.list.rows.is_some(),
        }
    }

    /// The detail snapshot for a row, unless the row is further along
    fn freshest(&self, row: &Arc<Job>) -> Arc<Job> {
        match self.entries.get(&row.id).and_then(|e| e.snapshot.as_ref()) {
            Some(detail) if detail.status.rank() >= row.status.rank() => Arc::clone(detail),
            _ => Arc::clone(row),
        }
    }

    fn is_listed(&self, id: &JobId) -> bool {
        self.list
            .rows
            .as_ref()
            .is_some_and(|rows| rows.iter().any(|row| row.id == *id))
    }
}

impl JobStore {
    /// Creates an empty store that fetches through `transport`
    pub fn new(transport: Arc<dyn JobTransport>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                transport,
                state: Mutex::new(StoreState::default()),
                next_key: AtomicU64::new(1),
            }),
        }
    }

    pub fn transport(&self) -> Arc<dyn JobTransport> {
        Arc::clone(&self.inner.transport)
    }

    // =============================================================================
    // Reads
    // =============================================================================

    /// Current snapshot of a job; never triggers a fetch
    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        let state = lock(&self.inner.state);
        state.entries.get(id).and_then(|e| e.snapshot.clone())
    }

    /// Current view of a job (snapshot, notice, loading flag)
    pub fn view(&self, id: &JobId) -> JobView {
        let state = lock(&self.inner.state);
        match state.entries.get(id) {
            Some(entry) => entry.view(id),
            None => JobView {
                id: id.clone(),
                job: None,
                notice: None,
            },
        }
    }

    /// Current view of the job list
    pub fn list_view(&self) -> ListView {
        lock(&self.inner.state).list_view()
    }

    /// Number of live observers for a job
    pub fn subscriber_count(&self, id: &JobId) -> usize {
        let state = lock(&self.inner.state);
        state.entries.get(id).map_or(0, |e| e.observers.len())
    }

    // =============================================================================
    // Mutation
    // =============================================================================

    /// Replaces the stored snapshot for `job.id` and notifies its observers
    ///
    /// A snapshot that moves the status backwards is stored anyway (the
    /// service is the source of truth) and logged.
    pub fn upsert(&self, job: Job) -> Arc<Job> {
        let job = self.apply_snapshot(job);
        if self.listed(&job.id) {
            self.deliver_list();
        }
        job
    }

    fn apply_snapshot(&self, job: Job) -> Arc<Job> {
        let id = job.id.clone();
        let delivery = self.job_delivery(&id);
        let _turn = lock(&delivery);

        let job = Arc::new(job);
        let (view, observers) = {
            let mut state = lock(&self.inner.state);
            let entry = state.entries.entry(id.clone()).or_default();

            if let Some(previous) = &entry.snapshot {
                if previous.status.is_regression_to(job.status) {
                    warn!(
                        "Job {} went from {} back to {}; keeping the newer snapshot",
                        id, previous.status, job.status
                    );
                } else if previous.status != job.status {
                    info!("Job {} is now {}", id, job.status);
                }
            }

            for issue in job.consistency_issues() {
                warn!("Job {} snapshot is inconsistent: {}", id, issue);
            }

            entry.snapshot = Some(Arc::clone(&job));
            entry.notice = None;
            (entry.view(&id), entry.observers.clone())
        };

        for observer in &observers {
            observer.deliver(&view);
        }

        job
    }

    /// Records a notice for a job and notifies its observers
    ///
    /// The stored snapshot, if any, is kept.
    pub fn set_notice(&self, id: &JobId, notice: RefreshNotice) {
        self.update_notice(id, Some(notice));
    }

    /// Removes a job's notice, notifying observers if there was one
    pub fn clear_notice(&self, id: &JobId) {
        self.update_notice(id, None);
    }

    fn update_notice(&self, id: &JobId, notice: Option<RefreshNotice>) {
        let delivery = self.job_delivery(id);
        let _turn = lock(&delivery);

        let delivered = {
            let mut state = lock(&self.inner.state);
            let entry = state.entries.entry(id.clone()).or_default();
            if entry.notice == notice {
                None
            } else {
                entry.notice = notice;
                Some((entry.view(id), entry.observers.clone()))
            }
        };

        if let Some((view, observers)) = delivered {
            for observer in &observers {
                observer.deliver(&view);
            }
        }
    }

    /// Records a notice for the job list and notifies list observers
    pub fn set_list_notice(&self, notice: RefreshNotice) {
        self.update_list_notice(Some(notice));
    }

    pub fn clear_list_notice(&self) {
        self.update_list_notice(None);
    }

    fn update_list_notice(&self, notice: Option<RefreshNotice>) {
        let delivery = self.list_delivery();
        let _turn = lock(&delivery);

        let delivered = {
            let mut state = lock(&self.inner.state);
            if state.list.notice == notice {
                None
            } else {
                state.list.notice = notice;
                Some((state.list_view(), state.list.observers.clone()))
            }
        };

        if let Some((view, observers)) = delivered {
            for observer in &observers {
                observer.deliver(&view);
            }
        }
    }

    /// Drops a job's snapshot and notice
    ///
    /// Observers stay registered and are told the job is loading again.
    pub fn evict(&self, id: &JobId) {
        let delivery = self.job_delivery(id);
        let _turn = lock(&delivery);

        let delivered = {
            let mut state = lock(&self.inner.state);
            let Some(entry) = state.entries.get_mut(id) else {
                return;
            };
            entry.snapshot = None;
            entry.notice = None;

            if entry.is_idle() {
                state.entries.remove(id);
                None
            } else {
                Some((entry.view(id), entry.observers.clone()))
            }
        };

        debug!("Evicted job {}", id);
        if let Some((view, observers)) = delivered {
            for observer in &observers {
                observer.deliver(&view);
            }
        }
    }

    /// Evicts every job and forgets the list
    pub fn clear(&self) {
        let ids: Vec<JobId> = lock(&self.inner.state).entries.keys().cloned().collect();
        for id in &ids {
            self.evict(id);
        }

        let delivery = self.list_delivery();
        let _turn = lock(&delivery);
        let (view, observers) = {
            let mut state = lock(&self.inner.state);
            state.list.rows = None;
            state.list.notice = None;
            (state.list_view(), state.list.observers.clone())
        };
        for observer in &observers {
            observer.deliver(&view);
        }
    }

    // =============================================================================
    // Subscriptions
    // =============================================================================

    /// Registers an observer for one job
    ///
    /// The observer is called right away when a snapshot or notice is already
    /// stored, then after every change. Observers must not call `upsert` or
    /// `subscribe` for the same job from inside `notify`.
    pub fn subscribe(&self, id: &JobId, observer: impl JobObserver + 'static) -> Subscription {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let (registration, active) =
            Registration::<dyn JobObserver>::new(key, Box::new(observer));

        let delivery = self.job_delivery(id);
        let _turn = lock(&delivery);

        let initial = {
            let mut state = lock(&self.inner.state);
            let entry = state.entries.entry(id.clone()).or_default();
            entry.observers.push(Arc::clone(&registration));
            (entry.snapshot.is_some() || entry.notice.is_some()).then(|| entry.view(id))
        };

        debug!("Subscribed observer {} to job {}", key, id);
        if let Some(view) = initial {
            registration.deliver(&view);
        }

        Subscription::new(self.clone(), SubscriptionTarget::Job(id.clone()), key, active)
    }

    /// Registers an observer for the job list
    ///
    /// Called right away when the list has been loaded, then after every
    /// list refresh and every change to a listed job.
    pub fn subscribe_list(&self, observer: impl ListObserver + 'static) -> Subscription {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let (registration, active) =
            Registration::<dyn ListObserver>::new(key, Box::new(observer));

        let delivery = self.list_delivery();
        let _turn = lock(&delivery);

        let initial = {
            let mut state = lock(&self.inner.state);
            state.list.observers.push(Arc::clone(&registration));
            (state.list.rows.is_some() || state.list.notice.is_some()).then(|| state.list_view())
        };

        if let Some(view) = initial {
            registration.deliver(&view);
        }

        Subscription::new(self.clone(), SubscriptionTarget::List, key, active)
    }

    pub(crate) fn remove_observer(&self, target: &SubscriptionTarget, key: u64) {
        let mut state = lock(&self.inner.state);
        match target {
            SubscriptionTarget::Job(id) => {
                if let Some(entry) = state.entries.get_mut(id) {
                    entry.observers.retain(|o| o.key != key);
                    if entry.is_idle() {
                        state.entries.remove(id);
                    }
                }
                debug!("Unsubscribed observer {} from job {}", key, id);
            }
            SubscriptionTarget::List => {
                state.list.observers.retain(|o| o.key != key);
                debug!("Unsubscribed list observer {}", key);
            }
        }
    }

    // =============================================================================
    // Fetching
    // =============================================================================

    /// Fetches a job, joining the outstanding request for it if there is one
    ///
    /// The request itself runs on its own task: if every caller goes away the
    /// response is still applied to the store when it arrives. A not-found
    /// answer is recorded as [`RefreshNotice::NotFound`].
    pub async fn fetch(&self, id: &JobId) -> Result<Arc<Job>> {
        let mut rx = {
            let mut state = lock(&self.inner.state);
            match state.in_flight.get(id) {
                Some(rx) => {
                    debug!("Joining in-flight fetch for job {}", id);
                    rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight.insert(id.clone(), rx.clone());
                    self.spawn_fetch(id.clone(), tx);
                    rx
                }
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ClientError::Internal(format!("fetch for job {} was abandoned", id)))?;

        outcome
            .as_ref()
            .cloned()
            .unwrap_or_else(|| Err(ClientError::Internal(format!("fetch for job {} produced no result", id))))
    }

    fn spawn_fetch(&self, id: JobId, tx: watch::Sender<FetchOutcome>) {
        let store = self.clone();

        tokio::spawn(async move {
            debug!("Fetching job {}", id);
            let outcome = match store.inner.transport.get_job(&id).await {
                Ok(job) => Ok(store.upsert(job)),
                Err(e) => {
                    if e.is_not_found() {
                        store.set_notice(&id, RefreshNotice::NotFound);
                    }
                    Err(e)
                }
            };

            lock(&store.inner.state).in_flight.remove(&id);
            // No receivers left is fine: the store is already updated
            let _ = tx.send(Some(outcome));
        });
    }

    /// Fetches the job list, joining the outstanding request if there is one
    ///
    /// The rows replace the previous list and list observers are notified
    /// once. Detail snapshots are left alone; the returned jobs are the ones
    /// the list view shows.
    pub async fn refresh_list(&self) -> Result<Vec<Arc<Job>>> {
        let mut rx = {
            let mut state = lock(&self.inner.state);
            match &state.list_in_flight {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    state.list_in_flight = Some(rx.clone());
                    self.spawn_list_fetch(tx);
                    rx
                }
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ClientError::Internal("list fetch was abandoned".to_string()))?;

        outcome
            .as_ref()
            .cloned()
            .unwrap_or_else(|| Err(ClientError::Internal("list fetch produced no result".to_string())))
    }

    fn spawn_list_fetch(&self, tx: watch::Sender<ListOutcome>) {
        let store = self.clone();

        tokio::spawn(async move {
            debug!("Fetching job list");
            let outcome = match store.inner.transport.list_jobs().await {
                Ok(jobs) => Ok(store.apply_list(jobs)),
                Err(e) => Err(e),
            };

            lock(&store.inner.state).list_in_flight = None;
            let _ = tx.send(Some(outcome));
        });
    }

    fn apply_list(&self, jobs: Vec<Job>) -> Vec<Arc<Job>> {
        debug!("Loaded {} listed jobs", jobs.len());
        let rows = jobs.into_iter().map(Arc::new).collect();

        let delivery = self.list_delivery();
        let _turn = lock(&delivery);

        let (view, observers) = {
            let mut state = lock(&self.inner.state);
            state.list.rows = Some(rows);
            state.list.notice = None;
            (state.list_view(), state.list.observers.clone())
        };

        for observer in &observers {
            observer.deliver(&view);
        }

        view.jobs
    }

    // =============================================================================
    // Delivery
    // =============================================================================

    fn job_delivery(&self, id: &JobId) -> Arc<Mutex<()>> {
        let mut state = lock(&self.inner.state);
        Arc::clone(&state.entries.entry(id.clone()).or_default().delivery)
    }

    fn list_delivery(&self) -> Arc<Mutex<()>> {
        Arc::clone(&lock(&self.inner.state).list.delivery)
    }

    fn listed(&self, id: &JobId) -> bool {
        lock(&self.inner.state).is_listed(id)
    }

    fn deliver_list(&self) {
        let delivery = self.list_delivery();
        let _turn = lock(&delivery);

        let (view, observers) = {
            let state = lock(&self.inner.state);
            (state.list_view(), state.list.observers.clone())
        };

        for observer in &observers {
            observer.deliver(&view);
        }
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("JobStore")
            .field("jobs", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}
