//! Poller
//!
//! Drives repeated refresh of a job (or of the job list) while anything is
//! interested in it. Each target runs an explicit state machine:
//!
//! ```text
//! Idle -> Scheduled(delay) -> InFlight -> Scheduled(next) -> ... -> Stopped
//! ```
//!
//! Interest is expressed through [`PollLease`]s. The target polls at the
//! shortest interval among its live leases and stops when the last lease is
//! released, when it reaches a terminal state, or when the service says it
//! does not exist.

pub mod policy;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deckwatch_client::{ClientError, Result};
use deckwatch_core::domain::job::JobId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::{JobStore, RefreshNotice, lock};
use policy::{IntervalPolicy, PollOutcome};

/// What a poller refreshes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PollTarget {
    Job(JobId),
    List,
}

impl std::fmt::Display for PollTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollTarget::Job(id) => write!(f, "job {}", id),
            PollTarget::List => write!(f, "job list"),
        }
    }
}

/// Polling state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Leased but the first poll has not been scheduled yet
    Idle,
    /// Waiting this long before the next fetch
    Scheduled(Duration),
    /// A fetch is outstanding
    InFlight,
    /// Not polling; a new lease may start it again
    Stopped,
}

impl PollState {
    pub fn is_active(&self) -> bool {
        !matches!(self, PollState::Stopped)
    }
}

/// Shared handle to the polling engine
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    store: JobStore,
    policy: IntervalPolicy,
    schedules: Mutex<HashMap<PollTarget, Schedule>>,
    next_lease: AtomicU64,
}

struct Schedule {
    state: PollState,
    /// Requested interval per live lease
    leases: BTreeMap<u64, Duration>,
    task: Option<JoinHandle<()>>,
    polls: u64,
    consecutive_failures: u32,
    /// Bumped whenever the running task is replaced or cancelled, so a
    /// superseded task can tell it no longer owns the schedule
    generation: u64,
    next_delay: Option<Duration>,
}

impl Schedule {
    fn new() -> Self {
        Self {
            state: PollState::Idle,
            leases: BTreeMap::new(),
            task: None,
            polls: 0,
            consecutive_failures: 0,
            generation: 0,
            next_delay: None,
        }
    }

    /// Effective interval: the shortest one any lease asked for
    fn interval(&self) -> Option<Duration> {
        self.leases.values().min().copied()
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
        self.next_delay = None;
        self.consecutive_failures = 0;
        self.state = PollState::Stopped;
    }
}

impl Poller {
    pub fn new(store: JobStore, policy: IntervalPolicy) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                store,
                policy,
                schedules: Mutex::new(HashMap::new()),
                next_lease: AtomicU64::new(1),
            }),
        }
    }

    pub fn policy(&self) -> &IntervalPolicy {
        &self.inner.policy
    }

    /// Registers interest in `target`, polling it every `interval`
    ///
    /// Starts polling unless the target is already polling or already known
    /// to be terminal. A shorter interval than the current one takes effect
    /// immediately. Must be called from within a tokio runtime.
    pub fn acquire(&self, target: PollTarget, interval: Duration) -> PollLease {
        let interval = self.inner.policy.clamp(interval);
        let settled = self.is_settled(&target);
        let id = self.inner.next_lease.fetch_add(1, Ordering::Relaxed);

        let mut schedules = lock(&self.inner.schedules);
        let schedule = schedules.entry(target.clone()).or_insert_with(Schedule::new);
        let previous = schedule.interval();
        schedule.leases.insert(id, interval);

        if schedule.task.is_none() {
            if settled {
                debug!("Not polling {}: already settled", target);
                schedule.state = PollState::Stopped;
            } else {
                info!("Polling {} every {:?}", target, interval);
                self.start(&target, schedule);
            }
        } else if previous.is_some_and(|p| interval < p)
            && matches!(schedule.state, PollState::Scheduled(_))
        {
            debug!("Rescheduling {} at {:?}", target, interval);
            self.start(&target, schedule);
        }

        PollLease {
            poller: self.clone(),
            target,
            id,
            released: false,
        }
    }

    /// Current state of a target; `Idle` for one never leased
    pub fn state(&self, target: &PollTarget) -> PollState {
        lock(&self.inner.schedules)
            .get(target)
            .map_or(PollState::Idle, |s| s.state)
    }

    /// Number of fetches the poller has issued for a target
    pub fn poll_count(&self, target: &PollTarget) -> u64 {
        lock(&self.inner.schedules)
            .get(target)
            .map_or(0, |s| s.polls)
    }

    /// Stops every target and cancels pending timers
    ///
    /// Outstanding leases become inert.
    pub fn shutdown(&self) {
        let mut schedules = lock(&self.inner.schedules);
        for schedule in schedules.values_mut() {
            schedule.leases.clear();
            schedule.cancel();
        }
        info!("Poller shut down ({} targets)", schedules.len());
    }

    fn release(&self, target: &PollTarget, lease: u64) {
        let mut schedules = lock(&self.inner.schedules);
        let Some(schedule) = schedules.get_mut(target) else {
            return;
        };

        if schedule.leases.remove(&lease).is_some() && schedule.leases.is_empty() {
            if schedule.state.is_active() {
                info!("Stopped polling {}: no subscribers left", target);
            }
            schedule.cancel();
        }
    }

    fn is_settled(&self, target: &PollTarget) -> bool {
        let store = &self.inner.store;
        match target {
            PollTarget::Job(id) => {
                let view = store.view(id);
                view.is_terminal() || view.is_not_found()
            }
            PollTarget::List => {
                let view = store.list_view();
                !view.is_loading()
                    && view.all_terminal()
                    && self.inner.policy.settled_interval.is_none()
            }
        }
    }

    /// Spawns a fresh polling task, superseding any current one
    fn start(&self, target: &PollTarget, schedule: &mut Schedule) {
        if let Some(task) = schedule.task.take() {
            task.abort();
        }
        schedule.generation += 1;
        schedule.state = PollState::Idle;

        let poller = self.clone();
        let target = target.clone();
        let generation = schedule.generation;
        schedule.task = Some(tokio::spawn(async move {
            poller.run(target, generation).await;
        }));
    }

    async fn run(self, target: PollTarget, generation: u64) {
        loop {
            let Some(delay) = self.begin_wait(&target, generation) else {
                return;
            };
            tokio::time::sleep(delay).await;

            if !self.begin_fetch(&target, generation) {
                return;
            }

            let result = match &target {
                PollTarget::Job(id) => self.inner.store.fetch(id).await.map(|job| job.is_terminal()),
                PollTarget::List => self
                    .inner
                    .store
                    .refresh_list()
                    .await
                    .map(|jobs| jobs.iter().all(|job| job.is_terminal())),
            };

            if !self.finish_fetch(&target, generation, result) {
                return;
            }
        }
    }

    fn begin_wait(&self, target: &PollTarget, generation: u64) -> Option<Duration> {
        let mut schedules = lock(&self.inner.schedules);
        let schedule = schedules
            .get_mut(target)
            .filter(|s| s.generation == generation)?;

        let interval = schedule.interval()?;
        let delay = schedule.next_delay.take().unwrap_or(interval);
        schedule.state = PollState::Scheduled(delay);
        Some(delay)
    }

    fn begin_fetch(&self, target: &PollTarget, generation: u64) -> bool {
        let mut schedules = lock(&self.inner.schedules);
        let Some(schedule) = schedules
            .get_mut(target)
            .filter(|s| s.generation == generation)
        else {
            return false;
        };

        schedule.state = PollState::InFlight;
        schedule.polls += 1;
        debug!("Polling {} (poll #{})", target, schedule.polls);
        true
    }

    /// Applies a fetch result to the schedule; false ends the polling task
    fn finish_fetch(&self, target: &PollTarget, generation: u64, result: Result<bool>) -> bool {
        let mut notice = None;

        let keep_going = {
            let mut schedules = lock(&self.inner.schedules);
            let Some(schedule) = schedules
                .get_mut(target)
                .filter(|s| s.generation == generation)
            else {
                return false;
            };
            let Some(base) = schedule.interval() else {
                return false;
            };

            let outcome = match result {
                Ok(terminal) => {
                    if schedule.consecutive_failures > 0 {
                        info!(
                            "Refreshed {} after {} failed attempts",
                            target, schedule.consecutive_failures
                        );
                    }
                    schedule.consecutive_failures = 0;
                    if terminal {
                        PollOutcome::Settled
                    } else {
                        PollOutcome::Active
                    }
                }
                Err(e) if e.is_transient() => {
                    schedule.consecutive_failures += 1;
                    let consecutive = schedule.consecutive_failures;
                    warn!(
                        "Refreshing {} failed ({} in a row): {}",
                        target, consecutive, e
                    );
                    if self.inner.policy.should_report(consecutive) {
                        notice = Some(RefreshNotice::Unavailable {
                            consecutive_failures: consecutive,
                            message: e.to_string(),
                        });
                    }
                    PollOutcome::TransientFailure { consecutive }
                }
                Err(ClientError::NotFound(message)) => {
                    info!("Stopped polling {}: not found ({})", target, message);
                    if *target == PollTarget::List {
                        notice = Some(RefreshNotice::NotFound);
                    }
                    PollOutcome::PermanentFailure
                }
                Err(e) => {
                    warn!("Stopped polling {}: {}", target, e);
                    PollOutcome::PermanentFailure
                }
            };

            match self.inner.policy.next_delay(target, base, outcome) {
                Some(delay) => {
                    schedule.next_delay = Some(delay);
                    true
                }
                None => {
                    if outcome == PollOutcome::Settled {
                        info!("Stopped polling {}: settled", target);
                    }
                    schedule.state = PollState::Stopped;
                    schedule.task = None;
                    false
                }
            }
        };

        // The store is never called with the schedules lock held
        if let Some(notice) = notice {
            match target {
                PollTarget::Job(id) => self.inner.store.set_notice(id, notice),
                PollTarget::List => self.inner.store.set_list_notice(notice),
            }
        }

        keep_going
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("policy", &self.inner.policy)
            .field("targets", &lock(&self.inner.schedules).len())
            .finish()
    }
}

/// Interest in a polling target
///
/// Polling continues while at least one lease for the target is alive.
/// Dropping the lease releases it.
#[must_use = "dropping a PollLease releases it immediately"]
pub struct PollLease {
    poller: Poller,
    target: PollTarget,
    id: u64,
    released: bool,
}

impl PollLease {
    pub fn target(&self) -> &PollTarget {
        &self.target
    }

    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if !self.released {
            self.released = true;
            self.poller.release(&self.target, self.id);
        }
    }
}

impl Drop for PollLease {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for PollLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLease")
            .field("target", &self.target)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, job};
    use deckwatch_core::domain::job::JobStatus;
    use policy::Backoff;

    const DETAIL: Duration = Duration::from_secs(2);

    fn setup() -> (Arc<ScriptedTransport>, JobStore, Poller) {
        let transport = Arc::new(ScriptedTransport::new());
        let store = JobStore::new(transport.clone());
        let poller = Poller::new(store.clone(), IntervalPolicy::default());
        (transport, store, poller)
    }

    fn server_error() -> ClientError {
        ClientError::Server {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_terminal() {
        let (transport, store, poller) = setup();
        let id = JobId::from("abc");
        store.upsert(job("abc", JobStatus::Submitted));
        transport.script_job(
            "abc",
            vec![
                Ok(job("abc", JobStatus::Processing)),
                Ok(job("abc", JobStatus::Completed)),
            ],
        );

        let target = PollTarget::Job(id.clone());
        let _lease = poller.acquire(target.clone(), DETAIL);
        assert_eq!(poller.state(&target), PollState::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.get_calls(&id), 2);
        assert_eq!(poller.poll_count(&target), 2);
        assert_eq!(poller.state(&target), PollState::Stopped);
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Completed);

        let times = transport.get_call_times(&id);
        assert_eq!(times[1] - times[0], DETAIL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_job_is_not_polled() {
        let (transport, store, poller) = setup();
        store.upsert(job("abc", JobStatus::Failed));

        let target = PollTarget::Job(JobId::from("abc"));
        let _lease = poller.acquire(target.clone(), DETAIL);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(poller.state(&target), PollState::Stopped);
        assert_eq!(transport.get_calls(&JobId::from("abc")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_stops_without_retry() {
        let (transport, store, poller) = setup();
        let id = JobId::from("xyz");
        let target = PollTarget::Job(id.clone());

        let _lease = poller.acquire(target.clone(), DETAIL);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.get_calls(&id), 1);
        assert_eq!(poller.state(&target), PollState::Stopped);
        assert!(store.view(&id).is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbled_response_is_retried_but_rejection_stops() {
        let (transport, store, poller) = setup();
        store.upsert(job("abc", JobStatus::Submitted));
        store.upsert(job("def", JobStatus::Submitted));
        transport.script_job(
            "abc",
            vec![
                Err(ClientError::Parse("expected value at line 1".to_string())),
                Ok(job("abc", JobStatus::Completed)),
            ],
        );
        transport.script_job(
            "def",
            vec![Err(ClientError::Validation("bad id".to_string()))],
        );

        let garbled = PollTarget::Job(JobId::from("abc"));
        let rejected = PollTarget::Job(JobId::from("def"));
        let _a = poller.acquire(garbled.clone(), DETAIL);
        let _b = poller.acquire(rejected.clone(), DETAIL);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.get_calls(&JobId::from("abc")), 2);
        assert_eq!(store.get(&JobId::from("abc")).unwrap().status, JobStatus::Completed);

        assert_eq!(transport.get_calls(&JobId::from("def")), 1);
        assert_eq!(poller.state(&rejected), PollState::Stopped);
        assert_eq!(store.get(&JobId::from("def")).unwrap().status, JobStatus::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_before_first_poll_cancels() {
        let (transport, store, poller) = setup();
        let id = JobId::from("abc");
        store.upsert(job("abc", JobStatus::Submitted));
        transport.script_job("abc", vec![Ok(job("abc", JobStatus::Processing))]);

        let target = PollTarget::Job(id.clone());
        let lease = poller.acquire(target.clone(), DETAIL);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(poller.state(&target), PollState::Scheduled(DETAIL));

        lease.release();
        assert_eq!(poller.state(&target), PollState::Stopped);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(transport.get_calls(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shortest_lease_interval_wins() {
        let (transport, store, poller) = setup();
        let id = JobId::from("abc");
        store.upsert(job("abc", JobStatus::Processing));
        transport.script_job("abc", vec![Ok(job("abc", JobStatus::Processing))]);

        let target = PollTarget::Job(id.clone());
        let slow = poller.acquire(target.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(1)).await;
        let fast = poller.acquire(target.clone(), DETAIL);

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(transport.get_calls(&id), 3);

        // The slow lease alone keeps polling, at its own pace
        fast.release();
        let before = transport.get_calls(&id);
        tokio::time::sleep(Duration::from_secs(21)).await;
        let after = transport.get_calls(&id);
        assert!((2..=3).contains(&(after - before)));

        slow.release();
        assert_eq!(poller.state(&target), PollState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_back_off_then_recover() {
        let (transport, store, poller) = setup();
        let id = JobId::from("abc");
        store.upsert(job("abc", JobStatus::Processing));
        transport.script_job(
            "abc",
            vec![
                Err(server_error()),
                Err(server_error()),
                Err(server_error()),
                Ok(job("abc", JobStatus::Processing)),
                Ok(job("abc", JobStatus::Completed)),
            ],
        );

        let _lease = poller.acquire(PollTarget::Job(id.clone()), DETAIL);
        tokio::time::sleep(Duration::from_secs(60)).await;

        let times = transport.get_call_times(&id);
        assert_eq!(times.len(), 5);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, [2, 4, 8, 2].map(Duration::from_secs).to_vec());

        // Below the ceiling, failures never reach the renderer
        assert_eq!(store.view(&id).notice, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ceiling_sets_notice_until_success() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = JobStore::new(transport.clone());
        let policy = IntervalPolicy {
            backoff: Backoff::Fixed,
            max_transient_failures: 2,
            ..IntervalPolicy::default()
        };
        let poller = Poller::new(store.clone(), policy);

        let id = JobId::from("abc");
        store.upsert(job("abc", JobStatus::Processing));
        transport.script_job(
            "abc",
            vec![
                Err(server_error()),
                Err(ClientError::Network("connection refused".to_string())),
                Ok(job("abc", JobStatus::Processing)),
            ],
        );

        let _lease = poller.acquire(PollTarget::Job(id.clone()), DETAIL);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let view = store.view(&id);
        assert!(matches!(
            view.notice,
            Some(RefreshNotice::Unavailable {
                consecutive_failures: 2,
                ..
            })
        ));
        assert_eq!(view.job.unwrap().status, JobStatus::Processing);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.view(&id).notice, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_stops_when_all_terminal() {
        let (transport, store, poller) = setup();
        transport.script_list(vec![
            Ok(vec![job("a", JobStatus::Processing), job("b", JobStatus::Completed)]),
            Ok(vec![job("a", JobStatus::Failed), job("b", JobStatus::Completed)]),
        ]);

        let _lease = poller.acquire(PollTarget::List, Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.list_calls(), 2);
        assert_eq!(poller.state(&PollTarget::List), PollState::Stopped);
        assert!(store.list_view().all_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_list_slows_down() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = JobStore::new(transport.clone());
        let policy = IntervalPolicy {
            settled_interval: Some(Duration::from_secs(30)),
            ..IntervalPolicy::default()
        };
        let poller = Poller::new(store, policy);
        transport.script_list(vec![Ok(vec![job("a", JobStatus::Completed)])]);

        let _lease = poller.acquire(PollTarget::List, Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(66)).await;

        let times = transport.list_call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let (transport, store, poller) = setup();
        store.upsert(job("abc", JobStatus::Processing));
        transport.script_job("abc", vec![Ok(job("abc", JobStatus::Processing))]);

        let target = PollTarget::Job(JobId::from("abc"));
        let _job_lease = poller.acquire(target.clone(), DETAIL);
        let _list_lease = poller.acquire(PollTarget::List, Duration::from_secs(5));

        poller.shutdown();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(poller.state(&target), PollState::Stopped);
        assert_eq!(poller.state(&PollTarget::List), PollState::Stopped);
        assert_eq!(transport.get_calls(&JobId::from("abc")), 0);
        assert_eq!(transport.list_calls(), 0);
    }
}
