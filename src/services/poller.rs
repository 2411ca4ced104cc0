//! Polling adapter: keeps the latest [`Snapshot`] of an account and tells
//! subscribers when it changes.
//!
//! - At most one fetch is in flight; concurrent refresh requests wait for it and
//!   share its outcome.
//! - The stored snapshot is swapped as a whole (`ArcSwapOption`), so readers get
//!   either the previous or the new snapshot, never a mix.
//! - Failures never clear data: the previous snapshot stays available and the error
//!   is recorded in [`PollStatus`].

use crate::client::{ClientError, ErrorKind, RemoClient};
use crate::snapshot::Snapshot;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Anything that can produce a fresh snapshot.
pub trait SnapshotSource {
    fn fetch_snapshot(&self) -> Result<Snapshot, ClientError>;
}

impl SnapshotSource for RemoClient {
    fn fetch_snapshot(&self) -> Result<Snapshot, ClientError> {
        RemoClient::fetch_snapshot(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Result of one refresh attempt, shared by every caller coalesced into it.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated(Arc<Snapshot>),
    Failed(RefreshFailure),
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// What subscribers are told after every refresh attempt.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Updated(Arc<Snapshot>),
    Failed(RefreshFailure),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<RefreshFailure>,
    /// `true` once a refresh has succeeded and no refresh has failed since.
    pub last_attempt_ok: bool,
    pub refreshing: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&PollEvent) + Send + Sync>;

struct FlightState {
    refreshing: bool,
    /// Bumped every time a refresh finishes.
    generation: u64,
    last_outcome: Option<RefreshOutcome>,
    status: PollStatus,
}

pub struct Poller<S> {
    source: S,
    current: ArcSwapOption<Snapshot>,
    flight: Mutex<FlightState>,
    finished: Condvar,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl<S: SnapshotSource> Poller<S> {
    pub fn new(source: S) -> Self {
        Poller {
            source,
            current: ArcSwapOption::empty(),
            flight: Mutex::new(FlightState {
                refreshing: false,
                generation: 0,
                last_outcome: None,
                status: PollStatus::default(),
            }),
            finished: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Latest good snapshot, if any. Never triggers a fetch.
    pub fn get_latest(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn status(&self) -> PollStatus {
        self.flight.lock().status.clone()
    }

    /// Register a callback invoked after every refresh attempt.
    pub fn subscribe(&self, listener: impl Fn(&PollEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Refresh now, or join the refresh already in flight.
    ///
    /// Blocks until the (possibly shared) attempt finishes and returns its outcome.
    pub fn request_refresh(&self) -> RefreshOutcome {
        {
            let mut flight = self.flight.lock();
            if flight.refreshing {
                let joined = flight.generation;
                debug!("Refresh already in flight; waiting for it");
                while flight.generation == joined {
                    self.finished.wait(&mut flight);
                }
                if let Some(outcome) = flight.last_outcome.clone() {
                    return outcome;
                }
            }
            flight.refreshing = true;
            flight.status.refreshing = true;
        }

        let result = self.source.fetch_snapshot();
        let now = Utc::now();

        let (outcome, event) = match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.current.store(Some(Arc::clone(&snapshot)));
                info!(
                    "Refreshed snapshot (appliances={}, devices={})",
                    snapshot.appliances.len(),
                    snapshot.devices.len()
                );
                (
                    RefreshOutcome::Updated(Arc::clone(&snapshot)),
                    PollEvent::Updated(snapshot),
                )
            }
            Err(e) => {
                let failure = RefreshFailure {
                    kind: e.kind(),
                    message: e.to_string(),
                    at: now,
                };
                warn!("Refresh failed ({:?}); keeping previous data: {}", failure.kind, failure.message);
                (RefreshOutcome::Failed(failure.clone()), PollEvent::Failed(failure))
            }
        };

        {
            let mut flight = self.flight.lock();
            match &outcome {
                RefreshOutcome::Updated(_) => {
                    flight.status.last_updated = Some(now);
                    flight.status.last_attempt_ok = true;
                }
                RefreshOutcome::Failed(failure) => {
                    flight.status.last_error = Some(failure.clone());
                    flight.status.last_attempt_ok = false;
                }
            }
            flight.status.refreshing = false;
            flight.refreshing = false;
            flight.generation += 1;
            flight.last_outcome = Some(outcome.clone());
        }
        self.finished.notify_all();

        self.notify(&event);
        outcome
    }

    fn notify(&self, event: &PollEvent) {
        // Snapshot the list so callbacks may (un)subscribe without deadlocking.
        let listeners: Vec<Listener> = self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Refresh on a steady cadence until `shutdown` receives a message or its
    /// sender is dropped. The first refresh happens one interval after the call;
    /// callers wanting data right away call [`Poller::request_refresh`] first.
    pub fn run_loop(&self, interval: Duration, shutdown: &Receiver<()>) {
        info!("Polling every {}s", interval.as_secs());
        let mut wait = interval;
        loop {
            match shutdown.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Polling stopped");
                    return;
                }
            }

            let tick_start = Instant::now();
            self.request_refresh();

            // Maintain steady cadence
            wait = interval.saturating_sub(tick_start.elapsed());
        }
    }
}
