//! Single-flight access token refresh.
//!
//! Any number of callers can ask for a refresh at once; exactly one of them
//! (the leader) runs the refresh call, the rest (followers) queue a oneshot
//! channel and receive the leader's outcome. The cycle state is reset on every
//! exit path of the leader, including timeout and cancellation.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use shopfront_core::AccessToken;

use crate::error::RefreshError;

type RefreshOutcome = Result<AccessToken, RefreshError>;

/// State of the current refresh cycle.
///
/// `waiters` is only non-empty while `in_progress` is set.
#[derive(Default)]
struct RefreshCycle {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Coordinates refresh calls so at most one is in flight.
pub struct RefreshCoordinator {
    cycle: Mutex<RefreshCycle>,
    timeout: Duration,
}

impl RefreshCoordinator {
    /// Create a coordinator whose refresh calls time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            cycle: Mutex::new(RefreshCycle::default()),
            timeout,
        }
    }

    /// Whether a refresh call is currently outstanding.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.lock().in_progress
    }

    /// Number of callers queued behind the current refresh.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Obtain a refreshed token, joining an in-flight refresh if there is one.
    ///
    /// If no refresh is running, this caller leads: it runs `refresh` (bounded
    /// by the coordinator timeout), hands the outcome to every queued
    /// follower, and on failure then calls `on_failure` once. Followers never
    /// run either closure.
    ///
    /// # Errors
    ///
    /// Returns the `RefreshError` of the cycle this caller joined or led.
    pub async fn run<F, Fut, L>(&self, refresh: F, on_failure: L) -> Result<AccessToken, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
        L: FnOnce(&RefreshError),
    {
        let role = {
            let mut cycle = self.lock();
            if cycle.in_progress {
                let (tx, rx) = oneshot::channel();
                cycle.waiters.push(tx);
                Role::Follower(rx)
            } else {
                cycle.in_progress = true;
                Role::Leader
            }
        };

        match role {
            Role::Follower(rx) => {
                debug!("Refresh already in flight, waiting for its outcome");
                rx.await.unwrap_or(Err(RefreshError::Abandoned))
            }
            Role::Leader => {
                let guard = CycleGuard {
                    coordinator: self,
                    settled: false,
                };
                let outcome = tokio::time::timeout(self.timeout, refresh())
                    .await
                    .unwrap_or(Err(RefreshError::Timeout(self.timeout)));
                guard.settle(&outcome);

                if let Err(e) = &outcome {
                    on_failure(e);
                }
                outcome
            }
        }
    }

    /// Release every waiter with `outcome` and reset the cycle.
    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut cycle = self.lock();
            cycle.in_progress = false;
            std::mem::take(&mut cycle.waiters)
        };

        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Refresh settled");
        for waiter in waiters {
            // A follower that was cancelled has dropped its receiver
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshCycle> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_progress", &self.in_progress())
            .field("waiting", &self.waiting())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Resets the cycle if the leader's future is dropped mid-refresh.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl CycleGuard<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh leader dropped before completion, releasing waiters");
            self.coordinator.settle(&Err(RefreshError::Abandoned));
        }
    }
}
