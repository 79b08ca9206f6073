use std::time::Duration;

use backoff::{
    backoff::{Backoff, Constant},
    ExponentialBackoffBuilder,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LockError;

use super::types::{AcquireRequest, LockClientConfig};

/// Paces the polls of one acquire call while the lock is held by someone
/// else, and decides when the wait budget is spent.
pub(super) struct Poller {
    deadline: Option<Instant>,
    backoff: Box<dyn Backoff + Send>,
    attempt: u32,
}

impl Poller {
    pub(super) fn new(request: &AcquireRequest, config: &LockClientConfig) -> Poller {
        let deadline = request
            .wait_timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| Instant::now() + timeout);
        let poll_interval = request.poll_interval.filter(|interval| !interval.is_zero());
        let backoff: Box<dyn Backoff + Send> = match poll_interval {
            Some(interval) => Box::new(Constant::new(interval)),
            None => Box::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(config.min_poll_interval)
                    .with_max_interval(config.max_poll_interval)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        };
        Poller {
            deadline,
            backoff,
            attempt: 0,
        }
    }

    /// Sleep until the next poll. `reclaimable_in` is how long until the
    /// current holder's lease may be taken over; the sleep never overshoots it.
    ///
    /// Fails with [`LockError::Unavailable`] once the deadline has passed, or
    /// right away when the request did not ask to wait.
    pub(super) async fn wait(
        &mut self,
        cancel: &CancellationToken,
        lock_id: &str,
        reclaimable_in: Duration,
    ) -> Result<(), LockError> {
        let unavailable = || LockError::Unavailable {
            lock_id: lock_id.to_owned(),
        };
        let Some(deadline) = self.deadline else {
            return Err(unavailable());
        };
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(unavailable());
        }

        let mut delay = self.backoff.next_backoff().unwrap_or(left).min(left);
        if !reclaimable_in.is_zero() {
            delay = delay.min(reclaimable_in);
        }
        self.attempt += 1;
        debug!(?delay, ?reclaimable_in, attempt = self.attempt, "lock held, waiting");

        tokio::select! {
            _ = cancel.cancelled() => Err(LockError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
