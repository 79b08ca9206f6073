//! Types for the lock client

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::record::{add_saturating, LeaseId, LeaseRecord};

/// Configuration for the lock client
#[derive(Debug, Clone)]
pub struct LockClientConfig {
    /// Diagnostic annotation written into every record this client creates
    pub holder: Option<String>,

    /// Extra time past a lease's expiry before this client takes it over
    pub skew_margin: Duration,

    /// First delay between polls when the request has no fixed poll interval
    pub min_poll_interval: Duration,

    /// Upper bound for the growing delay between polls
    pub max_poll_interval: Duration,
}

impl Default for LockClientConfig {
    fn default() -> Self {
        Self {
            holder: None,
            skew_margin: Duration::ZERO,
            min_poll_interval: Duration::from_millis(250),
            max_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Request to acquire a lock
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub(super) lock_id: String,
    pub(super) lease_duration: Duration,
    pub(super) wait_timeout: Option<Duration>,
    pub(super) poll_interval: Option<Duration>,
}

impl AcquireRequest {
    /// Fail immediately if the lock is held; see [`Self::with_wait_timeout`].
    pub fn new(lock_id: impl Into<String>, lease_duration: Duration) -> Self {
        Self {
            lock_id: lock_id.into(),
            lease_duration,
            wait_timeout: None,
            poll_interval: None,
        }
    }

    /// Keep polling a held lock for up to `wait_timeout`. Zero means no wait.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = Some(wait_timeout);
        self
    }

    /// Poll at a fixed interval instead of backing off. Zero keeps the backoff.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}

/// A lease obtained by acquire or renew. The lease id is the capability for
/// the next renew or release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub(super) lock_id: String,
    pub(super) lease_id: LeaseId,
    pub(super) acquired_at: DateTime<Utc>,
    pub(super) lease_duration: Duration,
    pub(super) reclaimed: bool,
}

impl Lease {
    pub(super) fn from_record(record: LeaseRecord, reclaimed: bool) -> Self {
        Self {
            lock_id: record.lock_id,
            lease_id: record.lease_id,
            acquired_at: record.acquired_at,
            lease_duration: record.lease_duration,
            reclaimed,
        }
    }

    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    pub fn lease_id(&self) -> &LeaseId {
        &self.lease_id
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Whether this lease was obtained by taking over an expired one.
    pub fn reclaimed(&self) -> bool {
        self.reclaimed
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        add_saturating(self.acquired_at, self.lease_duration)
    }
}

/// Result of releasing a lease
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The caller's lease was current and has been removed
    Released,

    /// The lease was already released, expired and reclaimed, or never
    /// existed; the caller did not hold the lock
    NotHeld,
}

/// Advisory view of a lock's current record
#[derive(Debug, Clone)]
pub struct LockStatus {
    pub record: LeaseRecord,
    pub checked_at: DateTime<Utc>,
    pub live: bool,
}

impl LockStatus {
    pub fn remaining(&self) -> Duration {
        self.record.remaining_at(self.checked_at)
    }
}
