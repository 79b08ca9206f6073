//! Lock client
//!
//! Implements acquire, renew and release on top of a [`LockStore`]. The client
//! keeps no lock state of its own: every decision that matters is made by a
//! conditional write in the store, and reads only guide which write to try.

mod poll;
mod types;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::LockError,
    record::{LeaseId, LeaseRecord},
    store::{LockStore, WriteOutcome},
    validate::{validate_holder, validate_lease_duration, validate_lock_id},
};

use poll::Poller;
pub use types::{AcquireRequest, Lease, LockClientConfig, LockStatus, Release};

#[derive(Clone)]
pub struct LockClient<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: LockClientConfig,
}

impl<S: LockStore> LockClient<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LockClientConfig::default())
    }

    pub fn with_config(store: S, config: LockClientConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock used to stamp and expire leases.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LockClientConfig {
        &self.config
    }

    /// The clock this client stamps and expires leases with.
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn check(&self, lock_id: &str, lease_duration: Option<Duration>) -> Result<(), LockError> {
        validate_lock_id(lock_id).map_err(LockError::Invalid)?;
        if let Some(lease_duration) = lease_duration {
            validate_lease_duration(lease_duration).map_err(LockError::Invalid)?;
        }
        if let Some(holder) = &self.config.holder {
            validate_holder(holder).map_err(LockError::Invalid)?;
        }
        Ok(())
    }

    fn new_record(&self, lock_id: &str, lease_duration: Duration) -> LeaseRecord {
        LeaseRecord::new(
            lock_id,
            self.clock.now(),
            lease_duration,
            self.config.holder.clone(),
        )
    }

    /// Acquire the lock, polling a held lock until the request's wait timeout.
    pub async fn acquire(&self, request: &AcquireRequest) -> Result<Lease, LockError> {
        self.acquire_with_cancel(&CancellationToken::new(), request)
            .await
    }

    /// Like [`Self::acquire`], but stops waiting when `cancel` fires.
    #[tracing::instrument(skip_all, fields(lock_id = %request.lock_id), err(level = tracing::Level::DEBUG))]
    pub async fn acquire_with_cancel(
        &self,
        cancel: &CancellationToken,
        request: &AcquireRequest,
    ) -> Result<Lease, LockError> {
        self.check(&request.lock_id, Some(request.lease_duration))?;
        let lock_id = request.lock_id.as_str();
        let mut poller = Poller::new(request, &self.config);

        'create: loop {
            let record = self.new_record(lock_id, request.lease_duration);
            if self.store.create_if_absent(&record).await?.is_applied() {
                info!(lease_id = %record.lease_id, "acquired");
                return Ok(Lease::from_record(record, false));
            }

            loop {
                let Some(existing) = self.store.read(lock_id).await? else {
                    debug!("record vanished, retrying create");
                    continue 'create;
                };

                let now = self.clock.now();
                if existing.is_expired_at(now, self.config.skew_margin) {
                    let record = self.new_record(lock_id, request.lease_duration);
                    match self
                        .store
                        .update_if_matches(&existing.lease_id, &record)
                        .await?
                    {
                        WriteOutcome::Applied => {
                            info!(
                                lease_id = %record.lease_id,
                                previous = %existing.lease_id,
                                previous_holder = existing.holder.as_deref().unwrap_or("-"),
                                "reclaimed expired lease"
                            );
                            return Ok(Lease::from_record(record, true));
                        }
                        WriteOutcome::PreconditionFailed => {
                            debug!(previous = %existing.lease_id, "lost reclaim race");
                            continue;
                        }
                    }
                }

                let reclaimable_in = existing.remaining_at(now) + self.config.skew_margin;
                debug!(
                    holder = existing.holder.as_deref().unwrap_or("-"),
                    expires_at = %existing.expires_at(),
                    "lock is held"
                );
                poller.wait(cancel, lock_id, reclaimable_in).await?;
            }
        }
    }

    /// Extend a held lease. The returned lease carries a new lease id; the one
    /// passed in is spent either way.
    #[tracing::instrument(skip_all, fields(lock_id = %lock_id), err(level = tracing::Level::DEBUG))]
    pub async fn renew(
        &self,
        lock_id: &str,
        lease_id: &LeaseId,
        lease_duration: Duration,
    ) -> Result<Lease, LockError> {
        self.check(lock_id, Some(lease_duration))?;
        let record = self.new_record(lock_id, lease_duration);
        match self.store.update_if_matches(lease_id, &record).await? {
            WriteOutcome::Applied => {
                debug!(
                    previous = %lease_id,
                    lease_id = %record.lease_id,
                    expires_at = %record.expires_at(),
                    "renewed"
                );
                Ok(Lease::from_record(record, false))
            }
            WriteOutcome::PreconditionFailed => {
                warn!(%lease_id, "lease lost before renewal");
                Err(LockError::LeaseLost {
                    lock_id: lock_id.to_owned(),
                })
            }
        }
    }

    #[tracing::instrument(skip_all, fields(lock_id = %lock_id), err(level = tracing::Level::DEBUG))]
    pub async fn release(&self, lock_id: &str, lease_id: &LeaseId) -> Result<Release, LockError> {
        self.check(lock_id, None)?;
        match self.store.delete_if_matches(lock_id, lease_id).await? {
            WriteOutcome::Applied => {
                info!(%lease_id, "released");
                Ok(Release::Released)
            }
            WriteOutcome::PreconditionFailed => {
                warn!(%lease_id, "release of a lease not held");
                Ok(Release::NotHeld)
            }
        }
    }

    /// Advisory snapshot of the lock. Never use it to decide ownership.
    pub async fn inspect(&self, lock_id: &str) -> Result<Option<LockStatus>, LockError> {
        self.check(lock_id, None)?;
        let checked_at = self.clock.now();
        Ok(self.store.read(lock_id).await?.map(|record| LockStatus {
            live: record.is_live_at(checked_at),
            record,
            checked_at,
        }))
    }
}
