//! Lease-based mutual exclusion over stores with atomic conditional writes.
//!
//! Callers coordinate exclusive access to a named lock through a single
//! [`LeaseRecord`] per lock id. There is no coordinator: whichever conditional
//! write the [`LockStore`] accepts decides who holds the lock.

mod error;
mod validate;

pub mod client;
pub mod clock;
pub mod duration;
pub mod record;
pub mod store;

pub use client::{AcquireRequest, Lease, LockClient, LockClientConfig, LockStatus, Release};
pub use clock::{Clock, SystemClock};
pub use duration::{DurationUnit, DurationValue, ParseDurationError};
pub use error::{Error, LockError, Result};
pub use record::{LeaseId, LeaseRecord};
pub use store::{FileStore, LockStore, MemoryStore, WriteOutcome};
pub use validate::{MAX_LEASE_DURATION, MIN_LEASE_DURATION};

#[cfg(test)]
pub mod tests;
