//! Storage backends for lease records.
//!
//! A [`LockStore`] exposes exactly the atomic primitives the lock protocol
//! needs. Every method is one round trip to the backend; the backend alone
//! decides which of two racing conditional writes wins.

use std::future::Future;

use crate::record::{LeaseId, LeaseRecord};
use crate::Result;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Result of a conditional write that reached the backend.
///
/// Backend faults are reported through the `Err` arm of the surrounding
/// `Result`, never as a failed precondition.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    PreconditionFailed,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        self == WriteOutcome::Applied
    }
}

pub trait LockStore: Clone + Send + Sync {
    /// Current record for `lock_id`, if any. Advisory only.
    fn read(&self, lock_id: &str) -> impl Future<Output = Result<Option<LeaseRecord>>> + Send;

    /// Store `record` under its lock id if no record exists yet.
    fn create_if_absent(
        &self,
        record: &LeaseRecord,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;

    /// Replace the record under `record.lock_id` if the stored lease id equals
    /// `expected`. A missing record fails the precondition.
    fn update_if_matches(
        &self,
        expected: &LeaseId,
        record: &LeaseRecord,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;

    /// Remove the record under `lock_id` if the stored lease id equals
    /// `expected`.
    fn delete_if_matches(
        &self,
        lock_id: &str,
        expected: &LeaseId,
    ) -> impl Future<Output = Result<WriteOutcome>> + Send;
}
