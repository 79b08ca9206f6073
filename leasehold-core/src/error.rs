pub type Error = anyhow::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a lock operation that did not produce a lease.
///
/// Compare-and-swap mismatches never appear here; the client turns them into
/// one of the domain outcomes below. Each variant calls for a different
/// response from the caller.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock is held by a live lease and the wait budget ran out.
    #[error("lock {lock_id:?} is unavailable")]
    Unavailable { lock_id: String },

    /// The lease presented for renewal is no longer the current one.
    #[error("lease on lock {lock_id:?} was lost")]
    LeaseLost { lock_id: String },

    /// Waiting for the lock was cancelled before it became available.
    #[error("cancelled")]
    Cancelled,

    /// A lock id, lease id or duration failed validation.
    #[error("invalid request: {0}")]
    Invalid(#[source] Error),

    /// The store failed for a reason unrelated to a precondition.
    #[error("backend error: {0}")]
    Backend(#[source] Error),
}

impl LockError {
    /// Whether the same request may succeed later without any change on the
    /// caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Unavailable { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LockError::Cancelled)
    }
}

impl From<Error> for LockError {
    fn from(err: Error) -> Self {
        LockError::Backend(err)
    }
}
