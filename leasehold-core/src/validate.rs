use std::time::Duration;

use anyhow::{bail, Result};

pub const MAX_LOCK_ID_LEN: usize = 256;

pub const MAX_HOLDER_LEN: usize = 256;

pub const MIN_LEASE_DURATION: Duration = Duration::from_secs(1);

pub const MAX_LEASE_DURATION: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Validate a lock id.
/// Rules: non-empty, at most 256 bytes, no control characters, no
/// surrounding whitespace.
pub fn validate_lock_id(lock_id: &str) -> Result<()> {
    if lock_id.is_empty() {
        bail!("lock id must not be empty");
    }
    if lock_id.len() > MAX_LOCK_ID_LEN {
        bail!(
            "lock id exceeds {} bytes (got {})",
            MAX_LOCK_ID_LEN,
            lock_id.len()
        );
    }
    if lock_id.trim() != lock_id {
        bail!("lock id {:?} must not start or end with whitespace", lock_id);
    }
    if lock_id.chars().any(|c| c.is_control()) {
        bail!("lock id {:?} must not contain control characters", lock_id);
    }
    Ok(())
}

pub fn validate_lease_duration(lease_duration: Duration) -> Result<()> {
    if lease_duration < MIN_LEASE_DURATION {
        bail!(
            "lease duration must be at least {}s (got {:?})",
            MIN_LEASE_DURATION.as_secs(),
            lease_duration
        );
    }
    if lease_duration > MAX_LEASE_DURATION {
        bail!(
            "lease duration must be at most {}s (got {}s)",
            MAX_LEASE_DURATION.as_secs(),
            lease_duration.as_secs()
        );
    }
    Ok(())
}

pub fn validate_holder(holder: &str) -> Result<()> {
    if holder.len() > MAX_HOLDER_LEN {
        bail!(
            "holder exceeds {} bytes (got {})",
            MAX_HOLDER_LEN,
            holder.len()
        );
    }
    Ok(())
}
