//! Process exit codes

use leasehold_core::{LockError, Release};

pub const EXIT_OK: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_UNAVAILABLE: u8 = 3;
pub const EXIT_LEASE_LOST: u8 = 4;
pub const EXIT_NOT_HELD: u8 = 5;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn lock_error_code(err: &LockError) -> u8 {
    match err {
        LockError::Unavailable { .. } => EXIT_UNAVAILABLE,
        LockError::LeaseLost { .. } => EXIT_LEASE_LOST,
        LockError::Cancelled => EXIT_INTERRUPTED,
        LockError::Invalid(_) => EXIT_USAGE,
        LockError::Backend(_) => EXIT_ERROR,
    }
}

pub fn release_code(release: Release) -> u8 {
    match release {
        Release::Released => EXIT_OK,
        Release::NotHeld => EXIT_NOT_HELD,
    }
}

/// Exit code for a child process. Children killed by a signal report the
/// shell convention of 128 plus the signal number.
pub fn child_code(status: std::process::ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(EXIT_ERROR);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(128 + signal).unwrap_or(EXIT_ERROR);
        }
    }
    EXIT_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_codes_are_distinct() {
        let codes = [
            lock_error_code(&LockError::Unavailable {
                lock_id: "a".to_owned(),
            }),
            lock_error_code(&LockError::LeaseLost {
                lock_id: "a".to_owned(),
            }),
            lock_error_code(&LockError::Cancelled),
            lock_error_code(&LockError::Invalid(anyhow::anyhow!("bad"))),
            lock_error_code(&LockError::Backend(anyhow::anyhow!("down"))),
        ];
        assert_eq!(
            codes,
            [
                EXIT_UNAVAILABLE,
                EXIT_LEASE_LOST,
                EXIT_INTERRUPTED,
                EXIT_USAGE,
                EXIT_ERROR
            ]
        );
    }

    #[test]
    fn test_release_codes() {
        assert_eq!(release_code(Release::Released), EXIT_OK);
        assert_eq!(release_code(Release::NotHeld), EXIT_NOT_HELD);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_codes() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(child_code(std::process::ExitStatus::from_raw(0)), 0);
        assert_eq!(child_code(std::process::ExitStatus::from_raw(7 << 8)), 7);
        // SIGKILL
        assert_eq!(child_code(std::process::ExitStatus::from_raw(9)), 137);
    }
}
