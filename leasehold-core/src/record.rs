use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

const MAX_LEASE_ID_LEN: usize = 128;

/// Opaque capability identifying one lease on a lock.
///
/// A fresh id is minted on every successful acquire and renew; presenting an
/// older id never matches the stored record again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(String);

impl LeaseId {
    pub fn generate() -> LeaseId {
        LeaseId(hex::encode(rand::random::<[u8; 16]>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LeaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            anyhow::bail!("lease id must not be empty");
        }
        if s.len() > MAX_LEASE_ID_LEN {
            anyhow::bail!("lease id exceeds {} bytes", MAX_LEASE_ID_LEN);
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("lease id {:?} is not hex", s);
        }
        Ok(LeaseId(s.to_owned()))
    }
}

/// The single record a store keeps per lock id. Absence of a record means the
/// lock is free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub lock_id: String,
    pub lease_id: LeaseId,
    pub acquired_at: DateTime<Utc>,
    pub lease_duration: Duration,
    /// Diagnostic only, never consulted by the protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
}

impl LeaseRecord {
    pub fn new(
        lock_id: &str,
        acquired_at: DateTime<Utc>,
        lease_duration: Duration,
        holder: Option<String>,
    ) -> LeaseRecord {
        LeaseRecord {
            lock_id: lock_id.to_owned(),
            lease_id: LeaseId::generate(),
            acquired_at,
            lease_duration,
            holder,
        }
    }

    /// End of the validity window. Saturates rather than overflowing.
    pub fn expires_at(&self) -> DateTime<Utc> {
        add_saturating(self.acquired_at, self.lease_duration)
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Whether another caller may take this lease over at `now`, allowing
    /// `skew_margin` for clock drift between the previous holder and us.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew_margin: Duration) -> bool {
        now >= add_saturating(self.expires_at(), skew_margin)
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).to_std().unwrap_or(Duration::ZERO)
    }
}

pub(crate) fn add_saturating(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_liveness_window() {
        let record = LeaseRecord::new("build-lock", at(0), Duration::from_secs(10), None);
        assert!(record.is_live_at(at(0)));
        assert!(record.is_live_at(at(9)));
        assert!(!record.is_live_at(at(10)));
        assert!(record.is_expired_at(at(10), Duration::ZERO));
        assert!(!record.is_expired_at(at(10), Duration::from_secs(2)));
        assert!(record.is_expired_at(at(12), Duration::from_secs(2)));
        assert_eq!(record.remaining_at(at(4)), Duration::from_secs(6));
        assert_eq!(record.remaining_at(at(11)), Duration::ZERO);
    }

    #[test]
    fn test_expiry_saturates() {
        let record = LeaseRecord::new("huge", at(0), Duration::from_secs(u64::MAX), None);
        assert_eq!(record.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(record.is_live_at(at(1_000_000)));
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = LeaseId::generate();
        let b = LeaseId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(a.as_str().parse::<LeaseId>().unwrap(), a);
    }

    #[test]
    fn test_lease_id_parse() {
        assert!("".parse::<LeaseId>().is_err());
        assert!("has space".parse::<LeaseId>().is_err());
        assert!("a".repeat(MAX_LEASE_ID_LEN + 1).parse::<LeaseId>().is_err());
        assert!("zz".parse::<LeaseId>().is_err());
        assert!("zz-not-hex".parse::<LeaseId>().is_err());
        assert_eq!("a1".parse::<LeaseId>().unwrap().to_string(), "a1");
        assert_eq!("B1".parse::<LeaseId>().unwrap().to_string(), "B1");
    }

    #[test]
    fn test_json_layout() {
        let mut record = LeaseRecord::new("build-lock", at(0), Duration::from_secs(10), None);
        record.lease_id = "a1".parse().unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lock_id"], "build-lock");
        assert_eq!(json["lease_id"], "a1");
        assert_eq!(json["lease_duration"]["secs"], 10);
        assert!(json.get("holder").is_none());

        record.holder = Some("ci@pid7".to_owned());
        let parsed: LeaseRecord =
            serde_json::from_slice(&serde_json::to_vec(&record).unwrap()).unwrap();
        assert_eq!(parsed, record);
    }
}
