// gateway-server/src/reconciler/window.rs
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Market trading window in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub end_time: i64,
    pub cutoff_time: i64,
}

/// Timing fields of an external pick record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PickTiming {
    pub expires_at: Option<String>,
    pub duration_hours: Option<f64>,
}

impl TimeWindow {
    pub const DEFAULT_DURATION_SECS: i64 = 3 * 24 * 3600;
    pub const CUTOFF_GAP_SECS: i64 = 30 * 60;
    pub const MIN_LEAD_SECS: i64 = 5 * 60;
    /// 9999-12-31T23:59:59Z; nothing later is a usable market time
    pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

    /// end = now + 3 days, cutoff = end - 30 minutes
    pub fn default_from(now: DateTime<Utc>) -> Self {
        let end_time = now.timestamp() + Self::DEFAULT_DURATION_SECS;
        Self {
            end_time,
            cutoff_time: end_time - Self::CUTOFF_GAP_SECS,
        }
    }

    /// Window from a record's expiry (preferred) or duration. The cutoff is
    /// 30 minutes before the end but never sooner than 5 minutes from now.
    /// `None` when the record gives nothing usable, already (nearly) ended,
    /// or ends past `MAX_TIMESTAMP`.
    pub fn from_record(timing: &PickTiming, now: DateTime<Utc>) -> Option<Self> {
        let now_ts = now.timestamp();

        let end_time = match (&timing.expires_at, timing.duration_hours) {
            (Some(expires_at), _) => DateTime::parse_from_rfc3339(expires_at.trim())
                .ok()
                .map(|dt| dt.timestamp()),
            (None, Some(hours)) if hours.is_finite() && hours > 0.0 => {
                let secs = hours * 3600.0;
                if secs > (Self::MAX_TIMESTAMP - now_ts) as f64 {
                    None
                } else {
                    now_ts.checked_add(secs as i64)
                }
            },
            _ => None,
        }?;

        let earliest_cutoff = now_ts.checked_add(Self::MIN_LEAD_SECS)?;
        if end_time <= earliest_cutoff || end_time > Self::MAX_TIMESTAMP {
            return None;
        }

        Some(Self {
            end_time,
            cutoff_time: end_time.checked_sub(Self::CUTOFF_GAP_SECS)?.max(earliest_cutoff),
        })
    }
}
