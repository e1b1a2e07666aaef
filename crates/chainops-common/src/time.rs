//! Timestamp helpers.
//!
//! Every timestamp that crosses a datastore boundary is a `chrono::DateTime<Utc>`.
//! Nothing here is used for on-chain ordering — block numbers and tx hashes are
//! the only sources of truth for chain state; these are for leases, scheduling
//! and audit columns only.

use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn from_now(d: Duration) -> DateTime<Utc> {
    now() + d
}

pub fn is_expired(deadline: Option<DateTime<Utc>>) -> bool {
    match deadline {
        Some(t) => t <= now(),
        None => true,
    }
}
