// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, Duration, Utc};

/// Absolute expiry for an OAuth token that lives `expires_in` seconds.
pub fn expiry_from_now(now: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    let secs = i64::try_from(expires_in).unwrap_or(i64::MAX / 1000);
    now.checked_add_signed(Duration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether `since` lies at least `grace` before `now`.
pub fn has_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, grace: Duration) -> bool {
    now.signed_duration_since(since) >= grace
}
