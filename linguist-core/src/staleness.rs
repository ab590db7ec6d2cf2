// Freshness of stored results relative to a configured max age. Pure, no I/O.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::AnalysisResult;

/// Whether `result` is still fresh at `now`.
///
/// An absent result is never fresh. A result computed "in the future"
/// (clock skew between instances) counts as fresh.
pub fn is_fresh(result: Option<&AnalysisResult>, max_age: Duration, now: DateTime<Utc>) -> bool {
    result.is_some_and(|r| is_fresh_at(r.computed_at, max_age, now))
}

/// Timestamp form of [`is_fresh`]: `now - computed_at < max_age`.
pub fn is_fresh_at(computed_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    let Ok(max_age) = chrono::Duration::from_std(max_age) else {
        // Longer than chrono can represent: nothing ever expires.
        return true;
    };
    now.signed_duration_since(computed_at) < max_age
}

/// Instant at which a result computed at `computed_at` turns stale.
pub fn expires_at(computed_at: DateTime<Utc>, max_age: Duration) -> Option<DateTime<Utc>> {
    let max_age = chrono::Duration::from_std(max_age).ok()?;
    computed_at.checked_add_signed(max_age)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Freshness flips from true to false exactly once as time advances.
        #[test]
        fn freshness_is_monotone(
            computed in 0i64..1_000_000,
            max_age_secs in 1u64..1_000_000,
            mut offsets in proptest::collection::vec(0i64..3_000_000, 1..50),
        ) {
            offsets.sort_unstable();
            let computed_at = DateTime::from_timestamp(computed, 0).unwrap();
            let max_age = Duration::from_secs(max_age_secs);
            let flags: Vec<bool> = offsets
                .iter()
                .map(|o| {
                    let now = DateTime::from_timestamp(computed + o, 0).unwrap();
                    is_fresh_at(computed_at, max_age, now)
                })
                .collect();
            let transitions = flags.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert!(transitions <= 1);
            if let Some(pos) = flags.iter().position(|f| !f) {
                prop_assert!(flags[pos..].iter().all(|f| !f));
            }
            for (o, f) in offsets.iter().zip(&flags) {
                let expected = i128::from(*o) < i128::from(max_age_secs);
                prop_assert_eq!(*f, expected);
            }
        }
    }
}
