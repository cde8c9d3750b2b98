//! Delivery-window spread.
//!
//! Planned send times are spaced evenly across the campaign's window, one
//! slot per target, with uniform jitter of at most half a slot either side.
//! Clustering at any single instant is therefore bounded by construction —
//! two targets can only collide at adjacent slot boundaries.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Spread `count` send times across `[start, start + window_secs)` using the
/// thread-local RNG.
pub fn spread_send_times(
    start: DateTime<Utc>,
    window_secs: i64,
    count: usize,
) -> Vec<DateTime<Utc>> {
    spread_send_times_with(start, window_secs, count, &mut rand::rng())
}

/// Spread with an injected RNG so tests stay deterministic.
pub fn spread_send_times_with<R: Rng + ?Sized>(
    start: DateTime<Utc>,
    window_secs: i64,
    count: usize,
    rng: &mut R,
) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return Vec::new();
    }
    if window_secs <= 0 {
        return vec![start; count];
    }

    let slot = window_secs as f64 / count as f64;
    let half = slot / 2.0;

    (0..count)
        .map(|i| {
            let base = i as f64 * slot;
            // Sub-second slots get no jitter; clamping keeps every instant
            // inside the window.
            let jitter = if half >= 1.0 {
                rng.random_range(-half..half)
            } else {
                0.0
            };
            let offset = (base + jitter).clamp(0.0, (window_secs - 1) as f64);
            start + Duration::seconds(offset as i64)
        })
        .collect()
}
