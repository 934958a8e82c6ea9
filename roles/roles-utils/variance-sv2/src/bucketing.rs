//! Bucket sizing for stability history charts.
//!
//! Persisted variance records arrive once per poll per window, so a 30-day
//! query can hold tens of thousands of rows. Charts want roughly
//! [`TARGET_POINTS`] points whatever the range, so records are grouped into
//! buckets whose size is snapped up to a readable interval.

/// Readable bucket sizes in seconds: 1m, 5m, 15m, 30m, 1h, 2h, 3h, 6h.
const BUCKET_SIZES: &[u64] = &[60, 300, 900, 1800, 3600, 7200, 10800, 21600];

/// Points per chart the dashboard asks for.
pub const TARGET_POINTS: u64 = 60;

/// Smallest readable bucket that keeps `[from, to]` at or under `target_points` buckets.
///
/// Ranges longer than `target_points` six-hour buckets fall back to six hours.
pub fn bucket_size_for_range(from: u64, to: u64, target_points: u64) -> u64 {
    let span = to.saturating_sub(from);
    if span == 0 || target_points == 0 {
        return BUCKET_SIZES[0];
    }

    let ideal = span / target_points;
    BUCKET_SIZES
        .iter()
        .copied()
        .find(|&size| size >= ideal)
        .unwrap_or(BUCKET_SIZES[BUCKET_SIZES.len() - 1])
}

/// Start of the bucket containing `timestamp`.
pub fn bucket_start(timestamp: u64, bucket_seconds: u64) -> u64 {
    if bucket_seconds == 0 {
        return timestamp;
    }
    timestamp - timestamp % bucket_seconds
}
