//! Wall-clock alignment of cadence boundaries.
//!
//! Every boundary is a whole multiple of the cadence counted from the Unix
//! epoch. For cadences that divide an hour this is the top of each UTC hour
//! and its even subdivisions (`:00`, `:15`, `:30`, `:45` for 15 minutes), and
//! a coarser cadence that is a multiple of a finer one only ever lands on
//! the finer one's boundaries.
//!
//! All functions are pure; callers pass the current time in.

use crate::entities::Cadence;
use time::OffsetDateTime;

const NANOS_PER_MILLI: i128 = 1_000_000;

fn cadence_nanos(cadence: Cadence) -> i128 {
    i128::from(cadence.as_millis()) * NANOS_PER_MILLI
}

/// Smallest instant `>= now` that lies on a `cadence` boundary.
pub fn next_boundary(now: OffsetDateTime, cadence: Cadence) -> OffsetDateTime {
    let step = cadence_nanos(cadence);
    let rem = now.unix_timestamp_nanos().rem_euclid(step);
    if rem == 0 {
        return now;
    }
    let ahead = i64::try_from(step - rem).unwrap_or(i64::MAX);
    now + time::Duration::nanoseconds(ahead)
}

/// How long to wait from `now` until [`next_boundary`]. Zero when `now` is
/// exactly on a boundary.
pub fn delay_until_next_boundary(now: OffsetDateTime, cadence: Cadence) -> std::time::Duration {
    (next_boundary(now, cadence) - now).unsigned_abs()
}

/// Index of the `cadence` boundary nearest to `at`.
///
/// Rounding to the nearest boundary (rather than flooring) keeps a timer
/// that wakes a few milliseconds late, or a clock that was stepped back a
/// little, attributed to the tick it was aiming for.
pub fn tick_index(at: OffsetDateTime, cadence: Cadence) -> i64 {
    let step = cadence_nanos(cadence);
    (at.unix_timestamp_nanos() + step / 2).div_euclid(step) as i64
}

/// The instant of boundary number `index`.
pub fn boundary_at(index: i64, cadence: Cadence) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + time::Duration::milliseconds(index.saturating_mul(cadence.as_millis()))
}

/// Whether a feed with `cadence` is due on tick `index` of the `finest`
/// cadence. `cadence` must be a multiple of `finest`.
pub fn is_due(index: i64, cadence: Cadence, finest: Cadence) -> bool {
    let ratio = i64::from(cadence.minutes() / finest.minutes()).max(1);
    index.rem_euclid(ratio) == 0
}
