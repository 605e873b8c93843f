use crate::constants::{COORD_MAX, COORD_MIN, COORD_SHIFT};

/// Mirrors `value` once at whichever boundary of `[min, max)` it crosses.
///
/// A value sitting exactly on `max` maps to `min`. Callers only feed values
/// within one range-width of the interval, so a single reflection is enough.
pub fn reflect(value: f64, min: f64, max: f64) -> f64 {
    let mut v = value;
    if v < min {
        v = 2.0 * min - v;
    } else if v >= max {
        v = 2.0 * max - v;
    }
    if v >= max {
        v = min;
    }
    v
}

/// Maps a raw generated coordinate into `[-180, 180)`.
pub fn clip_coordinate(raw: f64) -> f64 {
    reflect(raw, COORD_MIN, COORD_MAX) - COORD_SHIFT
}
