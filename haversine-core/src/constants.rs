/// Earth radius (km) used by both the generator and the parser.
pub const EARTH_RADIUS_KM: f64 = 6372.8;

pub const CLUSTER_COUNT: usize = 64;

/// Raw coordinates are generated in `[COORD_MIN, COORD_MAX)` and shifted by
/// `COORD_SHIFT` after clipping.
pub const COORD_MIN: f64 = 0.0;
pub const COORD_MAX: f64 = 360.0;
pub const COORD_SHIFT: f64 = 180.0;

pub const RADIUS_MIN: f64 = 0.5;
pub const RADIUS_MAX: f64 = 50.0;

/// Fractional digits written for every coordinate.
pub const FLOAT_PRECISION: usize = 16;

pub const DEFAULT_CALIBRATION_WAIT_MS: u64 = 100;
pub const DEFAULT_VALIDATION_TOLERANCE: f64 = 1e-9;

pub const OS_CLOCK_NS_PER_SEC: u64 = 1_000_000_000;
