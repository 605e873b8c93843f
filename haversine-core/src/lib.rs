//! Synthetic haversine dataset generation and strict streaming aggregation.
//!
//! The generator and the parser share [`reference_haversine`] so that the
//! average written out-of-band by one can be checked against the average
//! recomputed by the other.

pub mod clip;
pub mod cluster;
pub mod constants;
pub mod error;
pub mod generate;
pub mod geo;
pub mod parse;
pub mod timer;

pub use clip::{clip_coordinate, reflect};
pub use cluster::{generate_clusters, pick_cluster, sample_point, seeded_rng, Cluster};
pub use error::{FormatError, HaversineError, Result};
pub use generate::{generate, write_dataset, DatasetSummary, DistanceBasis};
pub use geo::{reference_haversine, GeoPair, GeoPoint};
pub use parse::{aggregate, aggregate_with_radius, Aggregation, PairReader};
pub use timer::{calibrate, measure, time_cycles, CalibrationSample, CycleClock, Timed};
