use std::io::{BufWriter, Write};

use rand::RngCore;
use tracing::debug;

use crate::clip::clip_coordinate;
use crate::cluster::{generate_clusters, pick_cluster, sample_point, seeded_rng, Cluster};
use crate::constants::{EARTH_RADIUS_KM, FLOAT_PRECISION};
use crate::error::{HaversineError, Result};
use crate::geo::{reference_haversine, GeoPair, GeoPoint};

/// Which coordinates feed the expected average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceBasis {
    /// The clipped values that are written to the stream.
    #[default]
    Clipped,
    /// The raw values before clipping. The parser cannot reproduce this sum.
    Unclipped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatasetSummary {
    pub pair_count: u64,
    pub expected_average: f64,
}

/// Writes `count` pairs to `out` and returns the average reference distance.
///
/// Draw order per pair is cluster index, x offset, y offset for the first
/// point, then the same for the second.
pub fn write_dataset<R, W>(
    rng: &mut R,
    count: u64,
    out: W,
    basis: DistanceBasis,
) -> Result<DatasetSummary>
where
    R: RngCore + ?Sized,
    W: Write,
{
    if count == 0 {
        return Err(HaversineError::DegenerateInput {
            what: "pair count must be at least 1",
        });
    }

    let clusters = generate_clusters(rng);
    let mut out = BufWriter::new(out);
    let mut sum = 0.0;

    writeln!(out, "{{\"pairs\":[").map_err(write_error)?;
    for i in 0..count {
        let (raw, clipped) = next_pair(&clusters, rng);
        let measured = match basis {
            DistanceBasis::Clipped => clipped,
            DistanceBasis::Unclipped => raw,
        };
        sum += reference_haversine(measured.p0, measured.p1, EARTH_RADIUS_KM);

        write_pair(&mut out, &clipped).map_err(write_error)?;
        if i + 1 != count {
            out.write_all(b",").map_err(write_error)?;
        }
        out.write_all(b"\n").map_err(write_error)?;
    }
    writeln!(out, "]}}").map_err(write_error)?;
    out.flush().map_err(write_error)?;

    let expected_average = sum / count as f64;
    debug!(count, expected_average, ?basis, "dataset written");
    Ok(DatasetSummary {
        pair_count: count,
        expected_average,
    })
}

/// Generates a complete dataset in memory.
pub fn generate(seed: u32, count: u64) -> Result<(String, f64)> {
    let mut buf = Vec::new();
    let summary = write_dataset(&mut seeded_rng(seed), count, &mut buf, DistanceBasis::Clipped)?;
    // only ASCII is ever written
    let text = String::from_utf8_lossy(&buf).into_owned();
    Ok((text, summary.expected_average))
}

/// Returns the pair before and after clipping.
fn next_pair<R: RngCore + ?Sized>(
    clusters: &[Cluster],
    rng: &mut R,
) -> (GeoPair, GeoPair) {
    let raw0 = sample_point(&clusters[pick_cluster(rng)], rng);
    let raw1 = sample_point(&clusters[pick_cluster(rng)], rng);
    let raw = GeoPair::new(raw0, raw1);
    let clipped = GeoPair::new(clip_point(raw0), clip_point(raw1));
    (raw, clipped)
}

fn clip_point(p: GeoPoint) -> GeoPoint {
    GeoPoint::new(clip_coordinate(p.x), clip_coordinate(p.y))
}

fn write_pair<W: Write>(out: &mut W, pair: &GeoPair) -> std::io::Result<()> {
    write!(
        out,
        "{{\"x0\":{:.prec$},\"y0\":{:.prec$},\"x1\":{:.prec$},\"y1\":{:.prec$}}}",
        pair.p0.x,
        pair.p0.y,
        pair.p1.x,
        pair.p1.y,
        prec = FLOAT_PRECISION
    )
}

fn write_error(source: std::io::Error) -> HaversineError {
    HaversineError::Io {
        context: "writing dataset",
        source,
    }
}
