use rand::{Rng, RngCore};
use rand_mt::Mt;
use tracing::debug;

use crate::constants::{CLUSTER_COUNT, COORD_MAX, COORD_MIN, RADIUS_MAX, RADIUS_MIN};
use crate::geo::GeoPoint;

/// A region pairs are drawn around. Offsets are uniform in `radius_range` on
/// each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    pub center: GeoPoint,
    pub radius_range: (f64, f64),
}

impl Cluster {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let x = rng.gen_range(COORD_MIN..COORD_MAX);
        let y = rng.gen_range(COORD_MIN..COORD_MAX);
        let r = rng.gen_range(RADIUS_MIN..RADIUS_MAX);
        Self {
            center: GeoPoint::new(x, y),
            radius_range: (-r, r),
        }
    }
}

/// MT19937 seeded the way the generator CLI seeds it.
pub fn seeded_rng(seed: u32) -> Mt {
    Mt::new(seed)
}

/// Draws the per-run cluster set. Each cluster consumes center x, center y,
/// then radius, in that order.
pub fn generate_clusters<R: Rng + ?Sized>(rng: &mut R) -> [Cluster; CLUSTER_COUNT] {
    let clusters: [Cluster; CLUSTER_COUNT] = std::array::from_fn(|_| Cluster::random(rng));
    debug!(count = CLUSTER_COUNT, first = ?clusters[0], "generated clusters");
    clusters
}

pub fn pick_cluster<R: RngCore + ?Sized>(rng: &mut R) -> usize {
    rng.next_u32() as usize % CLUSTER_COUNT
}

/// Center plus one offset per axis (x first). The result is not clipped.
pub fn sample_point<R: Rng + ?Sized>(cluster: &Cluster, rng: &mut R) -> GeoPoint {
    let (lo, hi) = cluster.radius_range;
    let dx = rng.gen_range(lo..hi);
    let dy = rng.gen_range(lo..hi);
    GeoPoint::new(cluster.center.x + dx, cluster.center.y + dy)
}
