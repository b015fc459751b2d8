use serde::{Deserialize, Serialize};

use super::geometry::TpcId;
use super::vector::Vector3;

fn default_valid() -> bool {
    true
}

/// One reconstructed point along a track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Vector3,
    /// Unit momentum direction at the point
    pub direction: Vector3,
    /// False when the point has no associated hit
    #[serde(default = "default_valid")]
    pub valid: bool,
}

impl TrajectoryPoint {
    pub fn new(position: Vector3, direction: Vector3) -> Self {
        Self {
            position,
            direction,
            valid: true,
        }
    }
}

/// A reconstructed TPC track, as handed over by the upstream reconstruction.
///
/// `tpcs` lists the TPCs the track's hits were collected in; it is what the
/// drift direction and allowed drift window are derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    pub points: Vec<TrajectoryPoint>,
    #[serde(default)]
    pub tpcs: Vec<TpcId>,
}

impl Track {
    pub fn new(id: u32, points: Vec<TrajectoryPoint>, tpcs: Vec<TpcId>) -> Self {
        Self { id, points, tpcs }
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// First point (vertex); the origin for an empty track
    pub fn start(&self) -> Vector3 {
        self.points.first().map(|p| p.position).unwrap_or_else(Vector3::zeros)
    }

    pub fn end(&self) -> Vector3 {
        self.points.last().map(|p| p.position).unwrap_or_else(Vector3::zeros)
    }

    /// Position of point `index`, clamped to the last point
    pub fn location_at_point(&self, index: usize) -> Vector3 {
        if self.points.is_empty() {
            return Vector3::zeros();
        }
        self.points[index.min(self.points.len() - 1)].position
    }

    pub fn direction_at_point(&self, index: usize) -> Vector3 {
        if self.points.is_empty() {
            return Vector3::zeros();
        }
        self.points[index.min(self.points.len() - 1)].direction
    }

    pub fn valid_points(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.points.iter().filter(|p| p.valid)
    }

    /// Length summed over consecutive valid points
    pub fn length(&self) -> f64 {
        let mut total = 0.0;
        let mut previous: Option<Vector3> = None;
        for point in self.valid_points() {
            if let Some(prev) = previous {
                total += (point.position - prev).norm();
            }
            previous = Some(point.position);
        }
        total
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::vector::unit;

    /// Straight track from `start` to `end` sampled with `n` points
    pub(crate) fn straight_track(start: Vector3, end: Vector3, n: usize, tpcs: Vec<TpcId>) -> Track {
        let dir = unit(&(end - start));
        let points = (0..n)
            .map(|i| {
                let frac = i as f64 / (n - 1) as f64;
                TrajectoryPoint::new(start + (end - start) * frac, dir)
            })
            .collect();
        Track::new(0, points, tpcs)
    }

    #[test]
    fn test_length_skips_invalid_points() {
        let mut track = straight_track(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 100.0),
            11,
            vec![],
        );
        assert!((track.length() - 100.0).abs() < 1e-9);
        // An invalid interior point leaves the straight length unchanged
        track.points[4].position = Vector3::new(50.0, 50.0, 50.0);
        track.points[4].valid = false;
        assert!((track.length() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_track() {
        let track = Track::default();
        assert_eq!(track.length(), 0.0);
        assert_eq!(track.start(), Vector3::zeros());
        assert_eq!(track.location_at_point(3), Vector3::zeros());
    }
}
