use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::vector::Vector3;

/// Identifier of a single TPC (drift volume)
pub type TpcId = u32;

/// Read-only queries on the TPC geometry and drift properties needed by the matcher.
///
/// Implementations must be reentrant; the matcher calls them once per candidate
/// and never caches the answers.
pub trait TpcGeometry {
    /// The TPC containing a point, if any
    fn tpc_at(&self, point: &Vector3) -> Option<TpcId>;
    /// Electron drift velocity (cm/us)
    fn drift_velocity(&self) -> f64;
    /// X extent of a TPC as (lower, upper); None for an unknown TPC
    fn x_limits(&self, tpc: TpcId) -> Option<(f64, f64)>;
    /// Sign of the drift direction along x for a TPC (+1, -1), 0 for an unknown TPC
    fn drift_direction(&self, tpc: TpcId) -> i32;
}

/// Spatial space-charge correction service.
pub trait SpaceCharge {
    fn is_enabled(&self) -> bool;
    /// Additive offset to apply to a reconstructed position in the given TPC
    fn position_offsets(&self, point: &Vector3, tpc: Option<TpcId>) -> Vector3;
}

/// Space charge corrections switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpaceCharge;

impl SpaceCharge for NoSpaceCharge {
    fn is_enabled(&self) -> bool {
        false
    }

    fn position_offsets(&self, _point: &Vector3, _tpc: Option<TpcId>) -> Vector3 {
        Vector3::zeros()
    }
}

/// A constant correction per TPC. Points outside every TPC are not corrected.
#[derive(Debug, Clone, Default)]
pub struct TpcOffsetSpaceCharge {
    offsets: FxHashMap<TpcId, Vector3>,
}

impl TpcOffsetSpaceCharge {
    pub fn new(offsets: &[(TpcId, Vector3)]) -> Self {
        Self {
            offsets: offsets.iter().copied().collect(),
        }
    }
}

impl SpaceCharge for TpcOffsetSpaceCharge {
    fn is_enabled(&self) -> bool {
        !self.offsets.is_empty()
    }

    fn position_offsets(&self, _point: &Vector3, tpc: Option<TpcId>) -> Vector3 {
        tpc.and_then(|id| self.offsets.get(&id).copied())
            .unwrap_or_else(Vector3::zeros)
    }
}

/// An axis-aligned drift volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpcVolume {
    pub id: TpcId,
    pub min: Vector3,
    pub max: Vector3,
    pub drift_direction: i32,
}

impl TpcVolume {
    fn contains(&self, point: &Vector3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

/// TpcGeometry made of axis-aligned boxes, as described in the configuration.
#[derive(Debug, Clone)]
pub struct BoxTpcGeometry {
    volumes: Vec<TpcVolume>,
    drift_velocity: f64,
}

impl BoxTpcGeometry {
    pub fn new(volumes: Vec<TpcVolume>, drift_velocity: f64) -> Result<Self, ConfigError> {
        if drift_velocity <= 0.0 || !drift_velocity.is_finite() {
            return Err(ConfigError::InvalidValue(
                "drift_velocity",
                drift_velocity.to_string(),
            ));
        }
        for volume in volumes.iter() {
            if volume.drift_direction.abs() != 1 {
                return Err(ConfigError::InvalidValue(
                    "drift_direction",
                    format!("TPC {} has drift direction {}", volume.id, volume.drift_direction),
                ));
            }
            if volume.min.x > volume.max.x || volume.min.y > volume.max.y || volume.min.z > volume.max.z
            {
                return Err(ConfigError::InvalidValue(
                    "tpcs",
                    format!("TPC {} has min corner above max corner", volume.id),
                ));
            }
        }
        Ok(Self {
            volumes,
            drift_velocity,
        })
    }

    fn volume(&self, tpc: TpcId) -> Option<&TpcVolume> {
        self.volumes.iter().find(|v| v.id == tpc)
    }
}

impl TpcGeometry for BoxTpcGeometry {
    fn tpc_at(&self, point: &Vector3) -> Option<TpcId> {
        self.volumes
            .iter()
            .find(|v| v.contains(point))
            .map(|v| v.id)
    }

    fn drift_velocity(&self) -> f64 {
        self.drift_velocity
    }

    fn x_limits(&self, tpc: TpcId) -> Option<(f64, f64)> {
        self.volume(tpc).map(|v| (v.min.x, v.max.x))
    }

    fn drift_direction(&self, tpc: TpcId) -> i32 {
        self.volume(tpc).map(|v| v.drift_direction).unwrap_or(0)
    }
}

/// Drift direction shared by all TPCs a track's hits were collected in.
///
/// Tracks crossing the cathode (hits in TPCs drifting in opposite directions)
/// are stitched, and get 0, as do tracks with no known TPC.
pub fn drift_direction_from_tpcs(geometry: &dyn TpcGeometry, tpcs: &[TpcId]) -> i32 {
    let mut direction = 0;
    for tpc in tpcs {
        let this_dir = geometry.drift_direction(*tpc);
        if this_dir == 0 {
            continue;
        }
        if direction == 0 {
            direction = this_dir;
        } else if direction != this_dir {
            return 0;
        }
    }
    direction
}

/// X extent covered by the TPCs a track's hits were collected in
pub fn x_limits_from_tpcs(geometry: &dyn TpcGeometry, tpcs: &[TpcId]) -> (f64, f64) {
    let mut limits: Option<(f64, f64)> = None;
    for (low, high) in tpcs.iter().filter_map(|tpc| geometry.x_limits(*tpc)) {
        limits = Some(match limits {
            Some((l, h)) => (l.min(low), h.max(high)),
            None => (low, high),
        });
    }
    limits.unwrap_or((0.0, 0.0))
}
