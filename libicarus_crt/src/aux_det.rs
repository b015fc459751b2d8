use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::constants::STRIP_BOUNDARY_TOLERANCE;
use super::error::AuxDetError;
use super::vector::Vector3;

/// The three CRT module technologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuxDetType {
    /// CERN modules, two fibres per strip read out at the same end
    #[serde(rename = "c")]
    Cern,
    /// Double Chooz modules
    #[serde(rename = "d")]
    Dc,
    /// MINOS modules, read out at both ends
    #[serde(rename = "m")]
    Minos,
}

impl AuxDetType {
    pub fn as_char(&self) -> char {
        match self {
            Self::Cern => 'c',
            Self::Dc => 'd',
            Self::Minos => 'm',
        }
    }
}

impl FromStr for AuxDetType {
    type Err = AuxDetError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "c" || s == "CERN" {
            Ok(Self::Cern)
        } else if s == "d" || s == "DC" {
            Ok(Self::Dc)
        } else if s == "m" || s == "MINOS" {
            Ok(Self::Minos)
        } else {
            Err(AuxDetError::InvalidType(s.to_string()))
        }
    }
}

impl Display for AuxDetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Location of a module in the CRT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CrtRegion {
    Top,
    SlopeLeft,
    SlopeRight,
    SlopeFront,
    SlopeBack,
    Left,
    Right,
    Front,
    Back,
    Bottom,
}

impl CrtRegion {
    /// Region number used in the readout bookkeeping
    pub fn number(&self) -> u32 {
        match self {
            Self::Top => 38,
            Self::SlopeLeft => 52,
            Self::SlopeRight => 56,
            Self::SlopeFront => 48,
            Self::SlopeBack => 46,
            Self::Left => 50,
            Self::Right => 54,
            Self::Front => 44,
            Self::Back => 42,
            Self::Bottom => 58,
        }
    }
}

impl FromStr for CrtRegion {
    type Err = AuxDetError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Top" => Ok(Self::Top),
            "SlopeLeft" => Ok(Self::SlopeLeft),
            "SlopeRight" => Ok(Self::SlopeRight),
            "SlopeFront" => Ok(Self::SlopeFront),
            "SlopeBack" => Ok(Self::SlopeBack),
            "Left" => Ok(Self::Left),
            "Right" => Ok(Self::Right),
            "Front" => Ok(Self::Front),
            "Back" => Ok(Self::Back),
            "Bottom" => Ok(Self::Bottom),
            _ => Err(AuxDetError::InvalidRegion(s.to_string())),
        }
    }
}

impl Display for CrtRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn component(&self, v: &Vector3) -> f64 {
        match self {
            Self::X => v.x,
            Self::Y => v.y,
            Self::Z => v.z,
        }
    }
}

impl FromStr for Axis {
    type Err = AuxDetError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Self::X),
            "y" | "Y" => Ok(Self::Y),
            "z" | "Z" => Ok(Self::Z),
            _ => Err(AuxDetError::InvalidAxis(s.to_string())),
        }
    }
}

/// An axis-aligned scintillator strip.
///
/// Strip-local coordinates have their origin at the strip centre with x across
/// the strip width, z along its length (toward the readout end at
/// `+half_length`) and y through its thickness.
#[derive(Debug, Clone, PartialEq)]
pub struct StripGeo {
    /// Module (AuxDet) id
    pub adid: u32,
    /// Strip (sensitive volume) id within the module
    pub adsid: u32,
    pub det_type: AuxDetType,
    pub region: CrtRegion,
    /// Which of the two crossed layers of the tagger the strip belongs to
    pub layer: u32,
    /// Module stack, only meaningful for the side MINOS walls
    pub stack: u32,
    pub center: Vector3,
    pub half_width: f64,
    pub half_height: f64,
    pub half_length: f64,
    pub length_axis: Axis,
    pub width_axis: Axis,
}

impl StripGeo {
    fn height_axis(&self) -> Axis {
        match (self.length_axis, self.width_axis) {
            (Axis::X, Axis::Y) | (Axis::Y, Axis::X) => Axis::Z,
            (Axis::X, Axis::Z) | (Axis::Z, Axis::X) => Axis::Y,
            _ => Axis::X,
        }
    }

    /// Position of a world point in the strip frame
    pub fn world_to_local(&self, world: &Vector3) -> Vector3 {
        let rel = *world - self.center;
        Vector3::new(
            self.width_axis.component(&rel),
            self.height_axis().component(&rel),
            self.length_axis.component(&rel),
        )
    }

    pub fn contains_local(&self, local: &Vector3) -> bool {
        local.x.abs() <= self.half_width + STRIP_BOUNDARY_TOLERANCE
            && local.y.abs() <= self.half_height + STRIP_BOUNDARY_TOLERANCE
            && local.z.abs() <= self.half_length + STRIP_BOUNDARY_TOLERANCE
    }

    /// Distance (m) from a local point to the readout end and to the far end
    pub fn distances_to_ends(&self, local: &Vector3) -> (f64, f64) {
        (
            (self.half_length - local.z).abs() * 0.01,
            (-self.half_length - local.z).abs() * 0.01,
        )
    }
}

/// Read-only lookup of CRT strip geometry
pub trait AuxDetGeometry {
    fn strip(&self, adid: u32, adsid: u32) -> Option<&StripGeo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip() -> StripGeo {
        StripGeo {
            adid: 3,
            adsid: 1,
            det_type: AuxDetType::Minos,
            region: CrtRegion::Left,
            layer: 0,
            stack: 1,
            center: Vector3::new(100.0, 0.0, 50.0),
            half_width: 2.0,
            half_height: 0.5,
            half_length: 400.0,
            length_axis: Axis::Y,
            width_axis: Axis::Z,
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(AuxDetType::from_str("m").unwrap(), AuxDetType::Minos);
        assert_eq!(AuxDetType::from_str("CERN").unwrap(), AuxDetType::Cern);
        assert!(AuxDetType::from_str("e").is_err());
        assert_eq!(CrtRegion::from_str("SlopeBack").unwrap().number(), 46);
        assert!(CrtRegion::from_str("Roof").is_err());
        assert_eq!(AuxDetType::Dc.to_string(), "d");
    }

    #[test]
    fn test_local_frame() {
        let s = strip();
        let local = s.world_to_local(&Vector3::new(100.25, 100.0, 51.0));
        assert_eq!(local, Vector3::new(1.0, 0.25, 100.0));
        assert!(s.contains_local(&local));
        assert!(!s.contains_local(&Vector3::new(2.5, 0.0, 0.0)));

        let (near, far) = s.distances_to_ends(&local);
        assert!((near - 3.0).abs() < 1e-9);
        assert!((far - 5.0).abs() < 1e-9);
    }
}
