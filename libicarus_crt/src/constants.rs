// Matching
/// DCA reported when a track has no accepted CRT hit
pub const NO_MATCH_DCA: f64 = -1.0;
/// Time reported alongside [`NO_MATCH_DCA`]
pub const NO_MATCH_TIME: f64 = -99999.0;
/// Hit timestamps are folded into one second around the trigger (ns)
pub const TIMESTAMP_ROLLOVER_NS: u64 = 1_000_000_000;
/// Rollover period expressed in the matching time unit (us)
pub const TIME_ROLLOVER_US: f64 = 1e6;
/// Threshold below which line directions are treated as parallel
pub const SMALL_NUMBER: f64 = 0.00001;

// Front-end simulation
/// Offset added to the FEB address of the far-end MINOS readout
pub const MINOS_DUAL_READOUT_OFFSET: u32 = 50;
/// CERN strips are 50% thicker than the other module types
pub const CERN_THICKNESS_SCALE: f64 = 1.5;
/// Transverse half-distance between the two fibres of a CERN strip (cm)
pub const CERN_FIBER_HALF_SPACING: f64 = 5.5;
/// Slack allowed when checking a deposit lies inside its strip (cm)
pub const STRIP_BOUNDARY_TOLERANCE: f64 = 0.001;
/// Quadratic fit of MINOS test data (w/ S14) for normally incident muons
pub const MINOS_YIELD_P0: f64 = 36.5425;
pub const MINOS_YIELD_P1: f64 = -6.3895;
pub const MINOS_YIELD_P2: f64 = 0.3742;
/// Transverse light collection for CERN strips between the fibres
pub const CERN_CENTER_COEFFS: [f64; 6] = [
    0.682976,
    -0.0204477,
    -0.000707564,
    0.000636617,
    0.000147957,
    -3.89078e-05,
];
/// Transverse light collection of channel 0 for deposits right of both fibres
/// (mirrored for channel 1 left of both fibres)
pub const CERN_RIGHT_COEFFS: [f64; 4] = [0.139941, 0.168238, -0.0198199, 0.000781752];
/// Transverse light collection of channel 0 for deposits left of both fibres
/// (mirrored for channel 1 right of both fibres)
pub const CERN_LEFT_COEFFS: [f64; 5] = [8.78875, 3.54602, 0.595592, 0.0449169, 0.00127892];
