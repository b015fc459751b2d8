use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::aux_det::AuxDetType;
use super::crt_hit::TimestampMode;
use super::error::ConfigError;
use super::geometry::{BoxTpcGeometry, TpcId, TpcOffsetSpaceCharge, TpcVolume};
use super::vector::Vector3;

/// How the track direction at an endpoint is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionMethod {
    /// Line from the endpoint to an interior point, both drift and SCE corrected
    #[default]
    Endpoint,
    /// Average of the trajectory directions over a fraction of the track
    Average,
}

/// Shape given to the CRT hit when computing the distance of closest approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcaMode {
    #[default]
    Point,
    /// Rectangle spanned by the hit position uncertainties
    Box,
}

/// Figure of merit used to pick the best of several candidate hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRanking {
    #[default]
    Dca,
    /// DCA divided by the extrapolation length
    DcaOverLength,
}

/// Parameters of the CRT hit to TPC track matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Tracks shorter than this (cm) are never matched
    pub min_track_length: f64,
    /// Fraction of the track used for the direction estimate
    pub track_direction_frac: f64,
    /// Largest DCA (cm) for a hit to become a candidate
    pub distance_limit: f64,
    pub timestamp_mode: TimestampMode,
    /// Added to the absolute ts0 time reported for a matched track (us)
    pub time_correction: f64,
    /// Apply space charge corrections to the shifted track positions
    pub sce_pos_corr: bool,
    pub direction_method: DirectionMethod,
    pub dca_mode: DcaMode,
    pub ranking: CandidateRanking,
    /// Largest DCA / extrapolation length accepted for the best candidate
    pub d_over_l_limit: f64,
    /// Minimum hit photoelectrons
    pub pe_cut: f64,
    /// Largest accepted hit position uncertainty (cm)
    pub max_uncert: f64,
    /// Slack on each side of the allowed drift window (us)
    pub time_margin: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_track_length: 20.0,
            track_direction_frac: 0.5,
            distance_limit: 100.0,
            timestamp_mode: TimestampMode::Ts0,
            time_correction: 0.0,
            sce_pos_corr: true,
            direction_method: DirectionMethod::Endpoint,
            dca_mode: DcaMode::Point,
            ranking: CandidateRanking::Dca,
            d_over_l_limit: 1.0,
            pe_cut: 0.0,
            max_uncert: 1000.0,
            time_margin: 10.0,
        }
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(name, value.to_string()))
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_finite("min_track_length", self.min_track_length)?;
        check_finite("time_correction", self.time_correction)?;
        check_finite("pe_cut", self.pe_cut)?;
        if !(self.track_direction_frac > 0.0 && self.track_direction_frac <= 1.0) {
            return Err(ConfigError::InvalidValue(
                "track_direction_frac",
                self.track_direction_frac.to_string(),
            ));
        }
        if !(self.distance_limit > 0.0) {
            return Err(ConfigError::InvalidValue(
                "distance_limit",
                self.distance_limit.to_string(),
            ));
        }
        if !(self.d_over_l_limit > 0.0) {
            return Err(ConfigError::InvalidValue(
                "d_over_l_limit",
                self.d_over_l_limit.to_string(),
            ));
        }
        if !(self.max_uncert > 0.0) {
            return Err(ConfigError::InvalidValue(
                "max_uncert",
                self.max_uncert.to_string(),
            ));
        }
        if !(self.time_margin >= 0.0) || !self.time_margin.is_finite() {
            return Err(ConfigError::InvalidValue(
                "time_margin",
                self.time_margin.to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the CRT front-end simulation.
///
/// Times are in ns unless noted, charges in ADC counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetSimConfig {
    pub seed: u64,
    pub verbose: bool,
    /// Added to the true deposit time
    pub global_t0_offset: f64,
    pub t_delay_norm: f64,
    pub t_delay_shift: f64,
    pub t_delay_sigma: f64,
    pub t_delay_offset: f64,
    pub t_delay_rms_gaus_norm: f64,
    pub t_delay_rms_gaus_shift: f64,
    pub t_delay_rms_gaus_sigma: f64,
    pub t_delay_rms_exp_norm: f64,
    pub t_delay_rms_exp_shift: f64,
    pub t_delay_rms_exp_scale: f64,
    /// Light propagation delay along the fibre (ns/m)
    pub prop_delay: f64,
    pub prop_delay_error: f64,
    /// Time resolution of the TDC interpolator
    pub t_res_interpolator: f64,
    /// Scale the light yield with the deposited energy
    pub use_edep: bool,
    /// Energy deposit of a normally incident MIP (GeV)
    pub q0: f64,
    pub q_ped: f64,
    pub q_slope: f64,
    pub q_rms: f64,
    pub q_threshold_c: f64,
    pub q_threshold_m: f64,
    pub q_threshold_d: f64,
    /// Largest tick difference between the two fibres of a CERN strip
    pub strip_coincidence_window: f64,
    pub apply_coincidence_c: bool,
    pub apply_coincidence_m: bool,
    pub apply_coincidence_d: bool,
    pub layer_coincidence_window_c: f64,
    pub layer_coincidence_window_m: f64,
    pub layer_coincidence_window_d: f64,
    /// Front-end dead time after a trigger (us)
    pub dead_time: f64,
    /// Window in which repeated hits on a channel add their charge (us)
    pub bias_time: f64,
    /// Trigger clock frequency (MHz)
    pub trigger_clock_frequency: f64,
}

impl Default for DetSimConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            verbose: false,
            global_t0_offset: 1.6e6,
            t_delay_norm: 4125.74,
            t_delay_shift: -300.31,
            t_delay_sigma: 90.392,
            t_delay_offset: -1.525,
            t_delay_rms_gaus_norm: 2.09138,
            t_delay_rms_gaus_shift: 7.23993,
            t_delay_rms_gaus_sigma: 170.027,
            t_delay_rms_exp_norm: 1.6544,
            t_delay_rms_exp_shift: 75.6183,
            t_delay_rms_exp_scale: 79.3543,
            prop_delay: 6.1,
            prop_delay_error: 0.7,
            t_res_interpolator: 1.268,
            use_edep: true,
            q0: 0.0017,
            q_ped: 63.6,
            q_slope: 131.9,
            q_rms: 15.0,
            q_threshold_c: 100.0,
            q_threshold_m: 100.0,
            q_threshold_d: 100.0,
            strip_coincidence_window: 30.0,
            apply_coincidence_c: true,
            apply_coincidence_m: true,
            apply_coincidence_d: true,
            layer_coincidence_window_c: 150.0,
            layer_coincidence_window_m: 150.0,
            layer_coincidence_window_d: 150.0,
            dead_time: 22.0,
            bias_time: 0.5,
            trigger_clock_frequency: 16.0,
        }
    }
}

impl DetSimConfig {
    /// ADC threshold for a channel of the given module type
    pub fn q_threshold(&self, det_type: AuxDetType) -> f64 {
        match det_type {
            AuxDetType::Cern => self.q_threshold_c,
            AuxDetType::Dc => self.q_threshold_d,
            AuxDetType::Minos => self.q_threshold_m,
        }
    }

    pub fn apply_coincidence(&self, det_type: AuxDetType) -> bool {
        match det_type {
            AuxDetType::Cern => self.apply_coincidence_c,
            AuxDetType::Dc => self.apply_coincidence_d,
            AuxDetType::Minos => self.apply_coincidence_m,
        }
    }

    /// Layer coincidence (track and hold) window in us
    pub fn layer_coincidence_window_us(&self, det_type: AuxDetType) -> f64 {
        let window = match det_type {
            AuxDetType::Cern => self.layer_coincidence_window_c,
            AuxDetType::Dc => self.layer_coincidence_window_d,
            AuxDetType::Minos => self.layer_coincidence_window_m,
        };
        window * 1e-3
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.trigger_clock_frequency > 0.0) {
            return Err(ConfigError::InvalidValue(
                "trigger_clock_frequency",
                self.trigger_clock_frequency.to_string(),
            ));
        }
        if !(self.q0 > 0.0) {
            return Err(ConfigError::InvalidValue("q0", self.q0.to_string()));
        }
        for (name, value) in [
            ("layer_coincidence_window_c", self.layer_coincidence_window_c),
            ("layer_coincidence_window_m", self.layer_coincidence_window_m),
            ("layer_coincidence_window_d", self.layer_coincidence_window_d),
            ("dead_time", self.dead_time),
            ("bias_time", self.bias_time),
            ("strip_coincidence_window", self.strip_coincidence_window),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::InvalidValue(name, value.to_string()));
            }
        }
        Ok(())
    }
}

/// A space charge offset applied to every position in one TPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpcOffset {
    pub tpc: TpcId,
    pub offset: Vector3,
}

/// Description of the TPCs used by the matcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// cm/us
    pub drift_velocity: f64,
    pub tpcs: Vec<TpcVolume>,
    /// Empty to run without space charge corrections
    #[serde(default)]
    pub space_charge: Vec<TpcOffset>,
}

impl Default for GeometryConfig {
    /// The four ICARUS TPCs, two per cryostat, each pair sharing a central cathode
    fn default() -> Self {
        let tpc = |id: TpcId, x_low: f64, x_high: f64, drift_direction: i32| TpcVolume {
            id,
            min: Vector3::new(x_low, -181.86, -894.95),
            max: Vector3::new(x_high, 134.96, 894.95),
            drift_direction,
        };
        Self {
            drift_velocity: 0.157,
            tpcs: vec![
                tpc(0, -358.49, -210.29, -1),
                tpc(1, -210.29, -61.94, 1),
                tpc(2, 61.94, 210.29, -1),
                tpc(3, 210.29, 358.49, 1),
            ],
            space_charge: vec![],
        }
    }
}

impl GeometryConfig {
    pub fn build_geometry(&self) -> Result<BoxTpcGeometry, ConfigError> {
        BoxTpcGeometry::new(self.tpcs.clone(), self.drift_velocity)
    }

    pub fn build_space_charge(&self) -> TpcOffsetSpaceCharge {
        let offsets: Vec<(TpcId, Vector3)> = self
            .space_charge
            .iter()
            .map(|entry| (entry.tpc, entry.offset))
            .collect();
        TpcOffsetSpaceCharge::new(&offsets)
    }
}

/// Structure representing the application configuration. Contains pathing and algorithm parameters
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of YAML event files
    pub event_path: PathBuf,
    /// Directory the results are written to
    pub output_path: PathBuf,
    /// CSV description of the CRT strips, required for the front-end simulation
    pub strip_table_path: Option<PathBuf>,
    pub n_threads: i32,
    #[serde(default)]
    pub matching: MatchConfig,
    /// None to skip the front-end simulation
    #[serde(default)]
    pub simulation: Option<DetSimConfig>,
    #[serde(default)]
    pub geometry: GeometryConfig,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            event_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            strip_table_path: None,
            n_threads: 1,
            matching: MatchConfig::default(),
            simulation: Some(DetSimConfig::default()),
            geometry: GeometryConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every algorithm parameter
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::InvalidValue(
                "n_threads",
                self.n_threads.to_string(),
            ));
        }
        self.matching.validate()?;
        if let Some(sim) = &self.simulation {
            sim.validate()?;
        }
        self.geometry.build_geometry()?;
        Ok(())
    }

    /// Get the path of the results file for a given event file
    pub fn get_output_file_name(&self, event_file: &Path) -> Result<PathBuf, ConfigError> {
        if !self.output_path.exists() {
            return Err(ConfigError::BadFilePath(self.output_path.clone()));
        }
        let stem = event_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("events"));
        Ok(self.output_path.join(format!("{stem}_crt.yml")))
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn run_simulation(&self) -> bool {
        self.simulation.is_some() && self.strip_table_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_template_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).expect("serializable");
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.yml");
        let mut file = std::fs::File::create(&path).expect("file");
        file.write_all(yaml.as_bytes()).expect("write");

        let read = Config::read_config_file(&path).expect("valid template");
        assert_eq!(read.geometry.tpcs.len(), 4);
        assert_eq!(read.matching.direction_method, DirectionMethod::Endpoint);
        assert!(read.simulation.is_some());
        assert!(!read.run_simulation());
    }

    #[test]
    fn test_partial_matching_section_uses_defaults() {
        let yaml = "event_path: /data/events\noutput_path: /data/out\nstrip_table_path: null\nn_threads: 2\nmatching:\n  dca_mode: box\n  ranking: dca_over_length\n";
        let config: Config = serde_yaml::from_str(yaml).expect("valid yaml");
        assert_eq!(config.matching.dca_mode, DcaMode::Box);
        assert_eq!(config.matching.ranking, CandidateRanking::DcaOverLength);
        assert_eq!(config.matching.distance_limit, 100.0);
        assert!(config.simulation.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.n_threads = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.matching.track_direction_frac = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.geometry.drift_velocity = 0.0;
        assert!(config.validate().is_err());

        assert!(matches!(
            Config::read_config_file(Path::new("/definitely/not/here.yml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
