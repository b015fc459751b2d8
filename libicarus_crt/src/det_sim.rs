//! Simulation of the CRT front-end response to true energy deposits.
//!
//! Each deposit is turned into photoelectrons on the strip's readout channels,
//! digitized into trigger-clock ticks and ADC counts, and passed through the
//! per-type thresholds. Surviving channel responses are collected per
//! front-end board and handed to the [`CoincidenceSim`] trigger logic.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

use super::aux_det::{AuxDetGeometry, AuxDetType, StripGeo};
use super::channel_map::feb_address;
use super::coincidence::{record_hit, CoincidenceSim, CoincidenceStats, TaggerMap, TypeCounts};
use super::config::DetSimConfig;
use super::constants::{
    CERN_CENTER_COEFFS, CERN_FIBER_HALF_SPACING, CERN_LEFT_COEFFS, CERN_RIGHT_COEFFS,
    CERN_THICKNESS_SCALE, MINOS_YIELD_P0, MINOS_YIELD_P1, MINOS_YIELD_P2,
};
use super::crt_data::{CrtChannelData, CrtData};
use super::elec_clock::ElecClock;
use super::error::ConfigError;
use super::vector::Vector3;

/// A true energy deposit in one strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxDetIde {
    pub entry: Vector3,
    pub exit: Vector3,
    /// ns
    pub entry_t: f64,
    pub exit_t: f64,
    /// GeV
    pub energy_deposited: f64,
}

impl AuxDetIde {
    pub fn midpoint(&self) -> Vector3 {
        (self.entry + self.exit) * 0.5
    }
}

/// All true deposits in one strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxDetSimChannel {
    /// Module id
    pub adid: u32,
    /// Strip id within the module; 0 is never a valid strip
    pub adsid: u32,
    pub ides: Vec<AuxDetIde>,
}

/// Per event bookkeeping of the front-end simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetSimStats {
    pub sim_hits: TypeCounts,
    /// Strip responses passing threshold (and the fibre coincidence for CERN)
    pub above_threshold: TypeCounts,
    pub threshold_misses: TypeCounts,
    pub strip_coincidence_misses: u32,
    pub coincidence: CoincidenceStats,
}

impl DetSimStats {
    fn percent(n: u32, of: u32) -> f64 {
        if of == 0 {
            0.0
        } else {
            100.0 * n as f64 / of as f64
        }
    }

    /// Write the loss summary of an event to the log
    pub fn log_summary(&self, n_readouts: usize) {
        log::info!("CRT triggered readouts: {n_readouts}");
        for det_type in [AuxDetType::Cern, AuxDetType::Dc, AuxDetType::Minos] {
            let passing = self.above_threshold.get(det_type);
            let coin = &self.coincidence;
            log::info!(
                "Type {det_type}: sim hits {} | above threshold {} | lost to threshold {} | open coincidence {} | track and hold {} ({:.1}%) | dead time {} ({:.1}%) | coincidence {} ({:.1}%) | readouts {} with {} hits",
                self.sim_hits.get(det_type),
                passing,
                self.threshold_misses.get(det_type),
                coin.open_coincidence.get(det_type),
                coin.lock.get(det_type),
                Self::percent(coin.lock.get(det_type), passing),
                coin.dead_time.get(det_type),
                Self::percent(coin.dead_time.get(det_type), passing),
                coin.coincidence.get(det_type),
                Self::percent(coin.coincidence.get(det_type), passing),
                coin.readouts.get(det_type),
                coin.readout_hits.get(det_type),
            );
        }
        log::info!(
            "CERN hits lost to the fibre coincidence: {}",
            self.strip_coincidence_misses
        );
        for (region, count) in self.coincidence.region_readouts.iter() {
            log::info!("Region {region}: {count} readouts");
        }
    }
}

/// Readouts of one event and how they came about
#[derive(Debug, Clone, Default)]
pub struct DetSimOutput {
    pub readouts: Vec<CrtData>,
    pub stats: DetSimStats,
}

/// Evaluate a polynomial given its coefficients in ascending power order
fn polynomial(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Expected photoelectrons at `distance` (m) from the readout for a yield scale `qr`
pub fn expected_pe(distance: f64, qr: f64) -> f64 {
    (MINOS_YIELD_P2 * distance * distance + MINOS_YIELD_P1 * distance + MINOS_YIELD_P0) * qr
}

/// Fraction of the light collected by each of the two channels of a strip for
/// a deposit at transverse position `x` (cm).
///
/// Only CERN strips carry two fibres; the other types collect everything.
pub fn transverse_weights(det_type: AuxDetType, x: f64) -> (f64, f64) {
    match det_type {
        AuxDetType::Cern => {
            if x.abs() <= CERN_FIBER_HALF_SPACING {
                (
                    polynomial(&CERN_CENTER_COEFFS, x),
                    polynomial(&CERN_CENTER_COEFFS, -x),
                )
            } else if x > CERN_FIBER_HALF_SPACING {
                (
                    polynomial(&CERN_RIGHT_COEFFS, x),
                    polynomial(&CERN_LEFT_COEFFS, -x),
                )
            } else {
                (
                    polynomial(&CERN_LEFT_COEFFS, x),
                    polynomial(&CERN_RIGHT_COEFFS, -x),
                )
            }
        }
        AuxDetType::Minos | AuxDetType::Dc => (1.0, 1.0),
    }
}

/// Photoelectron counts of one deposit
struct PeResponse {
    npe0: f64,
    npe1: f64,
    npe0_dual: f64,
    dist: f64,
    dist_dual: f64,
}

pub struct CrtDetSim<'a> {
    config: &'a DetSimConfig,
    geometry: &'a dyn AuxDetGeometry,
    clock: ElecClock,
    rng: StdRng,
}

impl<'a> CrtDetSim<'a> {
    pub fn new(config: &'a DetSimConfig, geometry: &'a dyn AuxDetGeometry) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            geometry,
            clock: ElecClock::new(config.trigger_clock_frequency),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn gauss(&mut self, mean: f64, sigma: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + sigma * z
    }

    fn poisson(&mut self, mean: f64) -> f64 {
        if !(mean > 0.0) {
            return 0.0;
        }
        match Poisson::new(mean) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean.round(),
        }
    }

    /// Trigger clock ticks at which a channel with `npe` photoelectrons fires
    /// for a deposit at `t_true` (ns) and `distance` (m) from its readout.
    fn channel_trigger_ticks(&mut self, t_true: f64, npe: f64, distance: f64) -> u32 {
        let cfg = self.config;
        let t_delay_mean = cfg.t_delay_norm
            * (-0.5 * ((npe - cfg.t_delay_shift) / cfg.t_delay_sigma).powi(2)).exp()
            + cfg.t_delay_offset;
        let t_delay_rms = cfg.t_delay_rms_gaus_norm
            * (-(npe - cfg.t_delay_rms_gaus_shift).powi(2) / cfg.t_delay_rms_gaus_sigma).exp()
            + cfg.t_delay_rms_exp_norm
                * (-(npe - cfg.t_delay_rms_exp_shift) / cfg.t_delay_rms_exp_scale).exp();

        let mut t_delay = self.gauss(t_delay_mean, t_delay_rms);
        t_delay += self.gauss(0.0, cfg.t_res_interpolator);
        let t_prop = self.gauss(cfg.prop_delay, cfg.prop_delay_error) * distance;

        let t = t_true + t_prop + t_delay;
        self.clock.ticks(t / 1e3)
    }

    fn adc(&mut self, npe: f64) -> i16 {
        let cfg = self.config;
        self.gauss(cfg.q_ped + cfg.q_slope * npe, cfg.q_rms * npe.sqrt()) as i16
    }

    fn pe_response(&mut self, strip: &StripGeo, local: &Vector3, energy: f64) -> PeResponse {
        let mut qr = if self.config.use_edep {
            energy / self.config.q0
        } else {
            1.0
        };
        if strip.det_type == AuxDetType::Cern {
            qr *= CERN_THICKNESS_SCALE;
        }

        let (dist, dist_dual) = strip.distances_to_ends(local);
        let npe_expected = expected_pe(dist, qr);
        let npe_expected_dual = expected_pe(dist_dual, qr);

        let (abs0, abs1) = transverse_weights(strip.det_type, local.x);
        let npe_exp0 = npe_expected * abs0;
        let npe_exp1 = npe_expected * abs1;
        let npe_exp0_dual = npe_expected_dual * abs0;
        if npe_exp0 < 0.0 || npe_exp1 < 0.0 || npe_exp0_dual < 0.0 {
            log::warn!(
                "Negative expected PE in module {} strip {}: {npe_exp0}, {npe_exp1}, {npe_exp0_dual}",
                strip.adid,
                strip.adsid
            );
        }

        PeResponse {
            npe0: self.poisson(npe_exp0),
            npe1: self.poisson(npe_exp1),
            npe0_dual: self.poisson(npe_exp0_dual),
            dist,
            dist_dual,
        }
    }

    /// Simulate the response of one strip to one deposit and record whatever
    /// passes threshold on the board reading it out
    fn simulate_deposit(
        &mut self,
        strip: &StripGeo,
        ide: &AuxDetIde,
        taggers: &mut TaggerMap,
        stats: &mut DetSimStats,
    ) {
        let det_type = strip.det_type;
        stats.sim_hits.increment(det_type);

        let local = strip.world_to_local(&ide.midpoint());
        if !strip.contains_local(&local) {
            log::debug!(
                "Deposit outside of module {} strip {}: local position {:?}",
                strip.adid,
                strip.adsid,
                local
            );
        }

        let pe = self.pe_response(strip, &local, ide.energy_deposited);

        let t_true = (ide.entry_t + ide.exit_t) / 2.0 + self.config.global_t0_offset;
        let t0 = self.channel_trigger_ticks(t_true, pe.npe0, pe.dist);
        let t1 = self.channel_trigger_ticks(t_true, pe.npe1, pe.dist);
        let t0_dual = self.channel_trigger_ticks(t_true, pe.npe0_dual, pe.dist_dual);

        // Time since PPS is not simulated
        let pps_ticks = self.rng.random_range(0..self.clock.ticks_per_second().max(1));

        let q0 = self.adc(pe.npe0);
        let q1 = self.adc(pe.npe1);
        let q0_dual = self.adc(pe.npe0_dual);

        let address = feb_address(det_type, strip.adid, strip.adsid);
        let threshold = self.config.q_threshold(det_type);
        let q_pass = |q: i16| q as f64 > threshold;
        let q_miss = |q: i16| (q as f64) < threshold;

        match det_type {
            AuxDetType::Cern => {
                let channel1 = address.channel1.unwrap_or(address.channel0 + 1);
                let in_time = (t0.abs_diff(t1) as f64) < self.config.strip_coincidence_window;
                if q_pass(q0) && q_pass(q1) && in_time {
                    record_hit(taggers, address.mac5, strip, CrtChannelData::new(address.channel0, t0, pps_ticks, q0));
                    record_hit(taggers, address.mac5, strip, CrtChannelData::new(channel1, t1, pps_ticks, q1));
                    stats.above_threshold.increment(det_type);
                }
                if q_miss(q0) || q_miss(q1) {
                    stats.threshold_misses.increment(det_type);
                }
                if !in_time {
                    stats.strip_coincidence_misses += 1;
                }
            }
            AuxDetType::Dc => {
                if q_pass(q0) {
                    record_hit(taggers, address.mac5, strip, CrtChannelData::new(address.channel0, t0, pps_ticks, q0));
                    stats.above_threshold.increment(det_type);
                }
                if q_miss(q0) {
                    stats.threshold_misses.increment(det_type);
                }
            }
            AuxDetType::Minos => {
                if q_pass(q0) {
                    record_hit(taggers, address.mac5, strip, CrtChannelData::new(address.channel0, t0, pps_ticks, q0));
                    stats.above_threshold.increment(det_type);
                }
                if q_pass(q0_dual) {
                    record_hit(
                        taggers,
                        address.dual_mac5(),
                        strip,
                        CrtChannelData::new(address.channel0, t0_dual, pps_ticks, q0_dual),
                    );
                    stats.above_threshold.increment(det_type);
                }
                if q_miss(q0) || q_miss(q0_dual) {
                    stats.threshold_misses.increment(det_type);
                }
            }
        }

        let logged = if self.config.verbose {
            log::Level::Info
        } else {
            log::Level::Trace
        };
        log::log!(
            logged,
            "CRT hit in module {} ({det_type}, {}) strip {} | mac5 {} channel {} | layer {} | local {:?} | dist {:.3} / {:.3} m | npe {} {} {} | q {} {} {} | t {} {} {}",
            strip.adid,
            strip.region,
            strip.adsid,
            address.mac5,
            address.channel0,
            strip.layer,
            local,
            pe.dist,
            pe.dist_dual,
            pe.npe0,
            pe.npe1,
            pe.npe0_dual,
            q0,
            q1,
            q0_dual,
            t0,
            t1,
            t0_dual
        );
    }

    /// Simulate the readouts of one event
    pub fn simulate(&mut self, channels: &[AuxDetSimChannel]) -> DetSimOutput {
        let mut taggers = TaggerMap::new();
        let mut stats = DetSimStats::default();
        let geometry = self.geometry;

        for channel in channels {
            if channel.adsid == 0 {
                continue;
            }
            let Some(strip) = geometry.strip(channel.adid, channel.adsid) else {
                log::warn!(
                    "Strip {} of module {} is not in the strip table, skipping",
                    channel.adsid,
                    channel.adid
                );
                continue;
            };
            for ide in channel.ides.iter() {
                self.simulate_deposit(strip, ide, &mut taggers, &mut stats);
            }
        }

        let (readouts, coincidence) = CoincidenceSim::new(self.config, self.clock).run(taggers);
        stats.coincidence = coincidence;
        if self.config.verbose {
            stats.log_summary(readouts.len());
        }
        DetSimOutput { readouts, stats }
    }
}
