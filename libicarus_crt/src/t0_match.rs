use serde::{Deserialize, Serialize};

use super::config::{CandidateRanking, DcaMode, DirectionMethod, MatchConfig};
use super::constants::{NO_MATCH_DCA, NO_MATCH_TIME};
use super::crt_hit::CrtHit;
use super::dca::{dist_to_crt_hit, simple_dca};
use super::error::ConfigError;
use super::geometry::{drift_direction_from_tpcs, x_limits_from_tpcs, SpaceCharge, TpcGeometry};
use super::track::Track;
use super::vector::{shifted_x, unit, Vector3};

/// Range of trigger-relative times (us) compatible with a track's position in the drift volume
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriftWindow {
    pub t_min: f64,
    pub t_max: f64,
}

impl DriftWindow {
    /// The (0, 0) window of a stitched track: every hit time is allowed
    pub fn is_degenerate(&self) -> bool {
        self.t_min == self.t_max
    }

    pub fn accepts(&self, time: f64, margin: f64) -> bool {
        self.is_degenerate() || (time >= self.t_min - margin && time <= self.t_max + margin)
    }
}

/// A CRT hit retained for a track along with its figures of merit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub hit: CrtHit,
    /// Hit time relative to the trigger (us)
    pub t0: f64,
    pub dca: f64,
    /// Distance from the shifted track endpoint to the hit
    pub extrapolation_length: f64,
}

impl MatchCandidate {
    /// DCA over extrapolation length. A hit sitting on the shifted endpoint
    /// scores 0; any other zero-length candidate scores infinity.
    fn d_over_l(&self) -> f64 {
        if self.extrapolation_length > 0.0 {
            self.dca / self.extrapolation_length
        } else if self.dca == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    }
}

/// Outcome of matching one track. When nothing matched, `hit` is None and
/// `dca` is [`NO_MATCH_DCA`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub track_id: u32,
    pub hit: Option<CrtHit>,
    pub t0: f64,
    pub dca: f64,
    pub extrapolation_length: f64,
}

impl MatchResult {
    pub fn no_match(track_id: u32) -> Self {
        Self {
            track_id,
            hit: None,
            t0: NO_MATCH_TIME,
            dca: NO_MATCH_DCA,
            extrapolation_length: NO_MATCH_DCA,
        }
    }

    pub fn is_match(&self) -> bool {
        self.hit.is_some()
    }
}

/// DCA and extrapolation length of one endpoint against one hit
#[derive(Debug, Clone, Copy)]
struct EndpointScore {
    dca: f64,
    extrapolation_length: f64,
}

/// CrtT0MatchAlg finds the CRT hit that best explains a TPC track.
///
/// For each hit consistent with the track's drift window the track is moved
/// back to where it would sit had it been produced at the hit time, extrapolated
/// from both ends, and scored by the distance of closest approach. The
/// geometry and space charge services are borrowed read-only for the life of
/// the algorithm.
pub struct CrtT0MatchAlg<'a> {
    config: MatchConfig,
    geometry: &'a dyn TpcGeometry,
    sce: &'a dyn SpaceCharge,
}

impl<'a> CrtT0MatchAlg<'a> {
    pub fn new(
        config: MatchConfig,
        geometry: &'a dyn TpcGeometry,
        sce: &'a dyn SpaceCharge,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let drift_velocity = geometry.drift_velocity();
        if !(drift_velocity > 0.0) || !drift_velocity.is_finite() {
            return Err(ConfigError::InvalidValue(
                "drift_velocity",
                drift_velocity.to_string(),
            ));
        }
        Ok(Self {
            config,
            geometry,
            sce,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Times at which the track could have been produced given where it sits in x.
    ///
    /// Each extreme of the track is moved to the matching drift volume limit
    /// and the shift converted to a time.
    pub fn track_t0_range(
        &self,
        start_x: f64,
        end_x: f64,
        drift_direction: i32,
        x_limits: (f64, f64),
    ) -> DriftWindow {
        if drift_direction == 0 {
            return DriftWindow::default();
        }
        let vd = drift_direction as f64 * self.geometry.drift_velocity();

        let max_shift = x_limits.0.max(x_limits.1) - start_x.max(end_x);
        let min_shift = x_limits.0.min(x_limits.1) - start_x.min(end_x);
        let t0_max = max_shift / vd;
        let t0_min = min_shift / vd;

        DriftWindow {
            t_min: t0_min.min(t0_max),
            t_max: t0_min.max(t0_max),
        }
    }

    /// Hit time relative to the trigger (us) in the configured clock domain
    pub fn hit_time(&self, hit: &CrtHit, trigger_timestamp: u64) -> f64 {
        hit.time(trigger_timestamp, self.config.timestamp_mode)
    }

    fn drift_shift(&self, t0: f64, drift_direction: i32) -> f64 {
        drift_direction as f64 * t0 * self.geometry.drift_velocity()
    }

    /// Apply the space charge offset of the TPC containing `point`, if enabled
    fn sce_corrected(&self, point: Vector3) -> Vector3 {
        if self.sce.is_enabled() && self.config.sce_pos_corr {
            let tpc = self.geometry.tpc_at(&point);
            point + self.sce.position_offsets(&point, tpc)
        } else {
            point
        }
    }

    /// Track position as it would be had the track been produced at `t0`
    fn shifted_position(&self, position: &Vector3, drift_direction: i32, t0: f64) -> Vector3 {
        self.sce_corrected(shifted_x(position, self.drift_shift(t0, drift_direction)))
    }

    /// DCA between a hit and the line through the shifted track position along `track_dir`
    pub fn dist_of_closest_approach(
        &self,
        track_pos: &Vector3,
        track_dir: &Vector3,
        hit: &CrtHit,
        drift_direction: i32,
        t0: f64,
    ) -> f64 {
        let position = self.shifted_position(track_pos, drift_direction, t0);
        match self.config.dca_mode {
            DcaMode::Box => dist_to_crt_hit(hit, &position, &(position + *track_dir)),
            DcaMode::Point => simple_dca(hit, &position, track_dir),
        }
    }

    /// Start and end directions as the average of the trajectory directions
    /// over the first / last `frac` of the valid points. The start direction
    /// points out of the track.
    pub fn track_direction_average(&self, track: &Track, frac: f64) -> (Vector3, Vector3) {
        let valid: Vec<Vector3> = track.valid_points().map(|p| p.direction).collect();
        let n_valid = valid.len();
        let n_avg = (n_valid as f64 * frac).floor() as usize;
        if n_avg == 0 {
            return (Vector3::zeros(), Vector3::zeros());
        }

        let mut total_start = Vector3::zeros();
        let mut total_end = Vector3::zeros();
        for i in 0..n_avg {
            total_start += valid[i];
            total_end += valid[n_valid - (i + 1)];
        }
        let scale = 1.0 / n_avg as f64;
        (-(total_start * scale), total_end * scale)
    }

    /// Start and end directions as unit vectors from each endpoint toward the
    /// point at `frac` of the trajectory, after the drift shift for `crt_time`
    /// and space charge corrections.
    pub fn track_direction(
        &self,
        track: &Track,
        frac: f64,
        crt_time: f64,
        drift_direction: i32,
    ) -> (Vector3, Vector3) {
        let mid_index = (track.n_points() as f64 * frac).floor() as usize;
        let start = self.shifted_position(&track.start(), drift_direction, crt_time);
        let end = self.shifted_position(&track.end(), drift_direction, crt_time);
        let mid = self.shifted_position(&track.location_at_point(mid_index), drift_direction, crt_time);

        (unit(&(mid - start)), unit(&(mid - end)))
    }

    fn endpoint_directions(
        &self,
        track: &Track,
        crt_time: f64,
        drift_direction: i32,
    ) -> (Vector3, Vector3) {
        match self.config.direction_method {
            DirectionMethod::Average => {
                self.track_direction_average(track, self.config.track_direction_frac)
            }
            DirectionMethod::Endpoint => self.track_direction(
                track,
                self.config.track_direction_frac,
                crt_time,
                drift_direction,
            ),
        }
    }

    fn score_endpoint(
        &self,
        position: &Vector3,
        direction: &Vector3,
        hit: &CrtHit,
        drift_direction: i32,
        crt_time: f64,
    ) -> EndpointScore {
        let dca = self.dist_of_closest_approach(position, direction, hit, drift_direction, crt_time);
        let shifted = self.shifted_position(position, drift_direction, crt_time);
        EndpointScore {
            dca,
            extrapolation_length: (hit.position - shifted).norm(),
        }
    }

    fn passes_quality_cuts(&self, hit: &CrtHit) -> bool {
        let err = &hit.position_err;
        hit.pe >= self.config.pe_cut
            && err.x <= self.config.max_uncert
            && err.y <= self.config.max_uncert
            && err.z <= self.config.max_uncert
    }

    /// Score every hit against the track and return the best candidate, if any.
    ///
    /// No acceptance threshold is applied beyond the per-hit distance limit;
    /// see [`CrtT0MatchAlg::match_track`] for the full decision.
    pub fn closest_crt_hit(
        &self,
        track: &Track,
        window: DriftWindow,
        hits: &[CrtHit],
        drift_direction: i32,
        trigger_timestamp: u64,
    ) -> Option<MatchCandidate> {
        let start = track.start();
        let end = track.end();

        let mut candidates: Vec<MatchCandidate> = Vec::new();
        for hit in hits {
            let crt_time = self.hit_time(hit, trigger_timestamp);
            if !window.accepts(crt_time, self.config.time_margin) {
                continue;
            }
            if !self.passes_quality_cuts(hit) {
                continue;
            }

            let (start_dir, end_dir) = self.endpoint_directions(track, crt_time, drift_direction);
            let start_score = self.score_endpoint(&start, &start_dir, hit, drift_direction, crt_time);
            let end_score = self.score_endpoint(&end, &end_dir, hit, drift_direction, crt_time);

            if !(start_score.dca < self.config.distance_limit
                || end_score.dca < self.config.distance_limit)
            {
                continue;
            }

            // Only the endpoint nearer to the hit is ever considered
            let chosen = if start_score.extrapolation_length < end_score.extrapolation_length {
                start_score
            } else {
                end_score
            };
            candidates.push(MatchCandidate {
                hit: hit.clone(),
                t0: crt_time,
                dca: chosen.dca,
                extrapolation_length: chosen.extrapolation_length,
            });
        }

        log::trace!(
            "Track {} has {} CRT candidates out of {} hits",
            track.id,
            candidates.len(),
            hits.len()
        );
        select_best(candidates, self.config.ranking)
    }

    /// Closest hit with the drift direction and window taken from the TPCs of the track's hits
    pub fn closest_crt_hit_for_track(
        &self,
        track: &Track,
        hits: &[CrtHit],
        trigger_timestamp: u64,
    ) -> Option<MatchCandidate> {
        let drift_direction = drift_direction_from_tpcs(self.geometry, &track.tpcs);
        let x_limits = x_limits_from_tpcs(self.geometry, &track.tpcs);
        let window = self.track_t0_range(track.start().x, track.end().x, drift_direction, x_limits);
        self.closest_crt_hit(track, window, hits, drift_direction, trigger_timestamp)
    }

    /// Best candidate over several hit collections (e.g. one per CRT region)
    pub fn closest_crt_hit_in_collections(
        &self,
        track: &Track,
        collections: &[&[CrtHit]],
        trigger_timestamp: u64,
    ) -> Option<MatchCandidate> {
        let candidates = collections
            .iter()
            .filter_map(|hits| self.closest_crt_hit_for_track(track, hits, trigger_timestamp))
            .collect();
        select_best(candidates, self.config.ranking)
    }

    /// Keep a candidate only if it passes the final DCA and D/L cuts
    fn accept(&self, best: Option<MatchCandidate>) -> Option<MatchCandidate> {
        best.filter(|best| {
            best.dca >= 0.0
                && best.dca < self.config.distance_limit
                && best.d_over_l() < self.config.d_over_l_limit
        })
    }

    /// Best candidate that survives the minimum length and final acceptance cuts
    fn accepted_candidate(
        &self,
        track: &Track,
        hits: &[CrtHit],
        trigger_timestamp: u64,
    ) -> Option<MatchCandidate> {
        if track.length() < self.config.min_track_length {
            return None;
        }
        self.accept(self.closest_crt_hit_for_track(track, hits, trigger_timestamp))
    }

    fn to_result(track: &Track, best: Option<MatchCandidate>) -> MatchResult {
        match best {
            Some(best) => MatchResult {
                track_id: track.id,
                hit: Some(best.hit),
                t0: best.t0,
                dca: best.dca,
                extrapolation_length: best.extrapolation_length,
            },
            None => MatchResult::no_match(track.id),
        }
    }

    /// Match one track against one CRT hit collection
    pub fn match_track(&self, track: &Track, hits: &[CrtHit], trigger_timestamp: u64) -> MatchResult {
        Self::to_result(track, self.accepted_candidate(track, hits, trigger_timestamp))
    }

    /// Match one track against several hit collections at once
    pub fn match_track_in_collections(
        &self,
        track: &Track,
        collections: &[&[CrtHit]],
        trigger_timestamp: u64,
    ) -> MatchResult {
        if track.length() < self.config.min_track_length {
            return MatchResult::no_match(track.id);
        }
        let best = self.closest_crt_hit_in_collections(track, collections, trigger_timestamp);
        Self::to_result(track, self.accept(best))
    }

    /// Match every track of an event against the same hit collection
    pub fn match_tracks(
        &self,
        tracks: &[Track],
        hits: &[CrtHit],
        trigger_timestamp: u64,
    ) -> Vec<MatchResult> {
        tracks
            .iter()
            .map(|track| self.match_track(track, hits, trigger_timestamp))
            .collect()
    }

    /// Absolute time (us) of the matched hit in its own clock domain, with the
    /// configured time correction applied to ts0
    pub fn t0_from_crt_hits(&self, track: &Track, hits: &[CrtHit], trigger_timestamp: u64) -> Option<f64> {
        self.accepted_candidate(track, hits, trigger_timestamp)
            .map(|best| {
                best.hit
                    .absolute_time(self.config.timestamp_mode, self.config.time_correction)
            })
    }

    /// Trigger-relative time and DCA of the matched hit
    pub fn t0_and_dca_from_crt_hits(
        &self,
        track: &Track,
        hits: &[CrtHit],
        trigger_timestamp: u64,
    ) -> Option<(f64, f64)> {
        self.accepted_candidate(track, hits, trigger_timestamp)
            .map(|best| (best.t0, best.dca))
    }
}

/// Pick the best candidate. Candidates with a negative DCA never win against a
/// valid one; on equal figures of merit the earlier candidate is kept.
pub fn select_best(
    candidates: Vec<MatchCandidate>,
    ranking: CandidateRanking,
) -> Option<MatchCandidate> {
    let merit = |cand: &MatchCandidate| match ranking {
        CandidateRanking::Dca => cand.dca,
        CandidateRanking::DcaOverLength => cand.d_over_l(),
    };

    let mut best: Option<MatchCandidate> = None;
    for cand in candidates {
        best = match best {
            None => Some(cand),
            Some(current) if current.dca < 0.0 => Some(cand),
            Some(current) => {
                if cand.dca >= 0.0 && merit(&cand) < merit(&current) {
                    Some(cand)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::two_tpc_geometry;
    use crate::geometry::{NoSpaceCharge, TpcId, TpcOffsetSpaceCharge};
    use crate::track::tests::straight_track;
    use proptest::prelude::*;

    const VD: f64 = 0.157;
    const TRIGGER: u64 = 1_600_000_000_000_000_000;

    /// A top CRT hit at `position`, `time_us` after the trigger
    fn crt_hit(position: Vector3, time_us: f64) -> CrtHit {
        CrtHit {
            position,
            position_err: Vector3::new(5.0, 1.0, 5.0),
            pe: 80.0,
            ts0_ns: (TRIGGER % 1_000_000_000) + (time_us * 1e3) as u64,
            ts1_ns: (time_us * 1e3) as i64,
            tagger: String::from("top"),
        }
    }

    /// A vertical track in TPC 1 (drifting to +x), reconstructed as if t0 = 0,
    /// produced by a muon crossing at x_true at time t_true
    fn vertical_track(x_true: f64, t_true: f64, tpcs: Vec<TpcId>) -> Track {
        let x_reco = x_true - VD * t_true;
        straight_track(
            Vector3::new(x_reco, 120.0, 10.0),
            Vector3::new(x_reco, -150.0, 10.0),
            28,
            tpcs,
        )
    }

    #[test]
    fn test_drift_window_basic() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let window = alg.track_t0_range(40.0, 60.0, 1, (0.0, 150.0));
        assert!((window.t_min - (-40.0 / VD)).abs() < 1e-9);
        assert!((window.t_max - (90.0 / VD)).abs() < 1e-9);

        let window = alg.track_t0_range(40.0, 60.0, -1, (0.0, 150.0));
        assert!(window.t_min <= window.t_max);
        assert!((window.t_min - (-90.0 / VD)).abs() < 1e-9);
    }

    #[test]
    fn test_stitched_track_accepts_any_time() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let window = alg.track_t0_range(-40.0, 60.0, 0, (-150.0, 150.0));
        assert_eq!(window, DriftWindow::default());
        assert!(window.accepts(-1e5, 10.0));
        assert!(window.accepts(4.2e5, 10.0));
    }

    proptest! {
        #[test]
        fn prop_drift_window_is_ordered(
            x1 in -400.0f64..400.0,
            x2 in -400.0f64..400.0,
            lim1 in -400.0f64..400.0,
            lim2 in -400.0f64..400.0,
            dir in prop_oneof![Just(1i32), Just(-1i32)],
        ) {
            let geo = two_tpc_geometry();
            let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
            let window = alg.track_t0_range(x1, x2, dir, (lim1, lim2));
            prop_assert!(window.t_min <= window.t_max);
        }
    }

    #[test]
    fn test_empty_hit_list_gives_sentinel() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        let result = alg.match_track(&track, &[], TRIGGER);
        assert!(!result.is_match());
        assert_eq!(result.dca, -1.0);
        assert!(alg.t0_from_crt_hits(&track, &[], TRIGGER).is_none());
        assert!(alg.t0_and_dca_from_crt_hits(&track, &[], TRIGGER).is_none());
    }

    #[test]
    fn test_zero_point_track_gives_sentinel() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let hits = vec![crt_hit(Vector3::new(75.0, 300.0, 10.0), 0.0)];
        let result = alg.match_track(&Track::default(), &hits, TRIGGER);
        assert_eq!(result.dca, NO_MATCH_DCA);
    }

    #[test]
    fn test_short_track_is_not_matched() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let track = straight_track(
            Vector3::new(75.0, 120.0, 10.0),
            Vector3::new(75.0, 110.0, 10.0),
            5,
            vec![1],
        );
        let hits = vec![crt_hit(Vector3::new(75.0, 300.0, 10.0), 0.0)];
        assert!(!alg.match_track(&track, &hits, TRIGGER).is_match());
    }

    #[test]
    fn test_matches_hit_at_true_time() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let t_true = 120.0;
        let track = vertical_track(75.0, t_true, vec![1]);
        let good = crt_hit(Vector3::new(75.0, 300.0, 10.0), t_true);
        // Same place, but too late for the drift window
        let late = crt_hit(Vector3::new(75.0, 300.0, 10.0), 5000.0);
        // In time, but far away in z
        let far = crt_hit(Vector3::new(75.0, 300.0, 600.0), 100.0);

        let hits = vec![late, far, good.clone()];
        let result = alg.match_track(&track, &hits, TRIGGER);
        assert!(result.is_match());
        assert_eq!(result.hit, Some(good));
        assert!((result.t0 - t_true).abs() < 1e-6);
        assert!(result.dca < 1e-6, "dca {}", result.dca);
        // Extrapolated from the top end at y = 120
        assert!((result.extrapolation_length - 180.0).abs() < 1e-6);

        let (t0, dca) = alg.t0_and_dca_from_crt_hits(&track, &hits, TRIGGER).unwrap();
        assert!((t0 - t_true).abs() < 1e-6);
        assert!(dca < 1e-6);
    }

    #[test]
    fn test_t0_from_crt_hits_reports_absolute_time() {
        let geo = two_tpc_geometry();
        let config = MatchConfig {
            time_correction: 3.0,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(config, &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 50.0, vec![1]);
        let hit = crt_hit(Vector3::new(75.0, 300.0, 10.0), 50.0);
        let t0 = alg.t0_from_crt_hits(&track, &[hit.clone()], TRIGGER).unwrap();
        assert!((t0 - (hit.ts0_ns as f64 * 1e-3 + 3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_quality_cuts() {
        let geo = two_tpc_geometry();
        let config = MatchConfig {
            pe_cut: 50.0,
            max_uncert: 4.0,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(config, &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        // Default hits have a 5 cm uncertainty
        let wide = crt_hit(Vector3::new(75.0, 300.0, 10.0), 0.0);
        let mut dim = wide.clone();
        dim.position_err = Vector3::new(3.0, 1.0, 3.0);
        dim.pe = 20.0;
        assert!(alg.closest_crt_hit_for_track(&track, &[wide.clone(), dim], TRIGGER).is_none());

        let mut good = wide;
        good.position_err = Vector3::new(3.0, 1.0, 3.0);
        assert!(alg.closest_crt_hit_for_track(&track, &[good], TRIGGER).is_some());
    }

    #[test]
    fn test_box_mode_containment() {
        let geo = two_tpc_geometry();
        let config = MatchConfig {
            dca_mode: DcaMode::Box,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(config, &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        // Centre 4 cm off the track, but the box is 5 cm wide
        let hit = crt_hit(Vector3::new(79.0, 300.0, 10.0), 0.0);
        let best = alg.closest_crt_hit_for_track(&track, &[hit.clone()], TRIGGER).unwrap();
        assert_eq!(best.dca, 0.0);

        let point_alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let best = point_alg.closest_crt_hit_for_track(&track, &[hit], TRIGGER).unwrap();
        assert!((best.dca - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_uncertainty_box_equals_point() {
        let geo = two_tpc_geometry();
        let track = vertical_track(75.0, 0.0, vec![1]);
        let mut hit = crt_hit(Vector3::new(81.0, 300.0, 13.0), 0.0);
        hit.position_err = Vector3::zeros();

        let point = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let boxed = CrtT0MatchAlg::new(
            MatchConfig {
                dca_mode: DcaMode::Box,
                ..Default::default()
            },
            &geo,
            &NoSpaceCharge,
        )
        .unwrap();
        let p = point.closest_crt_hit_for_track(&track, &[hit.clone()], TRIGGER).unwrap();
        let b = boxed.closest_crt_hit_for_track(&track, &[hit], TRIGGER).unwrap();
        assert!((p.dca - b.dca).abs() < 1e-6);
        assert!((p.dca - 45.0f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_average_direction_method() {
        let geo = two_tpc_geometry();
        let config = MatchConfig {
            direction_method: DirectionMethod::Average,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(config, &geo, &NoSpaceCharge).unwrap();
        let mut track = vertical_track(75.0, 0.0, vec![1]);
        let (start_dir, end_dir) = alg.track_direction_average(&track, 0.5);
        assert!((start_dir - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
        assert!((end_dir - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-9);

        // Invalid points do not take part in the average
        track.points[0].direction = Vector3::new(1.0, 0.0, 0.0);
        track.points[0].valid = false;
        let (start_dir, _) = alg.track_direction_average(&track, 0.5);
        assert!((start_dir - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-9);

        let hit = crt_hit(Vector3::new(75.0, 300.0, 10.0), 0.0);
        assert!(alg.match_track(&track, &[hit], TRIGGER).is_match());
    }

    #[test]
    fn test_space_charge_offsets_move_the_track() {
        let geo = two_tpc_geometry();
        let sce = TpcOffsetSpaceCharge::new(&[(1, Vector3::new(0.0, 0.0, 2.0))]);
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &sce).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        let hit = crt_hit(Vector3::new(75.0, 300.0, 12.0), 0.0);
        let best = alg.closest_crt_hit_for_track(&track, &[hit.clone()], TRIGGER).unwrap();
        assert!(best.dca < 1e-6);

        let no_sce = MatchConfig {
            sce_pos_corr: false,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(no_sce, &geo, &sce).unwrap();
        let best = alg.closest_crt_hit_for_track(&track, &[hit], TRIGGER).unwrap();
        assert!((best.dca - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearer_endpoint_is_reported() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        // Bottom CRT below the track end at y = -150
        let hit = crt_hit(Vector3::new(75.0, -400.0, 10.0), 0.0);
        let best = alg.closest_crt_hit_for_track(&track, &[hit], TRIGGER).unwrap();
        assert!((best.extrapolation_length - 250.0).abs() < 1e-6);
    }

    fn candidate(dca: f64, extrapolation_length: f64) -> MatchCandidate {
        MatchCandidate {
            hit: CrtHit {
                pe: dca,
                ..Default::default()
            },
            t0: 0.0,
            dca,
            extrapolation_length,
        }
    }

    #[test]
    fn test_tie_break_by_dca() {
        let best = select_best(
            vec![candidate(5.0, 100.0), candidate(3.0, 10.0)],
            CandidateRanking::Dca,
        )
        .unwrap();
        assert_eq!(best.dca, 3.0);
    }

    #[test]
    fn test_tie_break_by_dca_over_length() {
        // 5/100 beats 3/10 even though its DCA is larger
        let best = select_best(
            vec![candidate(3.0, 10.0), candidate(5.0, 100.0)],
            CandidateRanking::DcaOverLength,
        )
        .unwrap();
        assert_eq!(best.dca, 5.0);

        // The running best is updated: 2/10 < 3/10 but 1/100 is better still
        let best = select_best(
            vec![candidate(3.0, 10.0), candidate(1.0, 100.0), candidate(2.0, 10.0)],
            CandidateRanking::DcaOverLength,
        )
        .unwrap();
        assert_eq!(best.dca, 1.0);
    }

    #[test]
    fn test_zero_extrapolation_length_ranking() {
        // A hit on the endpoint is a perfect match, not NaN
        let best = select_best(
            vec![candidate(0.0, 0.0), candidate(1.0, 100.0)],
            CandidateRanking::DcaOverLength,
        )
        .unwrap();
        assert_eq!(best.d_over_l(), 0.0);
        assert_eq!(best.extrapolation_length, 0.0);

        // A zero-length candidate off the hit never hides a later valid one
        let best = select_best(
            vec![candidate(2.0, 0.0), candidate(1.0, 100.0)],
            CandidateRanking::DcaOverLength,
        )
        .unwrap();
        assert_eq!(best.dca, 1.0);

        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        assert!(alg.accept(Some(candidate(0.0, 0.0))).is_some());
        assert!(alg.accept(Some(candidate(2.0, 0.0))).is_none());
    }

    #[test]
    fn test_negative_dca_always_loses() {
        let best = select_best(
            vec![candidate(-1.0, 10.0), candidate(50.0, 60.0)],
            CandidateRanking::Dca,
        )
        .unwrap();
        assert_eq!(best.dca, 50.0);
        assert!(select_best(vec![], CandidateRanking::Dca).is_none());
    }

    #[test]
    fn test_final_acceptance_threshold() {
        let geo = two_tpc_geometry();
        let config = MatchConfig {
            d_over_l_limit: 0.01,
            ..Default::default()
        };
        let alg = CrtT0MatchAlg::new(config, &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        // 10 cm off over 180 cm of extrapolation fails D/L < 0.01
        let hit = crt_hit(Vector3::new(85.0, 300.0, 10.0), 0.0);
        assert!(alg.closest_crt_hit_for_track(&track, &[hit.clone()], TRIGGER).is_some());
        let result = alg.match_track(&track, &[hit], TRIGGER);
        assert!(!result.is_match());
        assert_eq!(result.dca, NO_MATCH_DCA);
    }

    #[test]
    fn test_best_hit_across_collections() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let track = vertical_track(75.0, 0.0, vec![1]);
        let top = vec![crt_hit(Vector3::new(80.0, 300.0, 10.0), 0.0)];
        let bottom = vec![crt_hit(Vector3::new(75.0, -400.0, 12.0), 0.0)];
        let result = alg.match_track_in_collections(&track, &[top.as_slice(), bottom.as_slice()], TRIGGER);
        assert!(result.is_match());
        assert!((result.dca - 2.0).abs() < 1e-6);
        assert_eq!(result.hit.as_ref(), bottom.first());

        let empty: Vec<CrtHit> = vec![];
        let result = alg.match_track_in_collections(&track, &[empty.as_slice()], TRIGGER);
        assert_eq!(result.dca, NO_MATCH_DCA);
    }

    #[test]
    fn test_match_tracks_batch() {
        let geo = two_tpc_geometry();
        let alg = CrtT0MatchAlg::new(MatchConfig::default(), &geo, &NoSpaceCharge).unwrap();
        let mut second = vertical_track(30.0, 0.0, vec![1]);
        second.id = 7;
        let tracks = vec![vertical_track(75.0, 0.0, vec![1]), second];
        let hits = vec![crt_hit(Vector3::new(75.0, 300.0, 10.0), 0.0)];
        let results = alg.match_tracks(&tracks, &hits, TRIGGER);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_match());
        assert_eq!(results[1].track_id, 7);
        // 45 cm away is still within the distance limit
        assert!(results[1].is_match());
        assert!((results[1].dca - 45.0).abs() < 1e-6);
    }
}
