use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::aux_det::{AuxDetType, CrtRegion, StripGeo};
use super::config::DetSimConfig;
use super::crt_data::{CrtChannelData, CrtData};
use super::elec_clock::ElecClock;

/// Everything one front-end board saw above threshold during an event
#[derive(Debug, Clone)]
pub struct Tagger {
    pub det_type: AuxDetType,
    pub region: CrtRegion,
    pub stack: u32,
    /// Layers hit across the whole event
    pub layers: BTreeSet<u32>,
    channel_layers: FxHashMap<u32, u32>,
    pub data: Vec<CrtChannelData>,
}

impl Tagger {
    pub fn new(det_type: AuxDetType, region: CrtRegion, stack: u32) -> Self {
        Self {
            det_type,
            region,
            stack,
            layers: BTreeSet::new(),
            channel_layers: FxHashMap::default(),
            data: vec![],
        }
    }

    /// Record a channel response from a strip read out by this board
    pub fn record(&mut self, strip: &StripGeo, data: CrtChannelData) {
        self.det_type = strip.det_type;
        self.region = strip.region;
        self.stack = strip.stack;
        self.layers.insert(strip.layer);
        self.channel_layers.insert(data.channel, strip.layer);
        self.data.push(data);
    }

    /// Layer of a channel; channels never recorded belong to layer 0
    pub fn layer_of(&self, channel: u32) -> u32 {
        self.channel_layers.get(&channel).copied().unwrap_or(0)
    }

    fn has_opposite_layer(&self, other: &Tagger) -> bool {
        (other.layers.contains(&1) && self.layers.contains(&0))
            || (other.layers.contains(&0) && self.layers.contains(&1))
    }
}

/// Taggers keyed by board address, iterated in address order
pub type TaggerMap = BTreeMap<u32, Tagger>;

/// Record `data` on board `mac5`, creating the board on first use
pub fn record_hit(taggers: &mut TaggerMap, mac5: u32, strip: &StripGeo, data: CrtChannelData) {
    taggers
        .entry(mac5)
        .or_insert_with(|| Tagger::new(strip.det_type, strip.region, strip.stack))
        .record(strip, data);
}

/// A counter per module type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub cern: u32,
    pub dc: u32,
    pub minos: u32,
}

impl TypeCounts {
    pub fn add(&mut self, det_type: AuxDetType, n: u32) {
        match det_type {
            AuxDetType::Cern => self.cern += n,
            AuxDetType::Dc => self.dc += n,
            AuxDetType::Minos => self.minos += n,
        }
    }

    pub fn increment(&mut self, det_type: AuxDetType) {
        self.add(det_type, 1);
    }

    pub fn get(&self, det_type: AuxDetType) -> u32 {
        match det_type {
            AuxDetType::Cern => self.cern,
            AuxDetType::Dc => self.dc,
            AuxDetType::Minos => self.minos,
        }
    }

    pub fn total(&self) -> u32 {
        self.cern + self.dc + self.minos
    }
}

/// Bookkeeping of the hits lost at each stage of the trigger logic
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoincidenceStats {
    /// Boards skipped because they only saw one layer
    pub open_coincidence: TypeCounts,
    /// Trigger candidates abandoned for lack of a layer or board coincidence
    pub coincidence: TypeCounts,
    /// Repeated channels lost to track and hold
    pub lock: TypeCounts,
    pub dead_time: TypeCounts,
    pub readouts: TypeCounts,
    pub readout_hits: TypeCounts,
    /// Readouts per CRT region number
    pub region_readouts: BTreeMap<u32, u32>,
}

impl CoincidenceStats {
    fn count_readout(&mut self, tagger: &Tagger, n_hits: usize) {
        self.readouts.increment(tagger.det_type);
        self.readout_hits.add(tagger.det_type, n_hits as u32);
        *self
            .region_readouts
            .entry(tagger.region.number())
            .or_insert(0) += 1;
    }
}

/// The readout window currently held open on a board
#[derive(Debug)]
struct OpenReadout {
    trigger: CrtChannelData,
    /// Trigger time (us)
    ttrig: f64,
    channels: FxHashSet<u32>,
    layers: BTreeSet<u32>,
    passing: Vec<CrtChannelData>,
}

impl OpenReadout {
    fn start(trigger: CrtChannelData, ttrig: f64, layer: u32) -> Self {
        let mut channels = FxHashSet::default();
        channels.insert(trigger.channel);
        let mut layers = BTreeSet::new();
        layers.insert(layer);
        Self {
            trigger,
            ttrig,
            channels,
            layers,
            passing: vec![trigger],
        }
    }
}

/// The front-end trigger logic applied to every board of an event
pub struct CoincidenceSim<'a> {
    config: &'a DetSimConfig,
    clock: ElecClock,
}

impl<'a> CoincidenceSim<'a> {
    pub fn new(config: &'a DetSimConfig, clock: ElecClock) -> Self {
        Self { config, clock }
    }

    /// Apply the trigger logic to every board and return the readouts, board by
    /// board in address order and in time order within a board.
    ///
    /// Board data is stably sorted by t0 first; the cross-board MINOS
    /// coincidence then only reads the other boards.
    pub fn run(&self, mut taggers: TaggerMap) -> (Vec<CrtData>, CoincidenceStats) {
        for tagger in taggers.values_mut() {
            tagger.data.sort_by_key(|d| d.t0);
        }

        let mut stats = CoincidenceStats::default();
        let mut readouts = Vec::new();
        for (mac5, tagger) in taggers.iter() {
            self.fold_tagger(*mac5, tagger, &taggers, &mut stats, &mut readouts);
        }
        (readouts, stats)
    }

    fn needs_layer_pair(&self, det_type: AuxDetType) -> bool {
        det_type != AuxDetType::Minos && self.config.apply_coincidence(det_type)
    }

    /// Another MINOS board in the same stack and region, in the opposite layer,
    /// with a hit in time with `ttrig`
    fn find_minos_partner(
        &self,
        mac5: u32,
        tagger: &Tagger,
        snapshot: &TaggerMap,
        ttrig: f64,
    ) -> Option<u32> {
        let window = self.config.layer_coincidence_window_us(AuxDetType::Minos);
        snapshot
            .iter()
            .filter(|(other_mac, other)| {
                other.det_type == AuxDetType::Minos
                    && **other_mac != mac5
                    && other.stack == tagger.stack
                    && other.region == tagger.region
                    && tagger.has_opposite_layer(other)
            })
            .find(|(_, other)| {
                other
                    .data
                    .iter()
                    .any(|d| (self.clock.time(d.t0) - ttrig).abs() < window)
            })
            .map(|(other_mac, _)| *other_mac)
    }

    fn fold_tagger(
        &self,
        mac5: u32,
        tagger: &Tagger,
        snapshot: &TaggerMap,
        stats: &mut CoincidenceStats,
        readouts: &mut Vec<CrtData>,
    ) {
        let det_type = tagger.det_type;
        let is_minos = det_type == AuxDetType::Minos;
        let apply_minos_pair = is_minos && self.config.apply_coincidence(det_type);
        let needs_layer_pair = self.needs_layer_pair(det_type);

        if needs_layer_pair && tagger.layers.len() < 2 {
            stats.open_coincidence.increment(det_type);
            return;
        }
        let Some(first) = tagger.data.first() else {
            return;
        };

        let window = self.config.layer_coincidence_window_us(det_type);
        let dead_time = self.config.dead_time;
        let bias_time = self.config.bias_time;

        let mut entry: u32 = 0;
        let mut channel_pair: (u32, u32) = (0, 0);
        let mut mac_pair: (u32, u32) = if is_minos { (0, 0) } else { (mac5, mac5) };
        let mut pair_found = false;
        let mut readout = OpenReadout::start(
            *first,
            self.clock.time(first.t0),
            tagger.layer_of(first.channel),
        );

        for hit in tagger.data.iter().skip(1) {
            let ttmp = self.clock.time(hit.t0);
            let restart = || OpenReadout::start(*hit, ttmp, tagger.layer_of(hit.channel));

            // The trigger found no partner layer in time: hand the trigger to this hit
            if needs_layer_pair && readout.layers.len() == 1 && ttmp - readout.ttrig > window {
                readout = restart();
                stats.coincidence.increment(det_type);
                continue;
            }

            if apply_minos_pair && !pair_found {
                match self.find_minos_partner(mac5, tagger, snapshot, readout.ttrig) {
                    Some(other) => {
                        pair_found = true;
                        mac_pair = (mac5, other);
                    }
                    None => {
                        readout = restart();
                        stats.coincidence.increment(det_type);
                        continue;
                    }
                }
            }

            if ttmp < readout.ttrig + window {
                if readout.channels.insert(hit.channel) {
                    readout.passing.push(*hit);
                    if readout.layers.insert(tagger.layer_of(hit.channel)) {
                        channel_pair = (readout.trigger.channel, hit.channel);
                    }
                } else if ttmp < readout.ttrig + bias_time {
                    if let Some(last) = readout.passing.last_mut() {
                        last.adc = last.adc.saturating_add(hit.adc);
                    }
                } else {
                    stats.lock.increment(det_type);
                }
            } else if ttmp <= readout.ttrig + dead_time {
                stats.dead_time.increment(det_type);
            } else {
                let closed = std::mem::replace(&mut readout, restart());
                stats.count_readout(tagger, closed.passing.len());
                readouts.push(CrtData {
                    mac5,
                    entry,
                    ts0: closed.ttrig,
                    trigger_channel: closed.trigger.channel,
                    channel_pair,
                    mac_pair,
                    channels: closed.passing,
                });
                entry += 1;
                pair_found = false;
            }
        }

        // The last window is read out too, once it satisfies the coincidence
        if apply_minos_pair && !pair_found {
            match self.find_minos_partner(mac5, tagger, snapshot, readout.ttrig) {
                Some(other) => mac_pair = (mac5, other),
                None => {
                    stats.coincidence.increment(det_type);
                    return;
                }
            }
        }
        if needs_layer_pair && readout.layers.len() < 2 {
            stats.coincidence.increment(det_type);
            return;
        }
        stats.count_readout(tagger, readout.passing.len());
        readouts.push(CrtData {
            mac5,
            entry,
            ts0: readout.ttrig,
            trigger_channel: readout.trigger.channel,
            channel_pair,
            mac_pair,
            channels: readout.passing,
        });
    }
}
