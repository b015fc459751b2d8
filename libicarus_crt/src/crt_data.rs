use serde::{Deserialize, Serialize};

/// Digitized response of one front-end channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrtChannelData {
    pub channel: u32,
    /// Trigger clock ticks of the threshold crossing
    pub t0: u32,
    /// Trigger clock ticks since the last PPS
    pub t1: u32,
    pub adc: i16,
}

impl CrtChannelData {
    pub fn new(channel: u32, t0: u32, t1: u32, adc: i16) -> Self {
        Self {
            channel,
            t0,
            t1,
            adc,
        }
    }
}

/// One front-end readout: a trigger and the channels latched with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrtData {
    /// Front-end board address
    pub mac5: u32,
    /// Readout counter within the event on this board
    pub entry: u32,
    /// Trigger time (us)
    pub ts0: f64,
    pub trigger_channel: u32,
    /// First two channels seen in distinct layers
    pub channel_pair: (u32, u32),
    /// Boards that provided the coincidence
    pub mac_pair: (u32, u32),
    pub channels: Vec<CrtChannelData>,
}

impl CrtData {
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }
}
