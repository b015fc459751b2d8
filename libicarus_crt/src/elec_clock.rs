/// The CRT trigger clock: converts times to integer ticks and back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElecClock {
    /// MHz
    frequency: f64,
}

impl ElecClock {
    pub fn new(frequency: f64) -> Self {
        Self { frequency }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Tick period (us)
    pub fn tick_period(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Number of whole ticks elapsed at `time` (us). Times before the clock
    /// start are clamped to tick 0.
    pub fn ticks(&self, time: f64) -> u32 {
        let ticks = (time * self.frequency).floor();
        if ticks <= 0.0 {
            0
        } else if ticks >= u32::MAX as f64 {
            u32::MAX
        } else {
            ticks as u32
        }
    }

    /// Start time (us) of a tick
    pub fn time(&self, ticks: u32) -> f64 {
        ticks as f64 / self.frequency
    }

    /// Ticks in one second, the PPS period
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks(1e6)
    }
}
