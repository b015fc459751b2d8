/// What a worker is currently busy with, shown as the color of its progress bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    /// Matching tracks to CRT hits
    #[default]
    CYAN,
    /// Simulating the CRT front-end
    GREEN,
}

impl BarColor {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::CYAN => "Matching",
            Self::GREEN => "Simulating",
        }
    }
}

/// Progress message sent from a worker thread
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    /// Fraction of the current file done
    pub progress: f32,
    /// Index of the current file in the sorted event file list
    pub file_index: usize,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, file_index: usize, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            file_index,
            worker_id,
            color,
        }
    }
}
