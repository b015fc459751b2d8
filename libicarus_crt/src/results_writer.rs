use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::crt_data::CrtData;
use super::det_sim::DetSimStats;
use super::error::ResultsWriterError;
use super::t0_match::MatchResult;

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

/// Everything produced for one event
#[derive(Debug, Clone, Serialize)]
pub struct EventResult {
    pub event: u64,
    pub trigger_timestamp: u64,
    pub matches: Vec<MatchResult>,
    /// Simulated front-end readouts, empty when the simulation is off
    pub crt_data: Vec<CrtData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_stats: Option<DetSimStats>,
}

#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    version: String,
    source: &'a Path,
    n_tracks: usize,
    n_matched: usize,
    events: &'a [EventResult],
}

/// Collects the results of an event file and writes them as YAML when closed.
///
/// The output file is created (and truncated) as soon as the writer is made so
/// that a bad output path fails before any work is done.
#[derive(Debug)]
pub struct ResultsWriter {
    file_handle: File,
    path: PathBuf,
    source: PathBuf,
    events: Vec<EventResult>,
    n_tracks: usize,
    n_matched: usize,
}

impl ResultsWriter {
    /// Create the writer, opening a file at path
    pub fn new(path: &Path, source: &Path) -> Result<Self, ResultsWriterError> {
        let file_handle = File::create(path)?;
        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
            source: source.to_path_buf(),
            events: vec![],
            n_tracks: 0,
            n_matched: 0,
        })
    }

    pub fn write_event(&mut self, result: EventResult) {
        self.n_tracks += result.matches.len();
        self.n_matched += result.matches.iter().filter(|m| m.is_match()).count();
        self.events.push(result);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write everything collected so far, consume the writer
    pub fn close(self) -> Result<(), ResultsWriterError> {
        let contents = ResultsFile {
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION),
            source: &self.source,
            n_tracks: self.n_tracks,
            n_matched: self.n_matched,
            events: &self.events,
        };
        serde_yaml::to_writer(BufWriter::new(self.file_handle), &contents)?;
        log::info!(
            "{} events written to {}. Matched {} of {} tracks to a CRT hit.",
            self.events.len(),
            self.path.display(),
            self.n_matched,
            self.n_tracks
        );
        Ok(())
    }
}
