use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error)]
pub enum AuxDetError {
    #[error("Found invalid CRT module type keyword: {0}")]
    InvalidType(String),
    #[error("Found invalid CRT region keyword: {0}")]
    InvalidRegion(String),
    #[error("Found invalid strip axis keyword: {0}")]
    InvalidAxis(String),
}

#[derive(Debug, Error)]
pub enum StripTableError {
    #[error("StripTable failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("StripTable failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("StripTable failed to parse a float: {0}")]
    FloatParsingError(#[from] std::num::ParseFloatError),
    #[error("StripTable failed to parse a keyword: {0}")]
    BadKeyword(#[from] AuxDetError),
    #[error("StripTable was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("StripTable found strip {1} of module {0} more than once")]
    DuplicateStrip(u32, u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Event file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Did not find any event files in the event directory {0:?}")]
    NoMatchingFiles(PathBuf),
}

#[derive(Debug, Error)]
pub enum ResultsWriterError {
    #[error("ResultsWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ResultsWriter failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to event file error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to ResultsWriter error: {0}")]
    WriterError(#[from] ResultsWriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to StripTable error: {0}")]
    StripTableError(#[from] StripTableError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
