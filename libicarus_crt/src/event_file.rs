use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::crt_hit::CrtHit;
use super::det_sim::AuxDetSimChannel;
use super::error::EventFileError;
use super::track::Track;

/// Inputs of one triggered event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrtEvent {
    pub event: u64,
    /// Absolute trigger time (ns)
    pub trigger_timestamp: u64,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub crt_hits: Vec<CrtHit>,
    /// True CRT deposits, only needed to run the front-end simulation
    #[serde(default)]
    pub aux_det_channels: Vec<AuxDetSimChannel>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventList {
    events: Vec<CrtEvent>,
}

/// A YAML file holding a list of events
#[derive(Debug)]
pub struct EventFile {
    path: PathBuf,
    events: Vec<CrtEvent>,
}

impl EventFile {
    pub fn new(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let list = serde_yaml::from_str::<EventList>(&yaml_str)?;
        Ok(Self {
            path: path.to_path_buf(),
            events: list.events,
        })
    }

    /// Write events to a file in the format read by [`EventFile::new`]
    pub fn write(path: &Path, events: Vec<CrtEvent>) -> Result<(), EventFileError> {
        let yaml_str = serde_yaml::to_string(&EventList { events })?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn events(&self) -> &[CrtEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// All event files (.yml or .yaml) in a directory, in name order
pub fn list_event_files(parent_path: &Path) -> Result<Vec<PathBuf>, EventFileError> {
    if !parent_path.exists() {
        return Err(EventFileError::BadFilePath(parent_path.to_path_buf()));
    }
    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        let is_yaml = item_path
            .extension()
            .map(|ext| ext == "yml" || ext == "yaml")
            .unwrap_or(false);
        if item_path.is_file() && is_yaml {
            file_list.push(item_path);
        }
    }

    if file_list.is_empty() {
        return Err(EventFileError::NoMatchingFiles(parent_path.to_path_buf()));
    }
    file_list.sort();
    Ok(file_list)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = r#"
events:
  - event: 12
    trigger_timestamp: 1600000000000250000
    tracks:
      - id: 0
        tpcs: [1]
        points:
          - position: [75.0, 120.0, 10.0]
            direction: [0.0, -1.0, 0.0]
          - position: [75.0, -150.0, 10.0]
            direction: [0.0, -1.0, 0.0]
            valid: false
    crt_hits:
      - position: [75.0, 300.0, 10.0]
        position_err: [5.0, 1.0, 5.0]
        pe: 80.0
        ts0_ns: 250100
        ts1_ns: 100
  - event: 13
    trigger_timestamp: 1600000001000000000
"#;

    #[test]
    fn test_read_events() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("run_1.yml");
        std::fs::write(&path, EVENTS).expect("write");

        let file = EventFile::new(&path).expect("valid events");
        assert_eq!(file.len(), 2);
        let first = &file.events()[0];
        assert_eq!(first.event, 12);
        assert_eq!(first.tracks[0].n_points(), 2);
        assert!(first.tracks[0].points[0].valid);
        assert!(!first.tracks[0].points[1].valid);
        assert_eq!(first.crt_hits[0].tagger, "");
        assert!(file.events()[1].tracks.is_empty());
    }

    #[test]
    fn test_list_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            list_event_files(dir.path()),
            Err(EventFileError::NoMatchingFiles(_))
        ));
        for name in ["b.yaml", "a.yml", "notes.txt"] {
            std::fs::write(dir.path().join(name), "events: []\n").expect("write");
        }
        let files = list_event_files(dir.path()).expect("two event files");
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.yml");
        let event = CrtEvent {
            event: 4,
            trigger_timestamp: 77,
            ..Default::default()
        };
        EventFile::write(&path, vec![event]).expect("write");
        let file = EventFile::new(&path).expect("read back");
        assert_eq!(file.events()[0].trigger_timestamp, 77);
    }
}
