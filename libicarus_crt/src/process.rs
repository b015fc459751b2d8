use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::channel_map::StripTable;
use super::config::Config;
use super::det_sim::CrtDetSim;
use super::error::ProcessorError;
use super::event_file::{list_event_files, EventFile};
use super::results_writer::{EventResult, ResultsWriter};
use super::t0_match::CrtT0MatchAlg;
use super::worker_status::{BarColor, WorkerStatus};

/// An event file and its index in the sorted file list
pub type FileEntry = (usize, PathBuf);

/// Load the strip table if the front-end simulation is requested
fn load_strip_table(config: &Config) -> Result<Option<StripTable>, ProcessorError> {
    if !config.run_simulation() {
        return Ok(None);
    }
    match &config.strip_table_path {
        Some(path) => {
            let table = StripTable::new(path)?;
            log::info!("Loaded {} CRT strips from {}", table.len(), path.display());
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

/// The main loop of icarus_crt.
///
/// Matches every track of every event in one file to the CRT hits and, if a
/// strip table is available, simulates the CRT front-end response. Results are
/// written next to each other in one output file.
pub fn process_file(
    config: &Config,
    file_index: usize,
    event_path: &Path,
    strip_table: Option<&StripTable>,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let geometry = config.geometry.build_geometry()?;
    let sce = config.geometry.build_space_charge();
    let matcher = CrtT0MatchAlg::new(config.matching.clone(), &geometry, &sce)?;

    // Each file gets its own stream so results do not depend on the worker layout
    let sim_config = config.simulation.clone().map(|mut sim| {
        sim.seed = sim.seed.wrapping_add(file_index as u64);
        sim
    });
    let mut det_sim = match (&sim_config, strip_table) {
        (Some(sim), Some(table)) => Some(CrtDetSim::new(sim, table)?),
        _ => None,
    };
    let color = if det_sim.is_some() {
        BarColor::GREEN
    } else {
        BarColor::CYAN
    };

    let event_file = EventFile::new(event_path)?;
    let output_path = config.get_output_file_name(event_path)?;
    let mut writer = ResultsWriter::new(&output_path, event_path)?;
    log::info!(
        "Processing {} events from {}...",
        event_file.len(),
        event_path.display()
    );

    let total_events = event_file.len().max(1);
    let flush_frac: f32 = 0.01;
    let flush_val = ((total_events as f32 * flush_frac).ceil() as usize).max(1);
    tx.send(WorkerStatus::new(0.0, file_index, *worker_id, color))?;

    for (count, event) in event_file.events().iter().enumerate() {
        let matches = matcher.match_tracks(&event.tracks, &event.crt_hits, event.trigger_timestamp);
        let n_matched = matches.iter().filter(|m| m.is_match()).count();
        log::debug!(
            "Event {}: matched {} of {} tracks",
            event.event,
            n_matched,
            matches.len()
        );

        let (crt_data, sim_stats) = match det_sim.as_mut() {
            Some(sim) => {
                let output = sim.simulate(&event.aux_det_channels);
                (output.readouts, Some(output.stats))
            }
            None => (vec![], None),
        };

        writer.write_event(EventResult {
            event: event.event,
            trigger_timestamp: event.trigger_timestamp,
            matches,
            crt_data,
            sim_stats,
        });

        if (count + 1) % flush_val == 0 {
            tx.send(WorkerStatus::new(
                (count + 1) as f32 / total_events as f32,
                file_index,
                *worker_id,
                color,
            ))?;
        }
    }

    writer.close()?;
    tx.send(WorkerStatus::new(1.0, file_index, *worker_id, color))?;
    Ok(())
}

/// Process a subset of event files
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<FileEntry>,
) -> Result<(), ProcessorError> {
    let strip_table = load_strip_table(&config)?;
    for (file_index, path) in subset {
        log::info!("Processing file {}...", path.display());
        process_file(
            &config,
            file_index,
            &path,
            strip_table.as_ref(),
            &tx,
            &worker_id,
        )?;
        log::info!("Finished processing file {}.", path.display());
    }
    Ok(())
}

/// Divide the event files in to a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config) -> Result<Vec<Vec<FileEntry>>, ProcessorError> {
    let files = list_event_files(&config.event_path)?;
    let mut subsets: Vec<Vec<FileEntry>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, file) in files.into_iter().enumerate() {
        subsets[idx % n_subsets].push((idx, file))
    }

    Ok(subsets)
}
