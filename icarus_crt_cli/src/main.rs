use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use libicarus_crt::config::Config;
use libicarus_crt::error::ProcessorError;
use libicarus_crt::process::{create_subsets, process_subset};
use libicarus_crt::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn bar_style(color: BarColor) -> ProgressStyle {
    let template = match color {
        BarColor::CYAN => "{prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        BarColor::GREEN => "{prefix} [{bar:40.green/blue}] {pos:>3}% {msg}",
    };
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    bar.set_style(bar_style(status.color));
    bar.set_position((status.progress * 100.0) as u64);
    bar.set_message(format!(
        "{} file {}",
        status.color.stage(),
        status.file_index
    ));
}

fn main() {
    // Create a cli
    let matches = Command::new("icarus_crt_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(path) => PathBuf::from(path),
        None => {
            log::error!("A configuration path is required!");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Event Path: {}", config.event_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    match &config.strip_table_path {
        Some(path) => log::info!("Strip Table Path: {}", path.to_string_lossy()),
        None => log::info!("Strip Table Path: None"),
    }
    log::info!("Number of Workers: {}", config.n_threads);
    log::info!("Run Front-End Simulation: {}", config.run_simulation());

    let subsets = match create_subsets(&config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    // Spawn the workers! Workers with nothing to do are never made
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut handles: Vec<JoinHandle<Result<(), ProcessorError>>> = Vec::new();
    let mut bars: BTreeMap<usize, ProgressBar> = BTreeMap::new();
    for (worker_id, subset) in subsets.into_iter().enumerate() {
        if subset.is_empty() {
            continue;
        }
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(BarColor::default()));
        bar.set_prefix(format!("Worker {worker_id}"));
        bars.insert(worker_id, bar);

        let conf = config.clone();
        let worker_tx = tx.clone();
        handles.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, worker_id, subset)
        }));
    }
    // Only the workers hold senders now, so the channel closes once they are all done
    drop(tx);

    loop {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(status) => {
                if let Some(bar) = bars.get(&status.worker_id) {
                    update_bar(bar, &status);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for bar in bars.values() {
        bar.finish();
    }

    let mut n_failed = 0;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                log::error!("Processing failed with error: {e}");
                n_failed += 1;
            }
            Err(_) => {
                log::error!("Failed to join processing task!");
                n_failed += 1;
            }
        }
    }

    if n_failed == 0 {
        log::info!("Successfully processed all event files!");
    }
    log::info!("Done.");
}
