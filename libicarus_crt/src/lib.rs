//! # icarus_crt
//!
//! icarus_crt matches reconstructed TPC tracks of the ICARUS detector to hits in the
//! Cosmic Ray Tagger (CRT), written in Rust. A matched CRT hit gives the track its
//! absolute time (t0), which the TPC alone cannot measure. The library also contains a
//! simulation of the CRT front-end electronics, turning true energy deposits in the CRT
//! scintillator strips into front-end board (FEB) readouts.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./icarus_crt_cli` from the top
//! level repository. Once installed, run `icarus_crt_cli -p config.yml new` to make a
//! template configuration and `icarus_crt_cli -p config.yml` to process the event files.
//!
//! ## Configuration
//!
//! A configuration is a YAML file. Every section below `n_threads` can be left out, in
//! which case the defaults are used. An abbreviated example:
//!
//! ```yml
//! event_path: /data/events
//! output_path: /data/crt
//! strip_table_path: /data/crt_strips.csv
//! n_threads: 4
//! matching:
//!   min_track_length: 20.0
//!   track_direction_frac: 0.5
//!   distance_limit: 100.0
//!   timestamp_mode: ts0
//!   direction_method: endpoint
//!   dca_mode: point
//!   ranking: dca
//!   d_over_l_limit: 1.0
//!   time_margin: 10.0
//! simulation:
//!   seed: 12345
//!   q_threshold_c: 100.0
//!   dead_time: 22.0
//!   trigger_clock_frequency: 16.0
//! geometry:
//!   drift_velocity: 0.157
//!   tpcs:
//!     - id: 0
//!       min: [-358.49, -181.86, -894.95]
//!       max: [-210.29, 134.96, 894.95]
//!       drift_direction: -1
//! ```
//!
//! Setting `simulation` to `null`, or leaving `strip_table_path` empty, skips the
//! front-end simulation. Each event file gets its own random stream (the configured seed
//! plus the index of the file), so results do not depend on the number of workers.
//!
//! ### Strip Table Format
//!
//! The strip table is a CSV file with *no* whitespaces. The columns are as follows:
//!
//! ```csv
//! adid,adsid,type,region,layer,stack,cx,cy,cz,half_width,half_height,half_length,length_axis,width_axis
//! ```
//!
//! The first line is a header and is skipped. `adid` and `adsid` are the module and strip
//! numbers. `type` is one of `c` (CERN), `d` (Double Chooz) or `m` (MINOS), `region` is
//! the CRT wall name (`Top`, `SlopeLeft`, `Left`, `Bottom`, ...). Centers and half
//! dimensions are in cm, axes are `x`, `y` or `z`.
//!
//! ## Event Files
//!
//! Every `.yml`/`.yaml` file in `event_path` holds a list of events, each with the trigger
//! timestamp (ns), the reconstructed tracks, the CRT hits and optionally the true CRT
//! deposits:
//!
//! ```yml
//! events:
//!   - event: 12
//!     trigger_timestamp: 1600000000000250000
//!     tracks:
//!       - id: 0
//!         tpcs: [1]
//!         points:
//!           - position: [75.0, 120.0, 10.0]
//!             direction: [0.0, -1.0, 0.0]
//!     crt_hits:
//!       - position: [75.0, 300.0, 10.0]
//!         position_err: [5.0, 1.0, 5.0]
//!         pe: 80.0
//!         ts0_ns: 250100
//!         ts1_ns: 100
//!     aux_det_channels: []
//! ```
//!
//! ## Output
//!
//! For every event file `<name>.yml` a results file `<name>_crt.yml` is written to
//! `output_path`, containing the match of every track (a DCA of -1 and a time of -99999
//! mark an unmatched track), the simulated FEB readouts and the simulation counters.
pub mod aux_det;
pub mod channel_map;
pub mod coincidence;
pub mod config;
pub mod constants;
pub mod crt_data;
pub mod crt_hit;
pub mod dca;
pub mod det_sim;
pub mod elec_clock;
pub mod error;
pub mod event_file;
pub mod geometry;
pub mod process;
pub mod results_writer;
pub mod t0_match;
pub mod track;
pub mod vector;
pub mod worker_status;
