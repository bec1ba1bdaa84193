//! # pulse_timing
//!
//! pulse_timing extracts pulse amplitudes and sub-nanosecond arrival times from
//! oscilloscope captures of a four-detector cosmic-ray stack, and decomposes the
//! pairwise timing-difference variances into the intrinsic timing jitter of each
//! detector.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, see the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installing the tool chain.
//!
//! To build and install the CLI use `cargo install --path ./pulse_timing_cli` from the
//! top level repository. To use the CLI see the `pulse_timing_cli` README.
//!
//! ## Data Layout
//!
//! Captures are Tektronix `.wfm` files, one per channel, stored as
//!
//! ```text
//! data_path
//! |---- run011_1000_config_1342_thorium
//! |    |---- cosmics_Ch1.wfm
//! |    |---- cosmics_Ch2.wfm
//! |    |---- cosmics_Ch3.wfm
//! |    |---- cosmics_Ch4.wfm
//! ```
//!
//! The run directory must start with `run` and the zero padded run number. The optional
//! `config_ABCD` token gives the channels of the stack from top to bottom. Fast-frame
//! captures hold one frame per trigger; frame `i` of every channel is the same event.
//!
//! ## Pipeline
//!
//! For each run:
//!
//! 1. Decode every channel and truncate them to the shortest frame count
//! 2. Compute the pulse amplitude (most negative sample) of every event
//! 3. Compute an amplitude cut per channel: top and bottom detectors are cut at a
//!    fraction of their amplitude peak, middle detectors at a fixed floor
//! 4. Classify each event as noise (positive excursion in any channel), clipped (any
//!    channel below its cut) or clean
//! 5. Time the clean events with a digital constant-fraction discriminator
//! 6. Collect the time difference statistics of every channel pair
//! 7. Solve `x_a + x_b = Var(t_a - t_b)` for non-negative per-channel variances
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! data_path: /data/cosmics
//! output_path: /data/reports
//! first_run_number: 1
//! last_run_number: 20
//! n_threads: 2
//! channels: [1, 2, 3, 4]
//! analysis:
//!   cfd_fraction: 0.3
//!   cfd_noise_floor_v: 0.0005
//!   noise_threshold_v: 0.03
//!   cut_floor_v: 0.05
//!   top_bottom_cut_fraction: 0.9
//!   cut_histogram_bins: 100
//!   cut_histogram_max_v: 0.5
//!   min_clean_events: 10
//! solve_mode: Strict
//! combine_middle_pairs: true
//! default_run_params:
//!   landau_lower: 0.01
//!   landau_upper: 0.4
//!   landau_bins: 50
//!   run_type: FourFold
//!   notes: null
//! run_params: {}
//! calibration:
//!   1: 0.1083
//! ```
//!
//! `solve_mode: BestEffort` solves the jitter system even when some pair variances are
//! undefined. `run_params` overrides the Landau histogram range per run number; runs of
//! type `Single` only get an amplitude spectrum.
//!
//! ## Output
//!
//! Each run writes `<run_name>_report.yml` to `output_path`, holding the event counts,
//! cuts, per-channel amplitude histograms, pair statistics and jitter in ns. With
//! `combine_middle_pairs` the jitter solved across all runs from their middle pairs is
//! written to `combined_jitter.yml`.
pub mod analysis;
pub mod cfd;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod histogram;
pub mod jitter;
pub mod process;
pub mod pulse;
pub mod report;
pub mod run;
pub mod stack_layout;
pub mod timing;
pub mod wfm_file;
pub mod wfm_header;
pub mod worker_status;
