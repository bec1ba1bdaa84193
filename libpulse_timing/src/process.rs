use std::collections::BTreeSet;
use std::sync::mpsc::Sender;

use super::analysis::{analyze_amplitudes, analyze_run};
use super::config::{Config, RunType};
use super::discovery::find_run_files;
use super::error::{DiscoveryError, ProcessorError};
use super::jitter::{solve_observations, PairObservation};
use super::report::{CombinedReport, JitterReport, PairReport, RunReport};
use super::run::{ChannelId, Run};
use super::worker_status::{RunStage, WorkerStatus};

/// The main loop of pulse_timing.
///
/// Discovers the capture files of a run, decodes and aligns them, runs the analysis
/// and writes the run report. Progress is reported through `tx`.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<RunReport, ProcessorError> {
    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        RunStage::Loading,
    ))?;
    let files = find_run_files(&config.data_path, run_number)?;
    log::info!(
        "Found {} capture files in {} with total size: {}",
        files.channels.len(),
        files.directory.to_string_lossy(),
        human_bytes::human_bytes(files.get_total_data_size() as f64)
    );

    let params = config.get_run_params(run_number);
    let expected: Vec<ChannelId> = match params.run_type {
        RunType::FourFold => config.channels.clone(),
        RunType::Single => files.channels.keys().copied().collect(),
    };
    let run = Run::load(&files, &expected)?;
    log::info!(
        "Loaded {} channels with {} events",
        run.channels().len(),
        run.n_events()
    );

    tx.send(WorkerStatus::new(
        0.5,
        run_number,
        *worker_id,
        RunStage::Analyzing,
    ))?;
    let analysis = match params.run_type {
        RunType::FourFold => analyze_run(&run, &config.analysis, config.solve_mode)?,
        RunType::Single => analyze_amplitudes(&run, &config.analysis)?,
    };

    tx.send(WorkerStatus::new(
        0.9,
        run_number,
        *worker_id,
        RunStage::Writing,
    ))?;
    let report = RunReport::new(&analysis, params, &config.calibration);
    report.write(&config.get_report_file_name(&report.run_name)?)?;

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        RunStage::Done,
    ))?;
    Ok(report)
}

/// Process a subset of runs
///
/// A failing run is logged and skipped; only a lost connection to the front end stops
/// the worker.
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<Vec<RunReport>, ProcessorError> {
    let mut reports = Vec::new();
    for run in subset {
        log::info!("Processing run {}...", run);
        match process_run(&config, run, &tx, &worker_id) {
            Ok(report) => {
                log::info!("Finished processing run {}.", run);
                reports.push(report);
            }
            Err(ProcessorError::SendError(e)) => return Err(ProcessorError::SendError(e)),
            Err(ProcessorError::DiscoveryError(DiscoveryError::RunNotFound(_, _))) => {
                log::info!("Run {} does not exist, skipping...", run);
            }
            Err(e) => {
                log::error!("Run {} failed and was skipped: {e}", run);
                tx.send(WorkerStatus::new(1.0, run, worker_id, RunStage::Failed))?;
            }
        }
    }
    Ok(reports)
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}

/// Solve the jitter across runs using only the middle pair of each run.
///
/// The middle detectors see full-length tracks, so their pair variance is the least
/// biased by clipping. Variances are in ns^2. Returns None if no run has a usable
/// middle pair.
pub fn combine_middle_pairs(
    reports: &[RunReport],
    config: &Config,
) -> Result<Option<CombinedReport>, ProcessorError> {
    let mut runs = Vec::new();
    let mut pairs = Vec::new();
    for report in reports.iter() {
        if let Some(pair) = report.middle_pair.filter(|p| !p.variance_ns2.is_nan()) {
            runs.push(report.run_number);
            pairs.push(pair);
        }
    }
    if pairs.is_empty() {
        log::warn!("No run has a usable middle pair, skipping combined jitter");
        return Ok(None);
    }

    let channels: Vec<ChannelId> = pairs
        .iter()
        .flat_map(|p| [p.channel_a, p.channel_b])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let observations: Vec<PairObservation> = pairs.iter().map(PairReport::observation).collect();
    let solution = solve_observations(&channels, &observations, config.solve_mode)?;
    log::info!(
        "Combined jitter from {} runs: {:?}",
        runs.len(),
        solution.sigmas
    );
    Ok(Some(CombinedReport {
        runs,
        observations: pairs,
        jitter: JitterReport::from_solution(&solution, 1.0),
    }))
}

/// Run the combined analysis if requested and write `combined_jitter.yml`
pub fn write_combined_report(config: &Config, reports: &[RunReport]) -> Result<(), ProcessorError> {
    if !config.combine_middle_pairs {
        return Ok(());
    }
    if let Some(combined) = combine_middle_pairs(reports, config)? {
        combined.write(&config.get_combined_file_name()?)?;
    }
    Ok(())
}
