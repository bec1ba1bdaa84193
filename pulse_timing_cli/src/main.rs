use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use libpulse_timing::config::Config;
use libpulse_timing::process::{create_subsets, process_subset, write_combined_report};
use libpulse_timing::report::RunReport;
use libpulse_timing::wfm_file::WfmFile;
use libpulse_timing::worker_status::{RunStage, WorkerStatus};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Print the header and a frame summary of a single capture file
fn inspect_file(path: &Path) {
    let file = match WfmFile::open(path) {
        Ok(f) => f,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    let header = &file.header;
    log::info!("File: {}", file.get_path().to_string_lossy());
    log::info!(
        "Size: {}",
        human_bytes::human_bytes(file.get_size_bytes() as f64)
    );
    log::info!("Version: {}", header.version);
    log::info!("Byte order: {:?}", header.byte_order);
    log::info!(
        "Sample format: {:?} ({} bytes per point)",
        header.sample_format,
        header.bytes_per_point
    );
    log::info!(
        "Volt scale: {:e} V Volt offset: {:e} V",
        header.volt_scale,
        header.volt_offset
    );
    log::info!(
        "Time scale: {:e} s Time offset: {:e} s",
        header.time_scale,
        header.time_offset
    );
    log::info!(
        "Declared frames: {} Decoded frames: {} Samples per frame: {}",
        header.declared_frames(),
        file.waveforms.n_frames(),
        file.waveforms.samples_per_frame()
    );
}

fn bar_style(stage: RunStage) -> ProgressStyle {
    let template = format!(
        "{{prefix}} [{{bar:40.{}/blue}}] {{percent:>3}}% {{msg}}",
        stage.color()
    );
    ProgressStyle::with_template(&template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn main() {
    // Create a cli
    let matches = Command::new("pulse_timing_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("inspect").about("Print the header of a .wfm capture file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
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

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!("Making a template config at {}...", path.to_string_lossy());
            make_template_config(&path);
            log::info!("Done.");
            return;
        }
        Some(("inspect", _)) => {
            inspect_file(&path);
            return;
        }
        _ => (),
    }

    // Load our config
    log::info!("Loading config from {}...", path.to_string_lossy());
    let config = match Config::read_config_file(&path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("Number of workers must be at least 1, got {}", config.n_threads);
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!("Channels: {:?}", config.channels);
    log::info!("Solve Mode: {:?}", config.solve_mode);

    // Spawn the workers, one progress bar each
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers = Vec::new();
    let mut bars = Vec::new();
    for (idx, subset) in create_subsets(&config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(bar_style(RunStage::Loading));
        pb.set_prefix(format!("Worker {idx}"));
        bars.push((idx, pb, RunStage::Loading));
        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    drop(tx);

    let mut reports: Vec<RunReport> = Vec::new();
    let mut n_failed = 0;
    loop {
        // No UI event loop here, so poll every 100 ms
        std::thread::sleep(std::time::Duration::from_millis(100));
        loop {
            match rx.try_recv() {
                Ok(status) => {
                    if let Some((_, pb, stage)) =
                        bars.iter_mut().find(|(id, _, _)| *id == status.worker_id)
                    {
                        if *stage != status.stage {
                            pb.set_style(bar_style(status.stage));
                            *stage = status.stage;
                        }
                        pb.set_position((status.progress * 100.0) as u64);
                        pb.set_message(format!(
                            "run {} {}",
                            status.run_number,
                            status.stage.label()
                        ));
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }

        if workers.iter().all(|w| w.is_finished()) {
            for worker in workers.drain(..) {
                match worker.join() {
                    Ok(Ok(mut worker_reports)) => reports.append(&mut worker_reports),
                    Ok(Err(e)) => {
                        n_failed += 1;
                        log::error!("Processor error: {e}");
                    }
                    Err(_) => {
                        n_failed += 1;
                        log::error!("An error occured joining one of the workers!");
                    }
                }
            }
            break;
        }
    }
    for (_, pb, _) in bars.iter() {
        pb.finish();
    }

    reports.sort_by_key(|r| r.run_number);
    for report in reports.iter() {
        let jitter = report
            .jitter
            .as_ref()
            .map(|j| format!("{:?}", j.sigmas_ns))
            .unwrap_or_else(|| String::from("n/a"));
        log::info!(
            "{}: {} events ({} clean, {} clipped, {} noise) jitter [ns]: {}",
            report.run_name,
            report.n_events,
            report.n_clean,
            report.n_clipped,
            report.n_noise,
            jitter
        );
    }
    if let Err(e) = write_combined_report(&config, &reports) {
        log::error!("Combined jitter failed with error: {e}");
    }

    if n_failed > 0 {
        log::error!("{n_failed} workers stopped early, check the log above.");
    }
    log::info!("Processed {} runs. Done.", reports.len());
}
