use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use apnea_calibrator::analysis::{
    apply_judgments, Candidate, CandidateStatus, EnergyEnvelope, EnvelopePoint,
    EnvelopeStatistics, TimeSpan,
};
use apnea_calibrator::calibration::{
    CalibrationParameters, JudgmentStatistics, JudgmentSummary, Marker,
};
use apnea_calibrator::config::{AppConfig, SigmaBand};
use apnea_calibrator::storage::{JobStore, JsonFileStore};
use apnea_calibrator::testing::{evenly_spaced_pauses, SyntheticRecording};
use apnea_calibrator::{ApneaPipeline, Score};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "apnea_cli",
    about = "Semi-automated apnea detection and AHI scoring for sleep recordings"
)]
struct Cli {
    /// Directory holding per-job records
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,
    /// JSON configuration file; without it `<data-dir>/config.json` is used
    /// when present, else the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a synthetic recording with evenly spaced apnea pauses
    Synth {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 6.0)]
        minutes: f64,
        #[arg(long, default_value_t = 3)]
        apneas: usize,
        #[arg(long, default_value_t = 20.0)]
        pause_secs: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 8_000)]
        sample_rate: u32,
    },
    /// Decode a WAV recording, build its envelope and propose candidates
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        job: String,
    },
    /// Print a downsampled envelope with rms statistics
    Envelope {
        #[arg(long)]
        job: String,
        #[arg(long, default_value_t = 5_000)]
        max_points: usize,
    },
    /// Record a judgment for one candidate
    Judge {
        #[arg(long)]
        job: String,
        #[arg(long)]
        candidate: u32,
        /// apnea, skip or unjudged
        #[arg(long)]
        status: CandidateStatus,
    },
    /// Summarise the judgments of a job
    Summary {
        #[arg(long)]
        job: String,
    },
    /// Propose peaks statistically similar to the apnea judgments
    Expand {
        #[arg(long)]
        job: String,
        /// Band width in standard deviations (1 or 2)
        #[arg(long)]
        sigma: Option<u8>,
        /// Maximum number of new candidates
        #[arg(long)]
        max: Option<usize>,
    },
    /// Derive and store detection parameters
    Calibrate {
        #[arg(long)]
        job: String,
        /// Calibrate from marked pauses instead of judgments, e.g. 90:110,180:200
        #[arg(long, value_delimiter = ',', value_parser = parse_marker)]
        from_markers: Vec<Marker>,
    },
    /// Detect events over the whole recording and compute the AHI
    Report {
        #[arg(long)]
        job: String,
        #[arg(
            long,
            requires = "resume_multiplier",
            conflicts_with_all = ["baseline", "stored", "from_judgments"]
        )]
        silence_threshold: Option<f64>,
        #[arg(
            long,
            requires = "silence_threshold",
            conflicts_with_all = ["baseline", "stored", "from_judgments"]
        )]
        resume_multiplier: Option<f64>,
        /// Use uncalibrated parameters from the envelope distribution
        #[arg(long, conflicts_with_all = ["stored", "from_judgments"])]
        baseline: bool,
        /// Use the parameters saved by the last `calibrate`
        #[arg(long, conflicts_with = "from_judgments")]
        stored: bool,
        /// Count the apnea-judged candidates as the events, skipping detection
        #[arg(long)]
        from_judgments: bool,
        #[arg(long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
    },
    /// List stored jobs
    Jobs,
    /// Delete every record of a job
    Delete {
        #[arg(long)]
        job: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Csv,
}

/// How `report` obtains its events
#[derive(Debug, Clone, Copy)]
enum ReportSource {
    Explicit(f64, f64),
    Baseline,
    Stored,
    Judgments,
    Calibrate,
}

fn parse_marker(value: &str) -> Result<Marker, String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("marker '{}' must look like START:END", value))?;
    let start: f64 = start
        .trim()
        .parse()
        .map_err(|err| format!("marker start '{}': {}", start, err))?;
    let end: f64 = end
        .trim()
        .parse()
        .map_err(|err| format!("marker end '{}': {}", end, err))?;
    Ok(Marker { start, end })
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::try_load_from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => {
            let local = cli.data_dir.join("config.json");
            if local.is_file() {
                AppConfig::load_from_file(&local)
            } else {
                AppConfig::default()
            }
        }
    };
    let store = JsonFileStore::new(&cli.data_dir);

    match cli.command {
        Commands::Synth {
            output,
            minutes,
            apneas,
            pause_secs,
            seed,
            sample_rate,
        } => run_synth(&output, minutes, apneas, pause_secs, seed, sample_rate),
        Commands::Analyze { input, job } => run_analyze(config, &store, &input, &job),
        Commands::Envelope { job, max_points } => run_envelope(&store, &job, max_points),
        Commands::Judge {
            job,
            candidate,
            status,
        } => run_judge(&store, &job, candidate, status),
        Commands::Summary { job } => run_summary(&store, &job),
        Commands::Expand { job, sigma, max } => run_expand(config, &store, &job, sigma, max),
        Commands::Calibrate { job, from_markers } => {
            run_calibrate(config, &store, &job, &from_markers)
        }
        Commands::Report {
            job,
            silence_threshold,
            resume_multiplier,
            baseline,
            stored,
            from_judgments,
            format,
        } => {
            let source = match silence_threshold.zip(resume_multiplier) {
                Some((threshold, multiplier)) => ReportSource::Explicit(threshold, multiplier),
                None if baseline => ReportSource::Baseline,
                None if stored => ReportSource::Stored,
                None if from_judgments => ReportSource::Judgments,
                None => ReportSource::Calibrate,
            };
            run_report(config, &store, &job, source, format)
        }
        Commands::Jobs => run_jobs(&store),
        Commands::Delete { job } => run_delete(&store, &job),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run_synth(
    output: &Path,
    minutes: f64,
    apneas: usize,
    pause_secs: f64,
    seed: u64,
    sample_rate: u32,
) -> Result<ExitCode> {
    if !(minutes > 0.0) {
        bail!("--minutes must be positive (got {})", minutes);
    }
    let duration_secs = minutes * 60.0;
    let pauses = evenly_spaced_pauses(duration_secs, apneas, pause_secs);
    let recording = SyntheticRecording::new(sample_rate, duration_secs)
        .with_pauses(pauses.clone())
        .with_seed(seed);
    recording
        .write_wav(output)
        .with_context(|| format!("writing {}", output.display()))?;

    emit(&SynthReport {
        output: output.display().to_string(),
        sample_rate,
        duration_secs,
        pauses,
    })
}

fn run_analyze(config: AppConfig, store: &JsonFileStore, input: &Path, job: &str) -> Result<ExitCode> {
    let pipeline = ApneaPipeline::new(config)?;
    let (envelope, set) = pipeline
        .analyze_file(input)
        .with_context(|| format!("analyzing {}", input.display()))?;

    // Judgments refer to candidate ids, which a fresh analysis renumbers
    if store.delete_job(job)? {
        log::info!("[apnea_cli] Replaced previous analysis of job {}", job);
    }
    store.save_envelope(job, &envelope)?;
    store.save_candidates(job, &set.candidates)?;

    let window = pipeline.config().candidates.apnea_window_secs;
    emit(&AnalyzeReport {
        job,
        duration_secs: envelope.duration_secs(),
        hop_secs: envelope.hop_secs(),
        envelope_points: envelope.len(),
        peak_count: set.peaks.len(),
        candidates: candidate_views(&set.candidates, window),
    })
}

fn run_envelope(store: &JsonFileStore, job: &str, max_points: usize) -> Result<ExitCode> {
    let envelope = require_envelope(store, job)?;
    emit(&EnvelopeReport {
        job,
        hop_secs: envelope.hop_secs(),
        duration_secs: envelope.duration_secs(),
        statistics: envelope.statistics(),
        points: envelope.downsample(max_points),
    })
}

fn run_judge(
    store: &JsonFileStore,
    job: &str,
    candidate_id: u32,
    status: CandidateStatus,
) -> Result<ExitCode> {
    let candidates = store.load_candidates(job)?;
    if !candidates.iter().any(|c| c.id == candidate_id) {
        bail!("job {} has no candidate {}", job, candidate_id);
    }
    store.save_judgment(job, candidate_id, status)?;
    run_summary(store, job)
}

fn run_summary(store: &JsonFileStore, job: &str) -> Result<ExitCode> {
    let candidates = judged_candidates(store, job)?;
    emit(&SummaryReport {
        job,
        summary: JudgmentSummary::from_candidates(&candidates),
    })
}

fn run_expand(
    mut config: AppConfig,
    store: &JsonFileStore,
    job: &str,
    sigma: Option<u8>,
    max: Option<usize>,
) -> Result<ExitCode> {
    if let Some(sigma) = sigma {
        config.expansion.sigma_band = SigmaBand::try_from(sigma).map_err(|err| anyhow!(err))?;
    }
    if let Some(max) = max {
        config.expansion.max_additional = max;
    }
    let pipeline = ApneaPipeline::new(config)?;

    let envelope = require_envelope(store, job)?;
    // Extraction is deterministic, so the peak population is recomputed
    let peaks = pipeline.extract_candidates(&envelope)?.peaks;
    let mut stored = store.load_candidates(job)?;
    let judgments = store.load_judgments(job)?;
    let expansion = pipeline.expand(&peaks, &apply_judgments(&stored, &judgments))?;

    stored.extend(expansion.candidates.iter().cloned());
    store.save_candidates(job, &stored)?;

    let window = pipeline.config().candidates.apnea_window_secs;
    emit(&ExpandReport {
        job,
        statistics: expansion.statistics,
        band: expansion.band,
        candidates: candidate_views(&expansion.candidates, window),
    })
}

fn run_calibrate(
    config: AppConfig,
    store: &JsonFileStore,
    job: &str,
    markers: &[Marker],
) -> Result<ExitCode> {
    let pipeline = ApneaPipeline::new(config)?;
    let envelope = require_envelope(store, job)?;
    let parameters = if markers.is_empty() {
        let candidates = judged_candidates(store, job)?;
        pipeline.calibrate(&envelope, &candidates)?
    } else {
        pipeline.calibrate_from_markers(&envelope, markers)?
    };
    store.save_calibration(job, &parameters)?;

    emit(&CalibrateReport {
        job,
        source: if markers.is_empty() { "judgments" } else { "markers" },
        parameters,
    })
}

fn run_report(
    config: AppConfig,
    store: &JsonFileStore,
    job: &str,
    source: ReportSource,
    format: ReportFormat,
) -> Result<ExitCode> {
    let pipeline = ApneaPipeline::new(config)?;
    let envelope = require_envelope(store, job)?;

    let score = match source {
        ReportSource::Judgments => {
            let candidates = judged_candidates(store, job)?;
            pipeline.score_judgments(&envelope, &candidates)?
        }
        ReportSource::Explicit(threshold, multiplier) => {
            pipeline.score_with(&envelope, CalibrationParameters::new(threshold, multiplier)?)?
        }
        ReportSource::Baseline => {
            pipeline.score_with(&envelope, pipeline.baseline_parameters(&envelope)?)?
        }
        ReportSource::Stored => {
            let parameters = store.load_calibration(job)?.ok_or_else(|| {
                anyhow!("job {} has no stored calibration; run calibrate first", job)
            })?;
            pipeline.score_with(&envelope, parameters)?
        }
        ReportSource::Calibrate => {
            let candidates = judged_candidates(store, job)?;
            pipeline.score(&envelope, &candidates)?
        }
    };

    store.save_events(job, &score.events)?;
    match format {
        ReportFormat::Json => emit(&ReportPayload { job, score: &score }),
        ReportFormat::Csv => emit_csv(job, &score),
    }
}

fn run_jobs(store: &JsonFileStore) -> Result<ExitCode> {
    let jobs = store.list_jobs()?;
    emit(&JobsReport { jobs })
}

fn run_delete(store: &JsonFileStore, job: &str) -> Result<ExitCode> {
    if !store.delete_job(job)? {
        bail!("job {} does not exist", job);
    }
    emit(&DeleteReport { job, deleted: true })
}

fn require_envelope(store: &JsonFileStore, job: &str) -> Result<EnergyEnvelope> {
    store
        .load_envelope(job)?
        .ok_or_else(|| anyhow!("job {} has no envelope; run analyze first", job))
}

fn judged_candidates(store: &JsonFileStore, job: &str) -> Result<Vec<Candidate>> {
    let candidates = store.load_candidates(job)?;
    let judgments = store.load_judgments(job)?;
    Ok(apply_judgments(&candidates, &judgments))
}

fn candidate_views(candidates: &[Candidate], window_secs: f64) -> Vec<CandidateView<'_>> {
    candidates
        .iter()
        .map(|candidate| CandidateView {
            candidate,
            apnea_window: candidate.apnea_window(window_secs),
        })
        .collect()
}

fn emit<T: Serialize>(payload: &T) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(ExitCode::from(0))
}

/// Summary rows, a blank line, then one row per event
fn emit_csv(job: &str, score: &Score) -> Result<ExitCode> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "metric,value")?;
    writeln!(out, "job,{}", job)?;
    writeln!(out, "recording_hours,{}", score.summary.recording_hours)?;
    writeln!(out, "event_count,{}", score.summary.event_count)?;
    writeln!(out, "average_duration,{}", score.summary.average_duration)?;
    writeln!(out, "max_duration,{}", score.summary.max_duration)?;
    writeln!(out, "overall_ahi,{}", score.sas.overall_ahi)?;
    writeln!(out, "severity,{}", score.sas.severity.label())?;
    writeln!(out, "max_ahi,{}", score.sas.max_ahi)?;
    writeln!(out, "worst_window_start,{}", score.sas.worst_window.window_start)?;
    if let Some(parameters) = &score.parameters {
        writeln!(out, "silence_threshold,{}", parameters.silence_threshold)?;
        writeln!(out, "resume_multiplier,{}", parameters.resume_multiplier)?;
    }
    writeln!(out)?;
    writeln!(out, "start_time,end_time,duration,trough_rms")?;
    for event in &score.events {
        writeln!(
            out,
            "{},{},{},{}",
            event.start_time, event.end_time, event.duration, event.trough_rms
        )?;
    }
    out.flush()?;
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct CandidateView<'a> {
    #[serde(flatten)]
    candidate: &'a Candidate,
    apnea_window: TimeSpan,
}

#[derive(Serialize)]
struct SynthReport {
    output: String,
    sample_rate: u32,
    duration_secs: f64,
    pauses: Vec<TimeSpan>,
}

#[derive(Serialize)]
struct AnalyzeReport<'a> {
    job: &'a str,
    duration_secs: f64,
    hop_secs: f64,
    envelope_points: usize,
    peak_count: usize,
    candidates: Vec<CandidateView<'a>>,
}

#[derive(Serialize)]
struct EnvelopeReport<'a> {
    job: &'a str,
    hop_secs: f64,
    duration_secs: f64,
    statistics: Option<EnvelopeStatistics>,
    points: Vec<EnvelopePoint>,
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    job: &'a str,
    summary: JudgmentSummary,
}

#[derive(Serialize)]
struct ExpandReport<'a> {
    job: &'a str,
    statistics: JudgmentStatistics,
    band: (f64, f64),
    candidates: Vec<CandidateView<'a>>,
}

#[derive(Serialize)]
struct CalibrateReport<'a> {
    job: &'a str,
    source: &'static str,
    parameters: CalibrationParameters,
}

#[derive(Serialize)]
struct ReportPayload<'a> {
    job: &'a str,
    #[serde(flatten)]
    score: &'a Score,
}

#[derive(Serialize)]
struct JobsReport {
    jobs: Vec<String>,
}

#[derive(Serialize)]
struct DeleteReport<'a> {
    job: &'a str,
    deleted: bool,
}
