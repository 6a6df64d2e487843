//! Posture CLI - Command-line interface for the posture monitor
//!
//! Commands:
//! - classify: Classify recorded poses (batch mode)
//! - replay: Run a timestamped frame stream through the full monitor
//! - history: List stored snapshots
//! - prune: Drop snapshots past the retention window
//! - config: Print the effective configuration
//! - doctor: Diagnose configuration and storage health

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use posture_monitor::keypoints::{parse_frames_ndjson, PoseFrame};
use posture_monitor::monitor::NoThumbnail;
use posture_monitor::types::{PostureSignals, StoredRecord};
use posture_monitor::{
    JsonlRecordStore, MemoryRecordStore, MonitorConfig, MonitorError, Pose, PoseSource,
    PostureClassifier, PostureMonitor, RecordStore, Verdict, MONITOR_VERSION, PRODUCER_NAME,
};

/// Posture - keypoint-based sitting posture monitor
#[derive(Parser)]
#[command(name = "posture")]
#[command(version = MONITOR_VERSION)]
#[command(about = "Classify sitting posture from pose keypoints", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify poses without debouncing (batch mode)
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Include intermediate signals in the output
        #[arg(long)]
        signals: bool,
    },

    /// Replay timestamped frames through the monitor (streaming mode)
    Replay {
        /// Frames file, one {"timestamp", "pose"} object per line (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Snapshot store (NDJSON); snapshots are kept in memory when omitted
        #[arg(long)]
        store: Option<PathBuf>,

        /// Report every frame instead of only visible changes and captures
        #[arg(long)]
        all_frames: bool,

        /// Do not start periodic captures
        #[arg(long)]
        no_capture: bool,

        /// Buffer output instead of flushing after each frame
        #[arg(long)]
        no_flush: bool,
    },

    /// List stored snapshots, newest first
    History {
        /// Snapshot store (NDJSON)
        #[arg(long)]
        store: PathBuf,

        /// Maximum number of records (defaults to the configured history limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove snapshots older than the retention window
    Prune {
        /// Snapshot store (NDJSON)
        #[arg(long)]
        store: PathBuf,

        /// Override the configured retention window
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Print the effective configuration as JSON
    Config,

    /// Diagnose configuration and storage health
    Doctor {
        /// Snapshot store to check
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one pose or null per line)
    Ndjson,
    /// JSON array of poses
    Json,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PostureCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Classify {
            input,
            input_format,
            signals,
        } => cmd_classify(&load_config(config_path)?, &input, input_format, signals),

        Commands::Replay {
            input,
            store,
            all_frames,
            no_capture,
            no_flush,
        } => {
            let config = load_config(config_path)?;
            let frames = parse_frames_ndjson(&read_input(&input)?)?;
            if frames.is_empty() {
                return Err(PostureCliError::NoFrames);
            }
            let options = ReplayOptions {
                all_frames,
                capture: !no_capture,
                flush: !no_flush,
            };
            match store {
                Some(path) => cmd_replay(config, JsonlRecordStore::open(path), frames, &options),
                None => cmd_replay(config, MemoryRecordStore::new(), frames, &options),
            }
        }

        Commands::History { store, limit, json } => {
            cmd_history(&load_config(config_path)?, &store, limit, json)
        }

        Commands::Prune {
            store,
            retention_days,
        } => cmd_prune(load_config(config_path)?, &store, retention_days),

        Commands::Config => {
            println!("{}", load_config(config_path)?.to_json()?);
            Ok(())
        }

        // Doctor inspects the config file itself rather than failing on it
        Commands::Doctor { store, json } => cmd_doctor(config_path, store.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, PostureCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::load(path)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, PostureCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_classify(
    config: &MonitorConfig,
    input: &Path,
    input_format: InputFormat,
    include_signals: bool,
) -> Result<(), PostureCliError> {
    let input_data = read_input(input)?;

    let poses: Vec<Option<Pose>> = match input_format {
        InputFormat::Ndjson => input_data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<Option<Pose>>)
            .collect::<Result<_, _>>()?,
        InputFormat::Json => serde_json::from_str(&input_data)?,
    };

    if poses.is_empty() {
        return Err(PostureCliError::NoFrames);
    }

    let classifier = PostureClassifier::new(config.thresholds.clone());
    let mut stdout = io::stdout();

    for (index, pose) in poses.iter().enumerate() {
        let verdict = classifier.classify(pose.as_ref());
        let signals = if include_signals {
            pose.as_ref().and_then(|p| classifier.analyze(p))
        } else {
            None
        };

        let line = ClassifyOutput {
            index,
            verdict,
            label: verdict.label(),
            signals,
        };
        writeln!(stdout, "{}", serde_json::to_string(&line)?)?;
    }

    Ok(())
}

struct ReplayOptions {
    all_frames: bool,
    capture: bool,
    flush: bool,
}

/// Feeds recorded frames to the monitor in order
struct ReplaySource {
    frames: VecDeque<PoseFrame>,
}

impl ReplaySource {
    fn next_timestamp(&self) -> Option<DateTime<Utc>> {
        self.frames.front().map(|frame| frame.timestamp)
    }
}

impl PoseSource for ReplaySource {
    fn next_pose(&mut self) -> Result<Option<Pose>, MonitorError> {
        Ok(self.frames.pop_front().and_then(|frame| frame.pose))
    }
}

fn cmd_replay<S: RecordStore>(
    config: MonitorConfig,
    store: S,
    frames: Vec<PoseFrame>,
    options: &ReplayOptions,
) -> Result<(), PostureCliError> {
    let mut monitor = PostureMonitor::new(config, store)?;
    let mut source = ReplaySource {
        frames: frames.into(),
    };
    let mut stdout = io::stdout();

    if options.capture {
        if let Some(start) = source.next_timestamp() {
            monitor.start_capture(start);
        }
    }

    while let Some(timestamp) = source.next_timestamp() {
        let outcome = monitor.tick(&mut source, &mut NoThumbnail, timestamp)?;

        if options.all_frames || outcome.frame.changed {
            let event = ReplayEvent::Status {
                timestamp,
                verdict: outcome.frame.verdict,
                visible: outcome.frame.visible,
                changed: outcome.frame.changed,
                label: outcome.frame.label,
            };
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        }

        if let Some(record) = outcome.captured {
            let event = ReplayEvent::Capture {
                timestamp,
                id: record.id.to_string(),
                verdict: record.verdict,
            };
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        }

        if options.flush {
            stdout.flush()?;
        }
    }

    monitor.stop_capture();
    stdout.flush()?;
    Ok(())
}

fn cmd_history(
    config: &MonitorConfig,
    store_path: &Path,
    limit: Option<usize>,
    json: bool,
) -> Result<(), PostureCliError> {
    let store = JsonlRecordStore::open(store_path);
    let records = store.recent(limit.unwrap_or(config.capture.history_limit))?;

    if json {
        let summaries: Vec<HistoryEntry> = records.iter().map(HistoryEntry::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!("Posture History");
        println!("===============");
        if records.is_empty() {
            println!("No records.");
        }
        for record in &records {
            println!(
                "  {}  {:<22} {}",
                record.timestamp.to_rfc3339(),
                record.verdict.as_str(),
                record.verdict.label()
            );
        }
    }

    Ok(())
}

fn cmd_prune(
    mut config: MonitorConfig,
    store_path: &Path,
    retention_days: Option<u32>,
) -> Result<(), PostureCliError> {
    if let Some(days) = retention_days {
        config.capture.retention_days = days;
    }

    let mut monitor = PostureMonitor::new(config, JsonlRecordStore::open(store_path))?;
    let removed = monitor.prune(Utc::now())?;

    println!("{}", serde_json::json!({ "removed": removed }));
    Ok(())
}

fn cmd_doctor(
    config_path: Option<&Path>,
    store: Option<&Path>,
    json: bool,
) -> Result<(), PostureCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("posture-monitor version {}", MONITOR_VERSION),
    });

    // Check config file if provided
    match config_path {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Config file {} does not exist", path.display()),
        }),
        Some(path) => match MonitorConfig::load(path) {
            Ok(_) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "Config file valid".to_string(),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", e),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
    }

    // Check snapshot store if provided
    if let Some(store_path) = store {
        if store_path.exists() {
            match JsonlRecordStore::open(store_path).len() {
                Ok(count) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Snapshot store readable ({} records)", count),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Snapshot store unreadable: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Snapshot store does not exist yet".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: MONITOR_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Posture Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PostureCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum PostureCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
}

impl From<io::Error> for PostureCliError {
    fn from(e: io::Error) -> Self {
        PostureCliError::Io(e)
    }
}

impl From<MonitorError> for PostureCliError {
    fn from(e: MonitorError) -> Self {
        PostureCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for PostureCliError {
    fn from(e: serde_json::Error) -> Self {
        PostureCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PostureCliError> for CliError {
    fn from(e: PostureCliError) -> Self {
        match e {
            PostureCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PostureCliError::Monitor(MonitorError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'posture config' to see the default values".to_string()),
            },
            PostureCliError::Monitor(e) => CliError {
                code: "MONITOR_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input poses use the estimator's keypoint format".to_string()),
            },
            PostureCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PostureCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No poses or frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PostureCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ClassifyOutput {
    index: usize,
    verdict: Verdict,
    label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signals: Option<PostureSignals>,
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent {
    Status {
        timestamp: DateTime<Utc>,
        verdict: Verdict,
        visible: Verdict,
        changed: bool,
        label: String,
    },
    Capture {
        timestamp: DateTime<Utc>,
        id: String,
        verdict: Verdict,
    },
}

#[derive(serde::Serialize)]
struct HistoryEntry {
    id: String,
    timestamp: DateTime<Utc>,
    verdict: Verdict,
    keypoints: usize,
    thumbnail_bytes: usize,
}

impl From<&StoredRecord> for HistoryEntry {
    fn from(record: &StoredRecord) -> Self {
        HistoryEntry {
            id: record.id.to_string(),
            timestamp: record.timestamp,
            verdict: record.verdict,
            keypoints: record.keypoints.iter().flatten().count(),
            thumbnail_bytes: record.thumbnail.len(),
        }
    }
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_doctor_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let cli = parse(&["posture", "--config", missing.to_str().unwrap(), "doctor", "--json"]);

        assert!(matches!(run(cli), Err(PostureCliError::DoctorFailed)));
    }

    #[test]
    fn test_doctor_reports_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"capture": {"interval_secs": 0}}"#).unwrap();
        let cli = parse(&["posture", "--config", path.to_str().unwrap(), "doctor", "--json"]);

        assert!(matches!(run(cli), Err(PostureCliError::DoctorFailed)));
    }

    #[test]
    fn test_other_commands_still_fail_on_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let cli = parse(&["posture", "--config", missing.to_str().unwrap(), "config"]);

        assert!(matches!(
            run(cli),
            Err(PostureCliError::Monitor(MonitorError::Io(_)))
        ));
    }

    #[test]
    fn test_replay_flushes_unless_disabled() {
        let cli = parse(&["posture", "replay", "--input", "frames.ndjson"]);
        assert!(matches!(cli.command, Commands::Replay { no_flush: false, .. }));

        let cli = parse(&["posture", "replay", "--input", "frames.ndjson", "--no-flush"]);
        assert!(matches!(cli.command, Commands::Replay { no_flush: true, .. }));
    }

    #[test]
    fn test_prune_rejects_oversized_retention() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("history.jsonl");
        let cli = parse(&[
            "posture",
            "prune",
            "--store",
            store.to_str().unwrap(),
            "--retention-days",
            "4000000000",
        ]);

        assert!(matches!(
            run(cli),
            Err(PostureCliError::Monitor(MonitorError::InvalidConfig(_)))
        ));
    }
}
