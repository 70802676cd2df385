//! `roomctl` — run room-engine operations against a JSON snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Effective occurrences of a series in January
//! roomctl --snapshot data.json occurrences --series s1 \
//!     --from 2025-01-01T00:00:00Z --to 2025-02-01T00:00:00Z
//!
//! # Would this booking conflict, or break the room's rules?
//! roomctl --snapshot data.json check --room a \
//!     --start 2025-01-06T10:00:00Z --end 2025-01-06T11:00:00Z \
//!     --attendees 6 --equipment projector
//!
//! # How a series is going
//! roomctl --snapshot data.json stats --series s1 \
//!     --from 2025-01-01T00:00:00Z --to 2025-02-01T00:00:00Z
//!
//! # Free time and ranked suggestions
//! roomctl --snapshot data.json availability --room a \
//!     --from 2025-01-06T00:00:00Z --to 2025-01-07T00:00:00Z
//! roomctl --snapshot data.json suggest --user alice --date 2025-01-06 \
//!     --algorithms time-preference,usage-pattern
//!
//! # Pause a series and write the snapshot back
//! roomctl --snapshot data.json batch --series s1 --op pause
//! ```
//!
//! Results are printed as pretty JSON on stdout (or `--output`); logs go to
//! stderr, filtered by `RUST_LOG` or `--log-level`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use room_engine::store::InMemoryStore;
use room_engine::conflict::ConflictOptions;
use room_engine::{Algorithm, BatchOperation, EngineConfig, Interval, Scheduler, Snapshot};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "roomctl",
    version,
    about = "Room reservation engine: occurrences, conflicts, availability and suggestions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON snapshot of rooms, reservations, series, exceptions and preferences
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// TOML engine configuration (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "room_engine=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output file (writes to stdout if omitted)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a stored series' recurrence pattern
    Validate {
        #[arg(long)]
        series: String,
    },
    /// Effective occurrences of a series starting in [from, to)
    Occurrences {
        #[arg(long)]
        series: String,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
        /// Maximum number of occurrences (the configured safety cap still applies)
        #[arg(long)]
        max: Option<usize>,
    },
    /// Check a one-off booking (--room) or a whole series (--series) for conflicts
    Check {
        #[arg(long, conflicts_with = "series", required_unless_present = "series")]
        room: Option<String>,
        #[arg(long)]
        series: Option<String>,
        /// Candidate start (with --room)
        #[arg(long, requires = "room")]
        start: Option<DateTime<Utc>>,
        /// Candidate end (with --room)
        #[arg(long, requires = "room")]
        end: Option<DateTime<Utc>>,
        /// Reservation to ignore, e.g. the one being rescheduled
        #[arg(long, requires = "room")]
        exclude: Option<String>,
        /// Expected head count (with --room)
        #[arg(long, requires = "room")]
        attendees: Option<u32>,
        /// Comma-separated equipment the booking needs (with --room)
        #[arg(long, value_delimiter = ',', requires = "room")]
        equipment: Vec<String>,
        /// Window start (with --series)
        #[arg(long, requires = "series")]
        from: Option<DateTime<Utc>>,
        /// Window end (with --series)
        #[arg(long, requires = "series")]
        to: Option<DateTime<Utc>>,
    },
    /// Occurrence counts of a series in [from, to) and its next occurrence
    Stats {
        #[arg(long)]
        series: String,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
        /// Reference instant for the next occurrence (defaults to now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Free slots of a room in [from, to)
    Availability {
        #[arg(long)]
        room: String,
        #[arg(long)]
        from: DateTime<Utc>,
        #[arg(long)]
        to: DateTime<Utc>,
    },
    /// Ranked room/slot suggestions for a user on a day
    Suggest {
        #[arg(long)]
        user: String,
        /// Local day, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Comma-separated room ids (all rooms if omitted)
        #[arg(long, value_delimiter = ',')]
        rooms: Vec<String>,
        /// Comma-separated scoring algorithms (usage-pattern,equipment-match if omitted)
        #[arg(long, value_delimiter = ',')]
        algorithms: Vec<Algorithm>,
        #[arg(long, default_value_t = 5)]
        max: usize,
    },
    /// Pause, resume or cancel a series and write the updated snapshot
    Batch {
        #[arg(long)]
        series: String,
        #[arg(long, value_enum)]
        op: BatchOp,
        /// Cancel only reservations starting at or after this instant
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Where to write the updated snapshot (defaults to --snapshot)
        #[arg(long)]
        save_to: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BatchOp {
    Pause,
    Resume,
    Cancel,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let Some(snapshot_path) = cli.snapshot.as_deref() else {
        bail!("No snapshot given. Pass --snapshot <file>.");
    };
    let mut store = load_store(snapshot_path)?;

    let result = match cli.command {
        Commands::Batch {
            series,
            op,
            from,
            save_to,
        } => {
            let op = batch_operation(op, from)?;
            let outcome = store
                .apply_batch(&series, op)
                .with_context(|| format!("Failed to apply batch operation to series '{}'", series))?;
            let target = save_to.as_deref().unwrap_or(snapshot_path);
            save_store(&store, target)?;
            info!(series = %series, affected = outcome.affected(), "batch applied");
            serde_json::to_value(outcome)?
        }
        command => {
            let scheduler = Scheduler::from_store(&store, config);
            run(&scheduler, command)?
        }
    };

    let pretty = serde_json::to_string_pretty(&result)?;
    write_output(cli.output.as_deref(), &pretty)
}

/// Run a read-only command and return its JSON result.
fn run(scheduler: &Scheduler<'_>, command: Commands) -> Result<Value> {
    let value = match command {
        Commands::Validate { series } => {
            let report = scheduler
                .validate_pattern(&series)
                .with_context(|| format!("Failed to validate series '{}'", series))?;
            serde_json::to_value(report)?
        }
        Commands::Occurrences {
            series,
            from,
            to,
            max,
        } => {
            let occurrences = scheduler
                .occurrences(&series, from, to, max)
                .with_context(|| format!("Failed to expand series '{}'", series))?;
            debug!(series = %series, count = occurrences.len(), "expanded");
            serde_json::to_value(occurrences)?
        }
        Commands::Check {
            room,
            series,
            start,
            end,
            exclude,
            attendees,
            equipment,
            from,
            to,
        } => {
            let report = match (room, series) {
                (Some(room), _) => {
                    let start = start.context("--start is required with --room")?;
                    let end = end.context("--end is required with --room")?;
                    let candidate = Interval::new(start, end).context("Invalid candidate interval")?;
                    let options = ConflictOptions {
                        exclude_reservation_id: exclude.as_deref(),
                        attendees,
                        required_equipment: &equipment,
                        ..ConflictOptions::default()
                    };
                    scheduler
                        .check_booking(&room, &[candidate], &options)
                        .with_context(|| format!("Failed to check room '{}'", room))?
                }
                (None, Some(series)) => {
                    let from = from.context("--from is required with --series")?;
                    let to = to.context("--to is required with --series")?;
                    scheduler
                        .check_series_conflict(&series, from, to)
                        .with_context(|| format!("Failed to check series '{}'", series))?
                }
                (None, None) => bail!("Pass either --room or --series"),
            };
            serde_json::to_value(report)?
        }
        Commands::Stats {
            series,
            from,
            to,
            now,
        } => {
            let stats = scheduler
                .series_statistics(&series, from, to, now.unwrap_or_else(Utc::now))
                .with_context(|| format!("Failed to compute statistics of series '{}'", series))?;
            serde_json::to_value(stats)?
        }
        Commands::Availability { room, from, to } => {
            let availability = scheduler
                .availability(&room, from, to)
                .with_context(|| format!("Failed to compute availability of room '{}'", room))?;
            serde_json::to_value(availability)?
        }
        Commands::Suggest {
            user,
            date,
            rooms,
            algorithms,
            max,
        } => {
            let suggestions = scheduler
                .suggest(&user, date, &rooms, &algorithms, max)
                .with_context(|| format!("Failed to rank suggestions for '{}'", user))?;
            serde_json::to_value(suggestions)?
        }
        Commands::Batch { .. } => bail!("batch needs write access to the snapshot"),
    };
    Ok(value)
}

fn batch_operation(op: BatchOp, from: Option<DateTime<Utc>>) -> Result<BatchOperation> {
    Ok(match op {
        BatchOp::Cancel => BatchOperation::Cancel { from },
        _ if from.is_some() => bail!("--from only applies to --op cancel"),
        BatchOp::Pause => BatchOperation::Pause,
        BatchOp::Resume => BatchOperation::Resume,
    })
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level: '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_store(path: &Path) -> Result<InMemoryStore> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let snapshot = Snapshot::from_json_str(&raw)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;
    Ok(InMemoryStore::from_snapshot(snapshot))
}

fn save_store(store: &InMemoryStore, path: &Path) -> Result<()> {
    let json = store.snapshot().to_json_pretty()?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
