use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use rollcall_core::Embedding;
use rollcall_store::Status;
use rollcalld::{AttendanceService, Config};

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    /// Database path (defaults to ROLLCALL_DB_PATH or the XDG data dir).
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an identity from embedding files (JSON arrays of floats)
    Enroll {
        identity: String,
        /// One file per captured image
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// Compare a probe embedding against the gallery
    Recognize { probe: PathBuf },
    /// Recognize a probe and mark today's attendance
    Mark { probe: PathBuf },
    /// Mark every known identity without a record as absent
    Sweep {
        /// Date to sweep (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Administratively set an identity's status for a date
    SetStatus {
        identity: String,
        status: Status,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Time in (HH:MM:SS); ignored for absent
        #[arg(long)]
        time_in: Option<NaiveTime>,
    },
    /// List enrolled identities
    List,
    /// Remove an identity's template
    Remove { identity: String },
    /// Show a day's attendance records
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show one identity's attendance history and tallies
    History { identity: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let service = AttendanceService::open(&config)?;

    match cli.command {
        Commands::Enroll { identity, samples } => {
            let embeddings = samples
                .iter()
                .map(|path| read_embedding(path))
                .collect::<Result<Vec<_>>>()?;
            let template = service.enroll(&identity, &embeddings)?;
            println!(
                "Enrolled {} from {} samples ({}-dim template)",
                template.identity_id,
                template.sample_count,
                template.vector.dim()
            );
        }
        Commands::Recognize { probe } => {
            let verdict = service.recognize(&read_embedding(&probe)?);
            print_verdict(&verdict);
        }
        Commands::Mark { probe } => {
            let verdict = service.recognize(&read_embedding(&probe)?);
            print_verdict(&verdict);
            let record = service.mark_attendance(&verdict, Local::now().naive_local())?;
            println!(
                "Marked {} {} for {} (time in {})",
                record.identity_id,
                record.status,
                record.date,
                record
                    .time_in
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".into())
            );
        }
        Commands::Sweep { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let created = service.sweep_absences(date, &service.enrolled_identities())?;
            println!("Marked {created} identities absent for {date}");
        }
        Commands::SetStatus {
            identity,
            status,
            date,
            time_in,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let record = service.admin_set_status(&identity, date, status, time_in)?;
            println!("Set {} to {} for {}", record.identity_id, record.status, record.date);
        }
        Commands::List => {
            let templates = service.templates();
            if templates.is_empty() {
                println!("No identities enrolled");
            }
            for template in templates {
                println!(
                    "{}  samples={}  dim={}  enrolled={}",
                    template.identity_id,
                    template.sample_count,
                    template.vector.dim(),
                    template.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Remove { identity } => {
            if service.remove_identity(&identity)? {
                println!("Removed {identity}");
            } else {
                println!("{identity} was not enrolled");
            }
        }
        Commands::Report { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let records = service.attendance_on(date)?;
            if records.is_empty() {
                println!("No records for {date}");
            }
            for record in records {
                println!(
                    "{}  {}  {}",
                    record.identity_id,
                    record.status,
                    record
                        .time_in
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".into())
                );
            }
        }
        Commands::History { identity } => {
            for record in service.attendance_for(&identity)? {
                println!(
                    "{}  {}  {}",
                    record.date,
                    record.status,
                    record
                        .time_in
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".into())
                );
            }
            let summary = service.summary_for(&identity)?;
            println!(
                "present={} absent={} total={}",
                summary.present, summary.absent, summary.total
            );
        }
    }

    Ok(())
}

/// Read one embedding from a JSON array of floats.
fn read_embedding(path: &Path) -> Result<Embedding> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading embedding file {}", path.display()))?;
    let values: Vec<f32> = serde_json::from_str(&data)
        .with_context(|| format!("parsing embedding file {}", path.display()))?;
    Ok(Embedding::new(values))
}

fn print_verdict(verdict: &rollcall_core::MatchVerdict) {
    if verdict.matched {
        println!(
            "Matched {} (distance {:.3}, confidence {:.1}%)",
            verdict.identity_id.as_deref().unwrap_or("?"),
            verdict.distance,
            verdict.confidence
        );
    } else {
        println!(
            "No match (best distance {:.3}, confidence {:.1}%)",
            verdict.distance, verdict.confidence
        );
    }
}
