use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod analysis;
mod channel;
mod coverage;
mod db;
mod dispatch;
mod error;
mod ledger;
mod models;
mod normalize;
mod report;
mod roster;
mod store;
mod template;

use analysis::DEFAULT_ALERT_THRESHOLD;
use channel::SimulatedChannel;
use coverage::{AddOutcome, CoverageList};
use dispatch::BatchReport;
use ledger::HistoryLedger;
use models::Channel;
use normalize::{FileFormat, ParsedFile};
use store::{MemoryStore, StoreBackend};

#[derive(Parser)]
#[command(name = "member-health-alerts")]
#[command(about = "Member health file analysis and bulk notifications for insurance operators", long_about = None)]
struct Cli {
    /// Postgres instance holding notification history and the coverage list
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,
    /// Simulated provider latency for each message
    #[arg(long, env = "SEND_LATENCY_MS", default_value_t = 1000, global = true)]
    send_latency_ms: u64,
    /// Most-common-disease percentage that triggers a disease alert
    #[arg(long, env = "ALERT_THRESHOLD", default_value_t = DEFAULT_ALERT_THRESHOLD, global = true)]
    alert_threshold: f64,
    /// Sends kept in flight per batch
    #[arg(long, default_value_t = 1, global = true)]
    concurrency: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Analyze a member health file and alert the roster when a disease is prevalent
    Analyze {
        file: PathBuf,
        #[arg(long, value_enum)]
        format: Option<FileFormat>,
        /// Roster to alert when the threshold is met
        #[arg(long)]
        roster: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Channel::Sms)]
        channel: Channel,
        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a templated message to roster members
    Notify {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long, value_enum, default_value_t = Channel::Email)]
        channel: Channel,
        /// Built-in template key, or "custom" to use only --subject/--body
        #[arg(long, default_value = "coverage_notification")]
        template: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Member id to notify (repeatable); defaults to the whole roster
        #[arg(long = "member")]
        members: Vec<String>,
        /// Only notify members matching this search term
        #[arg(long, conflicts_with = "members")]
        search: Option<String>,
    },
    /// Show notifications, newest first
    History {
        /// Only show this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show notification statistics
    Stats,
    /// Delete all notification history
    ClearHistory,
    /// Manage the list of covered diseases
    Coverage {
        #[command(subcommand)]
        action: CoverageAction,
    },
    /// List and summarize roster members
    Roster {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        search: Option<String>,
    },
    /// List built-in templates for a channel
    Templates {
        #[arg(long, value_enum, default_value_t = Channel::Email)]
        channel: Channel,
    },
    /// Generate a markdown report for a member health file
    Report {
        file: PathBuf,
        #[arg(long, value_enum)]
        format: Option<FileFormat>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },
}

#[derive(Subcommand)]
enum CoverageAction {
    List,
    Add { name: String },
    Remove { id: i64 },
    Rename { id: i64, name: String },
    Check { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "member_health_alerts=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let database_url = cli.database_url.as_deref();
    let sender = SimulatedChannel::new(Duration::from_millis(cli.send_latency_ms));

    match cli.command {
        Commands::InitDb => {
            let pool = connect(database_url).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Analyze {
            file,
            format,
            roster,
            channel,
            json,
        } => {
            let parsed = read_member_file(&file, format)?;
            let analysis = analysis::analyze(parsed.records);

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis, parsed.skipped_rows);
            }

            let Some(roster_path) = roster else {
                if analysis::should_alert(&analysis, cli.alert_threshold) {
                    println!(
                        "Most common disease is at or above {:.1}%. Pass --roster to alert members.",
                        cli.alert_threshold
                    );
                }
                return Ok(());
            };

            let members = roster::load_roster(&roster_path)?;
            let ledger = open_ledger(database_url).await?;
            let Some(alert) = dispatch::alert_if_prevalent(
                &members,
                &analysis,
                cli.alert_threshold,
                channel,
                &sender,
                &ledger,
                cli.concurrency,
            )
            .await?
            else {
                return Ok(());
            };
            println!(
                "Disease alert for {} ({:.1}%):",
                alert.disease.disease, alert.disease.percentage
            );
            print_batch(&alert.batch);
        }
        Commands::Notify {
            roster,
            channel,
            template,
            subject,
            body,
            members,
            search,
        } => {
            let roster_members = roster::load_roster(&roster)?;
            let recipients = if !members.is_empty() {
                let (selected, missing) = roster::select(&roster_members, &members);
                if !missing.is_empty() {
                    tracing::warn!(?missing, "member ids not found in roster");
                }
                selected
            } else if let Some(term) = search.as_deref() {
                roster::search(&roster_members, term).into_iter().cloned().collect()
            } else {
                roster_members
            };

            if recipients.is_empty() {
                println!("No matching members to notify.");
                return Ok(());
            }

            let base = if template == "custom" {
                template::Template {
                    subject: None,
                    body: String::new(),
                }
            } else {
                template::builtin(channel, &template)?
            };
            let template =
                template::with_overrides(base, channel, subject.as_deref(), body.as_deref())?;

            let ledger = open_ledger(database_url).await?;
            let batch = if cli.concurrency > 1 {
                dispatch::dispatch_bulk_buffered(
                    &recipients,
                    &template,
                    channel,
                    &sender,
                    &ledger,
                    cli.concurrency,
                )
                .await?
            } else {
                dispatch::dispatch_bulk(&recipients, &template, channel, &sender, &ledger).await?
            };
            print_batch(&batch);
        }
        Commands::History { limit } => {
            let ledger = open_ledger(database_url).await?;
            let recent = match limit {
                Some(limit) => ledger.recent(limit).await,
                None => ledger.all().await.into_iter().rev().collect(),
            };
            if recent.is_empty() {
                println!("No notifications recorded.");
                return Ok(());
            }
            for record in recent.iter() {
                println!(
                    "- [{}] {} {} to {}: {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.channel,
                    record.status.as_str(),
                    record.to,
                    record.subject.as_deref().unwrap_or(&record.content)
                );
            }
        }
        Commands::Stats => {
            let ledger = open_ledger(database_url).await?;
            let stats = ledger.stats().await;
            println!(
                "Notifications: {} total, {} today, {} sent, {} failed, {} email, {} SMS",
                stats.total, stats.today, stats.successful, stats.failed, stats.emails, stats.sms
            );
        }
        Commands::ClearHistory => {
            let ledger = open_ledger(database_url).await?;
            ledger.clear().await?;
            println!("Notification history cleared.");
        }
        Commands::Coverage { action } => {
            let store = open_store(database_url).await?;
            let coverage = CoverageList::new(&store);
            match action {
                CoverageAction::List => {
                    for disease in coverage.load().await? {
                        println!(
                            "- {} {} (added {})",
                            disease.id,
                            disease.name,
                            disease.added_date.format("%Y-%m-%d")
                        );
                    }
                }
                CoverageAction::Add { name } => match coverage.add(&name).await? {
                    AddOutcome::Added(disease) => {
                        println!("\"{}\" has been added to disease coverage.", disease.name)
                    }
                    AddOutcome::AlreadyCovered(disease) => {
                        println!("\"{}\" is already on the coverage list.", disease.name)
                    }
                },
                CoverageAction::Remove { id } => {
                    let removed = coverage.remove(id).await?;
                    println!("\"{}\" removed from coverage.", removed.name);
                }
                CoverageAction::Rename { id, name } => {
                    let renamed = coverage.rename(id, &name).await?;
                    println!("Coverage {} renamed to \"{}\".", renamed.id, renamed.name);
                }
                CoverageAction::Check { name } => {
                    if coverage.is_covered(&name).await? {
                        println!("\"{}\" is covered.", name.trim());
                    } else {
                        println!("\"{}\" is not on the coverage list.", name.trim());
                    }
                }
            }
        }
        Commands::Roster { roster, search } => {
            let members = roster::load_roster(&roster)?;
            let shown: Vec<&models::Member> = match search.as_deref() {
                Some(term) => roster::search(&members, term),
                None => members.iter().collect(),
            };
            for member in shown.iter() {
                println!(
                    "- {} {} ({}, {}) policy {} [{}]",
                    member.id,
                    member.name,
                    member.email,
                    member.phone,
                    member.policy_number,
                    member.status
                );
            }
            let summary = roster::summary(&members);
            println!(
                "{} members: {} active, {} pending, premium total {:.2} (avg {:.0})",
                summary.total,
                summary.active,
                summary.pending,
                summary.total_premium,
                summary.avg_premium
            );
        }
        Commands::Templates { channel } => {
            for key in template::builtin_keys(channel) {
                let template = template::builtin(channel, key)?;
                println!("## {key}");
                if let Some(subject) = &template.subject {
                    println!("Subject: {subject}");
                }
                println!("{}\n", template.body);
            }
        }
        Commands::Report {
            file,
            format,
            out,
            recent,
        } => {
            let parsed = read_member_file(&file, format)?;
            let analysis = analysis::analyze(parsed.records);

            let store = open_store(database_url).await?;
            let covered = CoverageList::new(&store).load().await?;
            let ledger = HistoryLedger::open(store).await?;
            let stats = ledger.stats().await;
            let recent = ledger.recent(recent).await;

            let source = file.display().to_string();
            let report = report::build_report(&report::ReportInput {
                source: &source,
                analysis: &analysis,
                skipped_rows: parsed.skipped_rows,
                coverage: &covered,
                stats: &stats,
                recent: &recent,
                alert_threshold: cli.alert_threshold,
            });
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url = database_url
        .context("DATABASE_URL must be set to a Postgres instance for history and coverage")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(database_url: Option<&str>) -> anyhow::Result<StoreBackend> {
    match database_url {
        Some(url) => Ok(StoreBackend::Postgres(db::PgStore::new(connect(Some(url)).await?))),
        None => {
            tracing::warn!("DATABASE_URL is not set; history and coverage changes last for this run only");
            Ok(StoreBackend::Memory(MemoryStore::new()))
        }
    }
}

async fn open_ledger(database_url: Option<&str>) -> anyhow::Result<HistoryLedger<StoreBackend>> {
    let store = open_store(database_url).await?;
    HistoryLedger::open(store)
        .await
        .context("failed to load notification history")
}

fn read_member_file(path: &Path, format: Option<FileFormat>) -> anyhow::Result<ParsedFile> {
    let format = match format {
        Some(format) => format,
        None => FileFormat::from_path(path)?,
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    normalize::parse(&text, format).with_context(|| format!("could not analyze {}", path.display()))
}

fn print_analysis(analysis: &models::AnalysisResult, skipped_rows: usize) {
    println!(
        "{} members, {} distinct diseases.",
        analysis.total_members, analysis.unique_diseases
    );
    if skipped_rows > 0 {
        println!("Skipped {skipped_rows} rows with missing fields.");
    }

    if analysis.disease_distribution.is_empty() {
        println!("No diseases reported.");
        return;
    }

    println!("Diseases by prevalence:");
    for entry in analysis.disease_distribution.iter() {
        println!("- {}: {} members ({:.1}%)", entry.disease, entry.count, entry.percentage);
    }
}

fn print_batch(batch: &BatchReport) {
    println!(
        "Batch {} over {}: {} sent, {} failed.",
        batch.batch_id,
        batch.channel,
        batch.total_sent(),
        batch.total_failed()
    );
    for outcome in batch.outcomes.iter().filter(|o| !o.success) {
        println!(
            "- {} ({}): {}",
            outcome.recipient.name,
            outcome.recipient.id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
