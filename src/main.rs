mod ai;
mod apply;
mod auth;
mod browser;
mod config;
mod db;
mod error;
#[cfg(test)]
mod fake;
mod letter;
mod models;
mod pipeline;
mod postings;
mod resume;
mod search;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth::Credentials;
use browser::WebDriverSession;
use config::Config;
use db::Database;
use letter::LetterWriter;
use models::{ApplicationStatus, RunSummary};
use pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "autoapply")]
#[command(about = "Apply to job postings automatically and keep a record of every attempt")]
struct Cli {
    /// Path to config file (default: ~/.config/autoapply/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show stage-by-stage progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the application ledger
    Init,

    /// Log in, search, and apply to every matching posting
    Run {
        /// Search keywords (overrides config)
        #[arg(short, long)]
        keywords: Option<String>,

        /// Search location (overrides config)
        #[arg(short, long)]
        location: Option<String>,

        /// Path to resume file, PDF or text (overrides config)
        #[arg(short, long)]
        resume: Option<PathBuf>,

        /// Model used for cover letters (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Apply to at most this many postings
        #[arg(long)]
        limit: Option<usize>,

        /// Go through every step but never press submit
        #[arg(long)]
        dry_run: bool,
    },

    /// List recorded application attempts
    List {
        /// Filter by status (submitted, failed, skipped)
        #[arg(short, long)]
        status: Option<String>,

        /// Number of records to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one recorded attempt
    Show {
        /// Record ID
        id: i64,
    },

    /// Show totals by status
    Stats,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose { "autoapply=debug" } else { "autoapply=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let db = Database::open(config.ledger.path.as_deref())?;
            println!("Ledger initialized at {}", db.path().display());
        }

        Commands::Run {
            keywords,
            location,
            resume,
            model,
            limit,
            dry_run,
        } => {
            if let Some(k) = keywords {
                config.search.keywords = k;
            }
            if let Some(l) = location {
                config.search.location = l;
            }
            if let Some(r) = resume {
                config.resume_path = Some(r);
            }
            if let Some(m) = model {
                config.llm.model = m;
            }
            config.pipeline.dry_run = dry_run;

            let summary = run(&config, limit)?;

            println!("\nResults:");
            println!("  Submitted: {}", summary.submitted);
            println!("  Failed:    {}", summary.failed);
            println!("  Skipped:   {}", summary.skipped);
            if summary.ledger_errors > 0 {
                println!("  Not recorded (ledger errors): {}", summary.ledger_errors);
            }
            if dry_run {
                println!("\n(Dry run - no applications were actually submitted)");
            }
        }

        Commands::List { status, limit, json } => {
            let db = Database::open(config.ledger.path.as_deref())?;
            let status = status
                .map(|s| {
                    ApplicationStatus::parse(&s)
                        .ok_or_else(|| anyhow!("Unknown status '{}'. Use submitted, failed, or skipped", s))
                })
                .transpose()?;
            let records = db.list(status, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<6} {:<10} {:<30} {:<20} {:<19}",
                    "ID", "STATUS", "TITLE", "COMPANY", "DATE"
                );
                println!("{}", "-".repeat(89));
                for record in records {
                    println!(
                        "{:<6} {:<10} {:<30} {:<20} {:<19}",
                        record.id,
                        record.status,
                        truncate(record.job_title.as_deref().unwrap_or("-"), 28),
                        truncate(record.company_name.as_deref().unwrap_or("-"), 18),
                        record.submitted_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        Commands::Show { id } => {
            let db = Database::open(config.ledger.path.as_deref())?;
            match db.get(id)? {
                Some(record) => {
                    println!("Application #{}", record.id);
                    println!("Title: {}", record.job_title.as_deref().unwrap_or("(unknown)"));
                    println!("Company: {}", record.company_name.as_deref().unwrap_or("(unknown)"));
                    println!("Status: {}", record.status);
                    println!("Date: {}", record.submitted_at.format("%Y-%m-%d %H:%M:%S"));
                    println!("Link: {}", record.job_link);
                }
                None => {
                    println!("Application #{} not found.", id);
                }
            }
        }

        Commands::Stats => {
            let db = Database::open(config.ledger.path.as_deref())?;
            let counts = db.counts_by_status()?;
            let mut total = 0;
            for status in ApplicationStatus::ALL {
                let count = counts.get(&status).copied().unwrap_or(0);
                total += count;
                println!("  {:<10} {}", format!("{}:", status), count);
            }
            println!("  {:<10} {}", "Total:", total);
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Everything before the browser opens fails fast; after that, the session is
/// always closed before returning.
fn run(config: &Config, limit: Option<usize>) -> Result<RunSummary> {
    let credentials = Credentials::from_env()?;

    let resume_text = match &config.resume_path {
        Some(path) => resume::extract_text(path),
        None => {
            warn!("No resume configured; cover letters will be generic");
            String::new()
        }
    };

    let spec = ai::resolve_model(&config.llm.model)?;
    info!("Writing cover letters with {} ({})", spec.short_name, spec.model_id);
    let provider = ai::create_provider(&spec, std::time::Duration::from_secs(config.llm.timeout_secs))?;
    let writer = LetterWriter::new(provider.as_ref(), &config.llm);

    let db = Database::open(config.ledger.path.as_deref())?;
    info!("Recording applications in {}", db.path().display());

    let mut session = WebDriverSession::connect(&config.browser, config.timeouts.poll_interval())?;
    let result = apply_all(&mut session, &credentials, &db, &writer, config, &resume_text, limit);

    if let Err(e) = session.quit() {
        warn!("{:#}", e);
    }
    result
}

fn apply_all(
    session: &mut WebDriverSession,
    credentials: &Credentials,
    db: &Database,
    writer: &LetterWriter,
    config: &Config,
    resume_text: &str,
    limit: Option<usize>,
) -> Result<RunSummary> {
    auth::login(session, credentials, &config.site, &config.selectors, &config.timeouts)
        .context("Login failed")?;
    search::open_results(session, &config.site, &config.search)?;

    let mut postings = postings::locate_postings(session, &config.selectors, &config.timeouts)
        .context("Failed to read search results")?;
    if let Some(n) = limit {
        postings.truncate(n);
    }
    if postings.is_empty() {
        println!("No postings found.");
        return Ok(RunSummary::default());
    }

    Pipeline::new(session, db, writer, config, resume_text)
        .run(postings)
        .map_err(Into::into)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
