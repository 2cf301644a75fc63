use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use gym_retention_engine::{recommend, report, snapshot, EngineConfig, RetentionEngine};

#[derive(Parser)]
#[command(name = "retention-engine")]
#[command(about = "Churn risk, forecasts and interventions for subscription gyms", long_about = None)]
struct Cli {
    /// TOML file overriding engine thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank members by churn risk
    Score {
        #[arg(long)]
        snapshot: PathBuf,
        /// Scoring date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run the full analysis and write a report
    Report {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Merge a CSV roster export into a snapshot file
    ImportMembers {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        snapshot: PathBuf,
        /// Gym name used when the snapshot file does not exist yet
        #[arg(long, default_value = "gym")]
        gym: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gym_retention_engine=info,retention_engine=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let engine = RetentionEngine::new(config).context("invalid engine configuration")?;

    match cli.command {
        Commands::Score {
            snapshot: path,
            as_of,
            limit,
        } => {
            let now = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let gym = snapshot::load(&path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            let results = engine.assess_roster(&gym.members, &gym.contacts, now)?;
            let ranked = report::riskiest_members(&results);

            if ranked.is_empty() {
                println!("No active members in this snapshot.");
                return Ok(());
            }

            println!("Top members by churn risk as of {now}:");
            for result in ranked.iter().take(limit) {
                let action = recommend::member_action(result)
                    .map(|a| a.intervention.as_str())
                    .unwrap_or("monitor");
                println!(
                    "- {} ({}, {} tier) churn {:.0}%; next step: {}",
                    result.member_name,
                    result.classification.engagement_class.as_str(),
                    result.classification.risk_tier.as_str(),
                    result.classification.churn_probability * 100.0,
                    action
                );
            }
        }
        Commands::Report {
            snapshot: path,
            as_of,
            format,
            out,
            limit,
        } => {
            let now = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let gym = snapshot::load(&path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            let analysis = engine.run(&gym, now)?;
            let rendered = match format {
                Format::Markdown => report::build_report(&analysis, limit),
                Format::Json => serde_json::to_string_pretty(&analysis)?,
            };
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::ImportMembers {
            csv,
            snapshot: path,
            gym,
        } => {
            let mut target = if path.exists() {
                snapshot::load(&path)
                    .with_context(|| format!("failed to load snapshot {}", path.display()))?
            } else {
                snapshot::GymSnapshot {
                    gym,
                    ..Default::default()
                }
            };
            let members = snapshot::import_members_csv(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let total = members.len();
            let inserted = snapshot::merge_members(&mut target, members);
            snapshot::save(&path, &target)?;
            info!(total, inserted, "roster imported");
            println!(
                "Imported {total} members from {} ({inserted} new) into {}.",
                csv.display(),
                path.display()
            );
        }
    }

    Ok(())
}
