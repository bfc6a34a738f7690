use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use insight_dataops::config::Settings;
use insight_dataops::dataops::{TransformationOutcome, TransformationPlan};
use insight_dataops::dataset::{DataHealth, DatasetSnapshot};
use insight_dataops::export::export_snapshot;
use insight_dataops::ingest::ingest_file;
use insight_dataops::planner::{PlanInstruction, RulePlanner};
use insight_dataops::session::Session;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "insight-dataops",
    about = "Versioned, hash-verified transformations for CSV and JSON datasets"
)]
pub struct Cli {
    /// Settings file. Defaults to the platform config directory.
    #[arg(long, global = true, env = "INSIGHT_DATAOPS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show schema, version, hash and data health of a file
    Inspect {
        /// CSV or JSON file
        file: PathBuf,
    },
    /// Run a JSON transformation plan against a file
    Apply {
        /// CSV or JSON file
        file: PathBuf,

        /// Plan file: {"operations": [{"type": "DEDUPLICATE"}, ...]}
        #[arg(short, long)]
        plan: PathBuf,

        /// Change description recorded in the version history
        #[arg(short, long)]
        summary: Option<String>,

        /// Write the transformed dataset here (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Turn a plain-language instruction into a plan and run it
    Ask {
        /// CSV or JSON file
        file: PathBuf,

        /// e.g. "remove duplicate rows" or "delete rows 2 and 4"
        #[arg(short, long)]
        instruction: String,

        /// Write the transformed dataset here (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Commands::Inspect { file } => handle_inspect(settings, &file),
        Commands::Apply {
            file,
            plan,
            summary,
            output,
        } => handle_apply(settings, &file, &plan, summary.as_deref(), output.as_deref()),
        Commands::Ask {
            file,
            instruction,
            output,
        } => handle_ask(settings, &file, instruction, output.as_deref()).await,
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match Settings::default_path() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("No config directory ({e}), using default settings");
                let mut settings = Settings::default();
                settings.apply_env_overrides();
                return Ok(settings);
            }
        },
    };
    Settings::load(&path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn open(settings: Settings, file: &Path) -> Result<Session> {
    let table = ingest_file(file).with_context(|| format!("Failed to ingest {}", file.display()))?;
    let mut session = Session::new(settings);
    session.upload(table)?;
    Ok(session)
}

fn handle_inspect(settings: Settings, file: &Path) -> Result<()> {
    let session = open(settings, file)?;
    let snapshot = session.active().context("No active dataset after upload")?;
    print_snapshot(snapshot)?;
    Ok(())
}

fn handle_apply(
    settings: Settings,
    file: &Path,
    plan_path: &Path,
    summary: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let plan_text = std::fs::read_to_string(plan_path)
        .with_context(|| format!("Failed to read plan {}", plan_path.display()))?;
    let plan = TransformationPlan::from_json(&plan_text).context("Invalid plan file")?;

    let mut session = open(settings, file)?;
    let outcome = session.apply_to_active(&plan, summary)?;
    finish(&outcome, output)
}

async fn handle_ask(
    settings: Settings,
    file: &Path,
    instruction: String,
    output: Option<&Path>,
) -> Result<()> {
    let mut session = open(settings, file)?;
    let outcome = session
        .plan_and_apply(&RulePlanner, PlanInstruction::free_text(instruction))
        .await?;
    finish(&outcome, output)
}

fn finish(outcome: &TransformationOutcome, output: Option<&Path>) -> Result<()> {
    println!("{}", outcome.summary());
    print_snapshot(&outcome.snapshot)?;

    if let Some(path) = output {
        export_snapshot(&outcome.snapshot, path)?;
        println!("Exported to {}", path.display());
    }
    Ok(())
}

fn print_snapshot(snapshot: &DatasetSnapshot) -> Result<()> {
    println!(
        "{} v{} ({} rows, hash {})",
        snapshot.file_name(),
        snapshot.version(),
        snapshot.row_count(),
        snapshot.version_hash()
    );

    println!("\nColumns:");
    for column in snapshot.columns() {
        println!("  {:<24} {:<8} e.g. {}", column.name, column.kind.as_str(), column.example);
    }

    println!("\nHistory:");
    for entry in snapshot.history() {
        println!(
            "  v{:<4} {:<40} rows {}",
            entry.resulting_version, entry.change_description, entry.rows_after
        );
    }

    let health = DataHealth::of(snapshot)?;
    println!(
        "\nHealth: {}% ({}), {} null cell(s), {} duplicate row(s)",
        health.quality_score,
        health.label(),
        health.null_cells,
        health.duplicate_rows
    );
    Ok(())
}
