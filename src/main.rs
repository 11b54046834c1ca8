// Roster Lineage - Batch runner
// Reads the run config, resolves identities, writes the artifacts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_lineage::{export, pipeline, Pipeline, RunConfig};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "roster-lineage")]
#[command(about = "Identity resolution and merge engine for roster history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve all sources and write identities, diagnostics and tally
    Run {
        /// Run configuration (TOML)
        #[arg(short, long, env = "ROSTER_LINEAGE_CONFIG")]
        config: PathBuf,

        /// Resolve and report without writing any output
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and validate a run configuration
    CheckConfig {
        #[arg(short, long, env = "ROSTER_LINEAGE_CONFIG")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_lineage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, dry_run } => run(&config, dry_run),
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn run(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    info!(sources = config.sources.len(), "config loaded");

    let pipeline = Pipeline::from_config(&config).context("Failed to prepare pipeline")?;
    let sources = pipeline::sources_from_config(&config);
    let output = pipeline.run(&sources).context("Run failed")?;

    println!("🧬 Roster Lineage {}", roster_lineage::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {}", output.summary.summary());
    println!("✓ {}", output.diagnostics.summary());
    println!("✓ {} possible missed matches for review", output.suggestions.len());

    if dry_run {
        println!("\n⏭️  Dry run: nothing written");
        return Ok(());
    }

    let meta = export::write_outputs(&output, &config.output.dir).with_context(|| {
        format!("Failed to write outputs to {}", config.output.dir.display())
    })?;

    println!("\n💾 Written to {}", config.output.dir.display());
    println!("   run id:  {}", meta.run_id);
    println!("   digest:  {}", meta.identity_digest);

    Ok(())
}

fn check_config(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    println!("✅ {} is valid", config_path.display());
    for source in &config.sources {
        let marker = if source.authoritative { "authoritative" } else { "name-only" };
        println!("   {} ({}) {}", source.name, marker, source.path.display());
    }
    if let Some(roster) = &config.roster {
        println!("   roster {}", roster.path.display());
    }
    if let Some(directives) = &config.merge.directives {
        println!("   directives {}", directives.display());
    }
    println!("   output {}", config.output.dir.display());

    Ok(())
}
