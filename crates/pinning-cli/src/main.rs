mod output;
mod root;

use anyhow::Context;
use clap::Parser;
use pinning_core::config::{Config, WarnLevel};
use pinning_core::pipeline::Pipeline;
use pinning_core::resolve::{GitRemote, Transport};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "actions-pinning",
    about = "Pin GitHub Actions in workflow files to the commit SHA behind each tag",
    version
)]
struct Cli {
    /// Base path for your repository (default: current directory)
    path: Option<PathBuf>,

    /// Use SSH instead of HTTPS to fetch repository data from Git
    #[arg(long)]
    ssh: bool,

    /// Verbose output
    #[arg(long)]
    verbose: bool,

    /// Debug output (implies --verbose)
    #[arg(long)]
    debug: bool,

    /// Action owner to leave unpinned; repeat to list several (replaces the configured list)
    #[arg(long = "ignore-author", value_name = "OWNER")]
    ignore_authors: Vec<String>,

    /// Output the run report as JSON
    #[arg(long, short = 'j')]
    json: bool,
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::TRACE
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    if let Err(e) = run(&cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        if cli.debug {
            eprintln!("{e:?}");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let workflow_dir = root::resolve_workflow_dir(cli.path.as_deref());
    tracing::info!("Reading path {}...", workflow_dir.display());

    let mut config = Config::load(&workflow_dir).context("failed to load config")?;
    if cli.ssh {
        config.ssh = true;
    }
    if !cli.ignore_authors.is_empty() {
        config.ignore_authors = cli.ignore_authors.clone();
    }
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let mut pipeline = Pipeline::discover(&workflow_dir, &config.policy())?;

    let names: Vec<String> = pipeline
        .files()
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    if names.is_empty() {
        tracing::info!("No YAML files found at {}, skipping...", workflow_dir.display());
        if cli.json {
            output::print_report_json(&pipeline.write())?;
        }
        return Ok(());
    }
    tracing::info!("Found files: {}", names.join(", "));

    if pipeline.needs_resolution() {
        let transport = if config.ssh {
            Transport::Ssh
        } else {
            Transport::Https
        };
        let remote = Arc::new(GitRemote::detect(transport)?);

        tracing::info!("Starting to fetch tags...");
        let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
        rt.block_on(pipeline.resolve(remote));
        tracing::info!("Writing files...");
    }

    let report = pipeline.write();

    if cli.json {
        output::print_report_json(&report)?;
    } else {
        output::print_pins(&report);
    }

    if report.fixed.is_empty() {
        tracing::info!("No files required fixing");
    } else {
        tracing::info!(
            pins = report.pin_count(),
            "{} files were fixed",
            report.fixed_count()
        );
    }

    if !report.is_success() {
        let failed: Vec<String> = report
            .failures
            .iter()
            .map(|f| f.path.display().to_string())
            .collect();
        anyhow::bail!(
            "{} file(s) could not be pinned: {}",
            failed.len(),
            failed.join(", ")
        );
    }

    Ok(())
}
