//! `build-graph-db`: builds a graph database file from the sources described in a graph document.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use graphetl::builder::{GraphBuilder, is_canceled};
use graphetl::report::BuildReport;
use graphetl::source::SourceRegistry;
use graphetl::source::mysql::MySqlSourceConnector;
use graphetl_config::shared::BuildSettings;
use graphetl_config::{load_build_settings, load_validated_graph_config};
use graphetl_mysql::option_file::{ClientOptions, MySqlOptionFile};
use graphetl_telemetry::tracing::{LogFormat, init_tracing};
use tracing::{error, info, warn};

/// Builds typed node tables of a graph database from relational sources.
#[derive(Parser, Debug)]
#[command(name = "build-graph-db", version)]
#[command(about = "Builds a DuckDB graph database from the sources of a graph document")]
struct Args {
    /// Graph document (YAML) describing the database, its sources and node types.
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// MySQL option file with default credentials. Defaults to `~/.my.cnf` when present.
    #[arg(long)]
    mysql_config: Option<PathBuf>,

    /// Build settings file (YAML or JSON).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory in which the database file is written.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of sources ingested concurrently.
    #[arg(long)]
    max_workers: Option<u16>,

    /// Writes the build report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log line format, `text` or `json`.
    #[arg(long, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), args.log_format)?;

    let complete = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))?;

    Ok(if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs the build and returns whether every node type was fully ingested.
async fn async_main(args: Args) -> anyhow::Result<bool> {
    let graph = load_validated_graph_config(&args.config)
        .with_context(|| format!("invalid graph document `{}`", args.config.display()))?;

    let mut settings = load_build_settings(args.settings.as_deref())
        .context("invalid build settings")?;
    if let Some(output_dir) = args.output_dir {
        settings.output_dir = output_dir;
    }
    if let Some(max_workers) = args.max_workers {
        settings.max_workers = max_workers;
    }

    let defaults = mysql_defaults(args.mysql_config.as_deref(), &settings)?;
    let sources = SourceRegistry::new().with(MySqlSourceConnector::new(
        defaults,
        Duration::from_millis(settings.connect_timeout_ms),
    ));

    let builder = GraphBuilder::new(graph, settings, sources)?;
    info!(
        path = %builder.artifact_path().display(),
        max_workers = builder.settings().max_workers,
        "building graph database"
    );

    let shutdown_tx = builder.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl+c, the build cannot be canceled");
            return;
        }

        info!("ctrl+c received, canceling build");
        shutdown_tx.shutdown();
    });

    let result = builder.build().await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = match result {
        Ok(report) => report,
        Err(err) if is_canceled(&err) => {
            warn!("build canceled before ingestion started");
            return Ok(false);
        }
        Err(err) => {
            error!(error = %err.summary(), "build failed");
            return Err(err.into());
        }
    };

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    Ok(report.is_complete())
}

/// Loads connection defaults from the option file named on the command line, in the settings, or
/// at the default location.
///
/// A missing or unreadable file at the default location is not an error.
fn mysql_defaults(
    explicit: Option<&Path>,
    settings: &BuildSettings,
) -> anyhow::Result<Option<ClientOptions>> {
    if let Some(path) = explicit.or(settings.mysql_option_file.as_deref()) {
        let options = MySqlOptionFile::load(path)
            .and_then(|file| file.client_options())
            .with_context(|| format!("invalid mysql option file `{}`", path.display()))?;
        return Ok(Some(options));
    }

    let Some(path) = MySqlOptionFile::default_path().filter(|path| path.is_file()) else {
        return Ok(None);
    };

    match MySqlOptionFile::load(&path).and_then(|file| file.client_options()) {
        Ok(options) => Ok(Some(options)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable mysql option file");
            Ok(None)
        }
    }
}

fn write_report(path: &Path, report: &BuildReport) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report `{}`", path.display()))?;

    info!(path = %path.display(), "wrote build report");

    Ok(())
}
