use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelsmith_core::{
    load_config, metrics, validate_config, Config, FsArtifactStore, HttpSourceFetcher,
    MediaProbe, RenderEngine, ScenarioComposer, ScenarioRequest, SqliteRecordStore,
};

/// Composes short-form videos from remote sources.
#[derive(Debug, Parser)]
#[command(name = "reelsmith", version, about)]
struct Cli {
    /// Configuration file; built-in defaults are used when omitted.
    #[arg(long, short, env = "REELSMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Write a Prometheus text snapshot of the run's metrics to stderr on exit.
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario request and print the prepared video record.
    Compose {
        /// TOML file holding the request.
        #[arg(long)]
        job: PathBuf,
    },
    /// Print stream information for a media file.
    Probe { file: PathBuf },
    /// Print the effective configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    let result = match cli.command {
        Command::Compose { job } => compose(&config, &job).await,
        Command::Probe { file } => probe(&config, &file).await,
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    };

    if cli.metrics {
        eprint!("{}", metrics_snapshot()?);
    }
    result
}

fn metrics_snapshot() -> Result<String> {
    let registry = prometheus::Registry::new();
    metrics::register_all(&registry).context("Failed to register metrics")?;
    metrics::encode_metrics(&registry).context("Failed to encode metrics")
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => {
            info!("No config file given, using defaults");
            Config::default()
        }
    };
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn read_job(path: &Path) -> Result<ScenarioRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {:?}", path))?;
    toml::from_str(&raw).with_context(|| format!("Invalid job file {:?}", path))
}

async fn compose(config: &Config, job: &Path) -> Result<()> {
    let request = read_job(job)?;

    let engine = RenderEngine::ffmpeg(config.render.clone());
    let fetcher = Arc::new(
        HttpSourceFetcher::new(&config.fetch).context("Failed to create source fetcher")?,
    );
    let artifacts = Arc::new(FsArtifactStore::from_config(&config.artifacts));
    let records = Arc::new(
        SqliteRecordStore::new(&config.records.path).context("Failed to open record store")?,
    );
    info!(
        records = %config.records.path.display(),
        artifacts = %config.artifacts.dir.display(),
        "Collaborators initialized"
    );

    let composer = ScenarioComposer::new(
        engine,
        fetcher,
        artifacts,
        records,
        config.workspace.root.clone(),
    )
    .with_config(config.composer.clone())
    .with_fetch_config(config.fetch.clone());

    let outcome = composer
        .compose(request)
        .await
        .context("Composer job failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome.record)?);
    Ok(())
}

async fn probe(config: &Config, file: &Path) -> Result<()> {
    let engine = RenderEngine::ffmpeg(config.render.clone());
    let info = engine
        .probe()
        .inspect(file)
        .await
        .with_context(|| format!("Failed to probe {:?}", file))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compose() {
        let cli = Cli::try_parse_from([
            "reelsmith",
            "--config",
            "reelsmith.toml",
            "compose",
            "--job",
            "job.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("reelsmith.toml")));
        assert!(!cli.json_logs);
        assert!(!cli.metrics);
        assert!(
            matches!(cli.command, Command::Compose { ref job } if job == Path::new("job.toml"))
        );
    }

    #[test]
    fn test_parse_show_config_with_json_logs() {
        let cli = Cli::try_parse_from(["reelsmith", "--json-logs", "show-config"]).unwrap();
        assert!(cli.json_logs);
        assert!(matches!(cli.command, Command::ShowConfig));
    }

    #[test]
    fn test_parse_metrics_flag() {
        let cli =
            Cli::try_parse_from(["reelsmith", "--metrics", "probe", "/clips/a.mp4"]).unwrap();
        assert!(cli.metrics);
        assert!(matches!(cli.command, Command::Probe { .. }));
    }

    #[test]
    fn test_metrics_snapshot_lists_core_metrics() {
        let text = metrics_snapshot().unwrap();
        assert!(text.contains("reelsmith_probe_failures_total"));
        assert!(text.contains("reelsmith_downloaded_bytes_total"));

        // A fresh registry per snapshot, so repeated calls do not collide.
        assert!(metrics_snapshot().is_ok());
    }

    #[test]
    fn test_compose_requires_job() {
        assert!(Cli::try_parse_from(["reelsmith", "compose"]).is_err());
    }

    #[test]
    fn test_read_job() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
job_id = "spring-drop"
accounts = ["brand.main", "brand.alt"]
caption = "Out now"

[scenario]
kind = "shortify"
source_url = "https://cdn.example.com/clips/long.mp4"
max_duration_secs = 30.0
quarter_turns = 1
"#
        )
        .unwrap();

        let request = read_job(file.path()).unwrap();
        assert_eq!(request.job_id, "spring-drop");
        assert_eq!(request.accounts.len(), 2);
        assert_eq!(request.scenario.name(), "shortify");
        request.validate().unwrap();
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = resolve_config(None).unwrap();
        assert_eq!(config.render.width, 1080);
    }

    #[test]
    fn test_resolve_config_missing_file() {
        assert!(resolve_config(Some(Path::new("/nonexistent/reelsmith.toml"))).is_err());
    }
}
