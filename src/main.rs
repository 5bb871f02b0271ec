use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use weather_ingest::app::LogQueryService;
use weather_ingest::config::Config;
use weather_ingest::observability::{init_logging, metrics};
use weather_ingest::server::{create_server, start_server, AppState};
use weather_ingest::tasks::{self, build_ingestor, Stores};

#[derive(Parser)]
#[command(name = "weather_ingest")]
#[command(about = "Weather ingestion with raw payload storage and a queryable log")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file (defaults to ./weather.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single ingestion
    Ingest,
    /// Serve the read API
    Serve {
        /// Also ingest every N seconds while serving
        #[arg(long)]
        ingest_every: Option<u64>,
        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print log entries in a time range as JSON
    Logs {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Write a stored payload to stdout
    Payload {
        /// Row key of the ingestion run
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    let _log_guard = init_logging(&config.logging);
    metrics::init(config.metrics.listen.as_deref());

    let stores = Stores::open(&config).context("opening stores")?;

    match cli.command {
        Commands::Ingest => {
            let ingestor = build_ingestor(&config, &stores)?;
            if let Some(outcome) = tasks::ingest_once(&config, &ingestor).await? {
                println!(
                    "{} {} {} {}",
                    outcome.row_key, outcome.status, outcome.status_code, outcome.payload_locator
                );
            }
        }
        Commands::Serve { ingest_every, port } => {
            if let Some(port) = port {
                config.http.port = port;
            }
            if let Some(secs) = ingest_every {
                config.schedule.interval_secs = secs;
                config.validate()?;
                let ingestor = Arc::new(build_ingestor(&config, &stores)?);
                tokio::spawn(tasks::run_schedule(config.clone(), ingestor));
            }

            let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
                .parse()
                .with_context(|| {
                    format!("invalid http bind {}:{}", config.http.host, config.http.port)
                })?;
            let state = AppState::new(stores.logs.clone(), stores.payloads.clone(), &config.weather.location);
            info!(city = %config.weather.location, "serving weather logs");
            start_server(create_server(state), addr).await?;
        }
        Commands::Logs { from, to } => {
            let service = LogQueryService::new(stores.logs.clone(), config.weather.location.clone());
            let result = service.query(Some(&from), Some(&to)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Payload { id } => {
            let state = AppState::new(stores.logs.clone(), stores.payloads.clone(), &config.weather.location);
            let payload = state.payloads.lookup(Some(&id)).await?;
            std::io::stdout().write_all(&payload.content)?;
        }
    }

    Ok(())
}
