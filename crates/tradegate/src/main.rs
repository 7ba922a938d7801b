use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradegate::api::{create_router, AppState};
use tradegate::cache::SentimentStore;
use tradegate::models::DecisionRequest;

#[derive(Parser, Debug)]
#[command(name = "tradegate", about = "Deterministic trade decision and risk gating")]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Decide on one request read from a file or stdin
    Decide {
        /// Read DecisionRequest JSON from a file instead of stdin
        #[arg(short, long)]
        input: Option<String>,

        /// Pretty-print the output JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Record a sentiment reading in the configured sentiment DB
    RecordSentiment {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        source: String,
        /// Polarity from -1.0 (bearish) to 1.0 (bullish)
        #[arg(long, allow_hyphen_values = true)]
        score: f64,
        /// How long the reading stays valid
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: i64,
    },
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = tradegate::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => {
            let pipeline = tradegate::build_pipeline(&config).context("Failed to build pipeline")?;
            let state = Arc::new(AppState::new(Arc::new(pipeline)));
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Received shutdown signal");
                cancel.cancel();
            });

            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            info!(bind = %bind, "Serving decision API");
            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .context("Server error")?;
        }
        Command::Decide { input, pretty } => {
            let request_json = if let Some(input_path) = &input {
                std::fs::read_to_string(input_path)
                    .with_context(|| format!("Failed to read input: {input_path}"))?
            } else {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read from stdin")?;
                buf
            };

            let request: DecisionRequest = serde_json::from_str(&request_json)
                .context("Failed to parse DecisionRequest JSON")?;

            let pipeline = tradegate::build_pipeline(&config).context("Failed to build pipeline")?;
            let decision = tradegate::evaluate(&pipeline, request)
                .await
                .map_err(|e| anyhow::anyhow!("Decision failed ({}): {e}", e.kind()))?;

            let output = if pretty {
                serde_json::to_string_pretty(&decision)?
            } else {
                serde_json::to_string(&decision)?
            };
            println!("{output}");
        }
        Command::RecordSentiment {
            symbol,
            source,
            score,
            ttl_seconds,
        } => {
            let path = config
                .cache
                .sentiment_db_path
                .as_deref()
                .context("cache.sentiment_db_path is not configured")?;
            let store = SentimentStore::create(path)
                .with_context(|| format!("Failed to open sentiment DB: {path}"))?;

            let purged = tradegate::record_sentiment(&store, &symbol, &source, score, ttl_seconds)?;
            info!(symbol = %symbol, source = %source, purged, "Recorded sentiment reading");
        }
    }

    Ok(())
}
