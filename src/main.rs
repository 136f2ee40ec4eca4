use clap::Parser;
use orderbook_fetcher::{Config, OrderbookFetcher, api, run_with_shutdown};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Snapshot EVE Online market order books whenever their ESI cache expires
#[derive(Parser)]
#[command(name = "orderbook-fetcher", version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "orderbook_fetcher=trace")
    #[arg(long, default_value = "info")]
    log: String,

    /// Do not serve the status API, even if enabled in the configuration
    #[arg(long)]
    no_api: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log)),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "orderbook-fetcher failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> orderbook_fetcher::Result<()> {
    let config = Config::load(&args.config)?;
    tracing::info!(config = %args.config.display(), "Loaded configuration");

    let fetcher = OrderbookFetcher::start(config).await?;

    let config = fetcher.config();
    let api_handle = (config.api.enabled && !args.no_api).then(|| {
        tokio::spawn(api::start_api_server(
            fetcher.registry(),
            config.clone(),
            fetcher.cancel_token(),
        ))
    });

    run_with_shutdown(fetcher).await?;

    if let Some(handle) = api_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "API server failed"),
            Err(e) => tracing::error!(error = %e, "API server task panicked"),
        }
    }

    Ok(())
}
