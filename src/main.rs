use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use hwl_proxy::config::{load_config, ObservabilityConfig, ProxyConfig};
use hwl_proxy::lifecycle::{start, wait_for_signal};
use hwl_proxy::observability::{logging, metrics};
use hwl_proxy::whitelist::{load_rules, Whitelist};

#[derive(Parser, Debug)]
#[command(name = "hwl-proxy", version, about = "Header-whitelisting HTTP proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Whitelist rule file; overrides `whitelist.rules_path`.
    #[arg(short, long)]
    whitelist: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            // no config means no log settings yet
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(config = %args.config.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        role = ?config.role,
        "hwl-proxy starting"
    );

    if let Err(e) = run(config, args.whitelist).await {
        tracing::error!(error = %e, "Startup failed");
        return Err(e);
    }
    Ok(())
}

async fn run(config: ProxyConfig, whitelist_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let whitelist = if config.whitelist.enabled {
        let path = whitelist_path.unwrap_or_else(|| PathBuf::from(&config.whitelist.rules_path));
        let rules = load_rules(&path)?;
        tracing::info!(path = %path.display(), rules = rules.len(), "Whitelist loaded");
        Whitelist::new(rules)
    } else {
        tracing::warn!("Header whitelisting disabled, requests are forwarded unchanged");
        Whitelist::default()
    };

    if config.observability.metrics_enabled {
        // validated at load time
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let proxy = start(config, whitelist).await?;

    let signal = wait_for_signal().await;
    tracing::info!(signal, "Signal received");
    proxy.shutdown().await;

    Ok(())
}
