use std::env;

use clap::Parser;
use tokio::{runtime::Builder, signal};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

use dicefeed::{
    config::{self, Config},
    feeder::Feeder,
};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to deserialize dicefeed config: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// path on disk to an optional configuration file
    #[clap(long)]
    config_path: Option<String>,
    /// hostname or IP of the graphite ingest endpoint
    #[clap(long)]
    graphite_addr: Option<String>,
    /// TCP port of the graphite ingest endpoint
    #[clap(long)]
    graphite_port: Option<u16>,
    /// server identity embedded in every metric name
    #[clap(long)]
    server_id: Option<String>,
    /// number of synthetic sites sampled on every tick
    #[clap(long)]
    site_count: Option<usize>,
    /// tick period and alignment unit, in seconds
    #[clap(long)]
    interval_seconds: Option<u64>,
}

fn load_config_contents(config_path: Option<&str>) -> Result<Option<String>, Error> {
    if let Ok(env_var_value) = env::var("DICEFEED_CONFIG") {
        debug!("Using config from env var 'DICEFEED_CONFIG'");
        return Ok(Some(env_var_value));
    }
    let Some(config_path) = config_path else {
        return Ok(None);
    };
    debug!("Attempting to open configuration file at: {config_path}");
    let contents = std::fs::read_to_string(config_path).map_err(|err| {
        error!("Could not read config file '{config_path}': {err}");
        err
    })?;
    Ok(Some(contents))
}

fn get_config(cli: &Cli, contents: Option<String>) -> Result<Config, Error> {
    let mut config = match contents {
        Some(contents) => serde_yaml::from_str(&contents).map_err(|err| {
            error!("Configuration validation failed: {err}");
            Error::SerdeYaml(err)
        })?,
        None => Config::default(),
    };

    if let Some(ref graphite_addr) = cli.graphite_addr {
        config.graphite_addr.clone_from(graphite_addr);
    }
    if let Some(graphite_port) = cli.graphite_port {
        config.graphite_port = graphite_port;
    }
    if let Some(ref server_id) = cli.server_id {
        config.server_id.clone_from(server_id);
    }
    if let Some(site_count) = cli.site_count {
        config.site_count = site_count;
    }
    if let Some(interval_seconds) = cli.interval_seconds {
        config.interval_seconds = interval_seconds;
    }
    config.validate()?;
    Ok(config)
}

async fn inner_main(config: Config) {
    let (shutdown_watcher, shutdown_broadcaster) = dicefeed_signal::signal();

    // The only translation from the process boundary to cancellation: the
    // first interrupt raises the signal, later ones have nothing to raise.
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(err) => error!("could not listen for interrupt: {err}"),
        }
        shutdown_broadcaster.signal();
        info!("cancellation requested");
    });

    Feeder::new(config, shutdown_watcher).spin().await;
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting dicefeed {version}.");

    let cli = Cli::parse();
    let contents = load_config_contents(cli.config_path.as_deref())?;
    let config = get_config(&cli, contents)?;

    let runtime = Builder::new_multi_thread().enable_io().enable_time().build()?;
    runtime.block_on(inner_main(config));

    info!("Bye. :)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let cli = Cli::parse_from(["dicefeed"]);
        let config = get_config(&cli, None).expect("defaults must be valid");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn flags_override_file_contents() {
        let contents = r"
graphite_addr: graphite.internal
site_count: 9
";
        let cli = Cli::parse_from(["dicefeed", "--site-count", "3", "--server-id", "sv07"]);
        let config = get_config(&cli, Some(contents.to_string())).expect("config must be valid");

        assert_eq!(config.graphite_addr, "graphite.internal");
        assert_eq!(config.site_count, 3);
        assert_eq!(config.server_id, "sv07");
        assert_eq!(config.graphite_port, 2003);
    }

    #[test]
    fn zero_interval_is_a_startup_error() {
        let cli = Cli::parse_from(["dicefeed", "--interval-seconds", "0"]);
        assert!(matches!(
            get_config(&cli, None),
            Err(Error::Config(config::Error::ZeroInterval))
        ));
    }

    #[test]
    fn malformed_file_is_a_startup_error() {
        let cli = Cli::parse_from(["dicefeed"]);
        let result = get_config(&cli, Some("site_count: [not, a, number]".to_string()));
        assert!(matches!(result, Err(Error::SerdeYaml(_))));
    }
}
