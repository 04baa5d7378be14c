use log::{error, info};
use trafficlab::configuration::ClientConfig;
use trafficlab::traffic::patterns::{default_patterns, load_patterns};
use trafficlab::traffic::{PatternSelector, TrafficClient};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    let patterns = match &config.patterns_file {
        Some(path) => {
            info!("Loading traffic patterns from {}", path.display());
            load_patterns(path)
        }
        None => Ok(default_patterns()),
    };
    let selector = match patterns.and_then(PatternSelector::new) {
        Ok(selector) => selector,
        Err(e) => {
            error!("Invalid traffic patterns: {}", e);
            std::process::exit(1);
        }
    };

    let mut client = match TrafficClient::new(&config, selector) {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to create the HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = client.run(config.iterations) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            client.log_summary();
        }
    }
}
