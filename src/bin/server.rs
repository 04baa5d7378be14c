use log::{error, info};
use trafficlab::configuration::ServerConfig;
use trafficlab::web_interface::WebServer;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    info!("Importing configuration");
    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let server = WebServer::new(config);
    if let Err(e) = server.start().await {
        error!("Server failed: {}, exiting...", e);
        std::process::exit(1);
    }
}
