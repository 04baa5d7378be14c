use log::error;
use trafficlab::configuration::AnalyzerConfig;
use trafficlab::flow_analysis::FlowAnalyzer;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let config = match AnalyzerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = FlowAnalyzer::new(config).run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
