use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads a TOML file into any of the configuration structures.
///
/// Keys missing from the file take their default values.
fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Demo server configuration.
///
/// Every field can be given on the command line, through a `TRAFFICLAB_*`
/// environment variable, or in the TOML file passed with `--config`. When a
/// file is given it replaces the command-line values entirely.
#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(name = "trafficlab-server")]
#[command(version)]
#[command(about = "In-memory demo REST server")]
#[serde(default)]
pub struct ServerConfig {
    /// TOML configuration file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// IP address to bind the HTTP listener to
    #[arg(long, env = "TRAFFICLAB_BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: String,

    /// TCP port of the HTTP listener
    #[arg(long, env = "TRAFFICLAB_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Lifetime of a login session, advertised as `expires_in`
    #[arg(long, env = "TRAFFICLAB_SESSION_TIMEOUT_SECS", default_value_t = DEFAULT_SESSION_TIMEOUT_SECS)]
    pub session_timeout_secs: u64,

    /// How often expired sessions are evicted
    #[arg(long, env = "TRAFFICLAB_CLEANUP_INTERVAL_SECS", default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS)]
    pub cleanup_interval_secs: u64,

    /// Number of items served by `GET /data/large`
    #[arg(long, env = "TRAFFICLAB_LARGE_DATASET_SIZE", default_value_t = DEFAULT_LARGE_DATASET_SIZE)]
    pub large_dataset_size: usize,

    /// Largest accepted request body
    #[arg(long, env = "TRAFFICLAB_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            large_dataset_size: DEFAULT_LARGE_DATASET_SIZE,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Parses the command line, then swaps in the `--config` file if one was given.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(Self::parse())
    }

    fn resolve(args: Self) -> Result<Self, ConfigError> {
        let config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => args,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_toml(path)?;
        config.config = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::EmptyValue("bind_address".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::NotInRange("port must be between 1 and 65535".into()));
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "session_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::NotInRange(
                "cleanup_interval_secs must be greater than 0".into(),
            ));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|e| ConfigError::NotInRange(format!("bind_address {}: {}", self.bind_address, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Traffic client configuration.
#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(name = "trafficlab-client")]
#[command(version)]
#[command(about = "Synthetic traffic generator for the demo server")]
#[serde(default)]
pub struct ClientConfig {
    /// TOML configuration file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Base URL of the demo server, `http://` or `https://`
    #[arg(long, env = "TRAFFICLAB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Accept self-signed or otherwise invalid TLS certificates
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub insecure: bool,

    /// Per-request timeout; unset keeps the HTTP library default
    #[arg(long, env = "TRAFFICLAB_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Stop after this many traffic patterns; unset runs forever
    #[arg(long, env = "TRAFFICLAB_ITERATIONS")]
    pub iterations: Option<u64>,

    /// Seed for the random generator, for reproducible runs
    #[arg(long, env = "TRAFFICLAB_SEED")]
    pub seed: Option<u64>,

    /// TOML file replacing the built-in traffic pattern table
    #[arg(long, env = "TRAFFICLAB_PATTERNS_FILE")]
    pub patterns_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            insecure: false,
            request_timeout_secs: None,
            iterations: None,
            seed: None,
            patterns_file: None,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(Self::parse())
    }

    fn resolve(args: Self) -> Result<Self, ConfigError> {
        let config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => args,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_toml(path)?;
        config.config = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("base_url".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::NotInRange(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::NotInRange(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Flow analyzer configuration.
#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(name = "trafficlab-analyzer")]
#[command(version)]
#[command(about = "Classifies and summarises exported network flows")]
#[serde(default)]
pub struct AnalyzerConfig {
    /// TOML configuration file
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Flow CSV exported by the flow meter
    #[arg(long, env = "TRAFFICLAB_FLOW_CSV", default_value = DEFAULT_FLOW_CSV)]
    pub input: PathBuf,

    /// Directory receiving the classified CSV and the JSON summary
    #[arg(long, env = "TRAFFICLAB_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            config: None,
            input: PathBuf::from(DEFAULT_FLOW_CSV),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl AnalyzerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(Self::parse())
    }

    fn resolve(args: Self) -> Result<Self, ConfigError> {
        let config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => args,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_toml(path)?;
        config.config = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue("input".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue("output_dir".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn server_from_args_under_test() -> Result<ServerConfig, clap::Error> {
        ServerConfig::try_parse_from([
            "trafficlab-server",
            "--bind-address",
            "127.0.0.1",
            "--port",
            "9000",
            "--session-timeout-secs",
            "120",
        ])
    }

    #[test]
    #[serial]
    fn test_server_from_args() {
        let config = server_from_args_under_test().unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.session_timeout(), Duration::from_secs(120));
        assert_eq!(config.cleanup_interval_secs, DEFAULT_CLEANUP_INTERVAL_SECS);
        assert_eq!(config.large_dataset_size, DEFAULT_LARGE_DATASET_SIZE);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    #[serial]
    fn test_server_defaults_match_clap_defaults() {
        let parsed = ServerConfig::try_parse_from(["trafficlab-server"]).unwrap();
        assert_eq!(parsed, ServerConfig::default());
    }

    #[test]
    #[serial]
    fn test_server_port_from_env() {
        std::env::set_var("TRAFFICLAB_PORT", "9555");
        let parsed = ServerConfig::try_parse_from(["trafficlab-server"]);
        std::env::remove_var("TRAFFICLAB_PORT");

        assert_eq!(parsed.unwrap().port, 9555);
    }

    #[test]
    fn test_server_from_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\nsession_timeout_secs = 30").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_timeout_secs, 30);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.config.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_server_from_file_rejects_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        assert!(matches!(
            ServerConfig::from_file(file.path()),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_server_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));

        config.port = 8443;
        config.bind_address = "not an ip".into();
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));

        config.bind_address = " ".into();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyValue(_))));

        let config = ServerConfig {
            session_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_client_from_args() {
        let config = ClientConfig::try_parse_from([
            "trafficlab-client",
            "--base-url",
            "https://server:8443",
            "--insecure",
            "--iterations",
            "5",
            "--seed",
            "42",
        ])
        .unwrap();

        assert_eq!(config.base_url, "https://server:8443");
        assert!(config.insecure);
        assert_eq!(config.iterations, Some(5));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.request_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_validation() {
        let config = ClientConfig {
            base_url: "ftp://server".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_analyzer_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "input = \"/tmp/flows.csv\"").unwrap();

        let config = AnalyzerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.input, PathBuf::from("/tmp/flows.csv"));
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn test_resolve_prefers_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "output_dir = \"/tmp/out\"").unwrap();

        let args = AnalyzerConfig {
            config: Some(file.path().to_path_buf()),
            output_dir: PathBuf::from("/ignored"),
            ..Default::default()
        };
        let config = AnalyzerConfig::resolve(args).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }
}
