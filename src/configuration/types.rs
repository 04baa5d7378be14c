//! Default values shared by the command-line and TOML configuration layers.

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8443;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_LARGE_DATASET_SIZE: usize = 1000;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8443";

pub const DEFAULT_FLOW_CSV: &str = "/data/flow.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "/data";
