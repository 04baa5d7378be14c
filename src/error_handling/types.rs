use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    EmptyValue(String),
    NotInRange(String),
    PatternsEmpty,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::EmptyValue(e) => write!(f, "Missing value: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::PatternsEmpty => write!(f, "No traffic pattern with a positive weight"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

#[derive(Debug, PartialEq)]
pub enum StorageError {
    Conflict(String),
    NotFound(String),
    LockPoisoned,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Conflict(e) => write!(f, "Already exists: {}", e),
            StorageError::NotFound(e) => write!(f, "Not found: {}", e),
            StorageError::LockPoisoned => write!(f, "Storage lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, PartialEq)]
pub enum SessionError {
    NotFound,
    Expired,
    LockPoisoned,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound => write!(f, "Session not found"),
            SessionError::Expired => write!(f, "Session expired"),
            SessionError::LockPoisoned => write!(f, "Session lock poisoned"),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Unable to bind web server: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    UnexpectedStatus(u16, String),
    NotLoggedIn,
    NoKnownAccount,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "HTTP error: {}", e),
            ClientError::UnexpectedStatus(code, body) => {
                write!(f, "Unexpected status {}: {}", code, body)
            }
            ClientError::NotLoggedIn => write!(f, "No active session"),
            ClientError::NoKnownAccount => write!(f, "No registered account to log in with"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err)
    }
}

#[derive(Debug)]
pub enum AnalyzerError {
    InputNotFound(PathBuf),
    IoError(std::io::Error),
    CsvError(csv::Error),
    MissingColumn(String),
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    JsonError(serde_json::Error),
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerError::InputNotFound(p) => write!(f, "CSV file not found: {}", p.display()),
            AnalyzerError::IoError(e) => write!(f, "IO error: {}", e),
            AnalyzerError::CsvError(e) => write!(f, "CSV error: {}", e),
            AnalyzerError::MissingColumn(c) => write!(f, "Missing required column: {}", c),
            AnalyzerError::InvalidValue { row, column, value } => write!(
                f,
                "Invalid value {:?} in column {} at row {}",
                value, column, row
            ),
            AnalyzerError::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        AnalyzerError::IoError(err)
    }
}

impl From<csv::Error> for AnalyzerError {
    fn from(err: csv::Error) -> Self {
        AnalyzerError::CsvError(err)
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::JsonError(err)
    }
}
