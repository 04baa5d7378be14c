//! Error types shared by the server, the traffic client and the flow analyzer.

pub mod types;

pub use types::*;
