pub mod configuration;
pub mod error_handling;
pub mod flow_analysis;
pub mod session_management;
pub mod storage;
pub mod traffic;
pub mod web_interface;
