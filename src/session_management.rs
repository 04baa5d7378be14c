//! Session management core module.
//!
//! Sessions are minted at login, validated on logout, dropped when their user
//! is deleted and evicted once older than the configured lifetime.

/// Submodule for session data structures.
pub mod session;
/// Submodule for session manager implementation.
pub mod session_manager;

pub use session::Session;
pub use session_manager::SessionManager;
