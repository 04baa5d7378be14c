// Web Interface module root
pub mod handlers;
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use handlers::{DemoService, ServiceError};
pub use routes::api_routes;
pub use web_server::WebServer;
