// Terminal gateway server
pub mod cli;
pub mod config;
pub mod logging;
pub mod web;

pub use cli::Cli;
pub use config::GatewayConfig;
pub use web::WebServer;
