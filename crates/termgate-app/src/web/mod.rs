// Web frontend module
pub mod routes;
pub mod server;
pub mod terminal;

pub use routes::{create_router, AppState};
pub use server::WebServer;
pub use terminal::is_valid_session_id;
