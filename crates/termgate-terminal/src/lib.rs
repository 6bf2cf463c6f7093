// Gateway-side terminal session management
//
// Every session owns exactly one bridge process. The registry is the only
// shared structure; all lifecycle transitions for a session id go through it.

mod error;
pub mod launcher;
mod process;
mod registry;
mod session;
mod transcript;

// Re-export public API
pub use error::GatewayError;
pub use launcher::{BridgeIo, BridgeLauncher, BridgeProcess, ControlSink, LaunchOptions, OutputStream};
pub use process::ProcessLauncher;
pub use registry::{ResizeOutcome, SessionRegistry};
pub use session::{Session, SessionInfo};
pub use transcript::Transcript;

// Constants
pub const MAX_CONCURRENT_SESSIONS: usize = 15;
pub const BRIDGE_EXIT_GRACE_MS: u64 = 1000;
