//! Wire types shared by the termgate gateway, bridge and client.
//!
//! Three planes meet here: control frames (client → gateway → bridge, one
//! JSON object per line), raw PTY output (bridge → gateway → client, never
//! framed), and bridge lifecycle events (bridge stderr → gateway).

pub mod banner;
mod event;
mod frame;
mod grid;
mod state;

pub use event::BridgeEvent;
pub use frame::{ControlFrame, FrameError};
pub use grid::GridSize;
pub use state::SessionState;

// ============================================================================
// Constants
// ============================================================================

/// Grid used by a bridge when no size is configured
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Read size for PTY and bridge output relays
pub const OUTPUT_CHUNK_SIZE: usize = 4096;

/// Environment variables understood by the bridge process
pub mod env {
    pub const SHELL_PATH: &str = "SHELL_PATH";
    pub const PTY_COLS: &str = "PTY_COLS";
    pub const PTY_ROWS: &str = "PTY_ROWS";
    pub const PTY_CWD: &str = "PTY_CWD";
    pub const BRIDGE_LOG: &str = "BRIDGE_LOG";
}
