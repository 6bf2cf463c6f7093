//! Per-session bridge: owns one PTY and the shell inside it. Spawned by the
//! gateway, configured through the environment, spoken to over stdio.

use termgate_bridge::{init_logging, run, BridgeConfig};

fn main() {
    init_logging();

    let code = match run(BridgeConfig::from_env()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Bridge failed: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
