use std::path::PathBuf;

use termgate_protocol::{env, GridSize, DEFAULT_COLS, DEFAULT_ROWS};

/// Terminal type advertised to the shell
pub const TERM_NAME: &str = "xterm-color";

/// Bridge settings, read from the environment the gateway spawns it with
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub shell: String,
    pub grid: GridSize,
    pub cwd: PathBuf,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let shell = lookup(env::SHELL_PATH)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_shell);

        let cols = parse_dimension(lookup(env::PTY_COLS), DEFAULT_COLS);
        let rows = parse_dimension(lookup(env::PTY_ROWS), DEFAULT_ROWS);
        let grid = GridSize::new(cols, rows).unwrap_or_default();

        let cwd = lookup(env::PTY_CWD)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")));

        Self { shell, grid, cwd }
    }
}

fn default_shell() -> String {
    if cfg!(windows) {
        "powershell.exe".to_string()
    } else {
        "/bin/bash".to_string()
    }
}

fn parse_dimension(value: Option<String>, default: u16) -> u16 {
    value
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
