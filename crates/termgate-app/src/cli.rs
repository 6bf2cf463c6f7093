use clap::Parser;
use std::path::PathBuf;
use termgate_terminal::MAX_CONCURRENT_SESSIONS;

/// CLI arguments for termgate
#[derive(Parser, Debug)]
#[command(name = "termgate")]
#[command(about = "Interactive multi-session terminal gateway over WebSockets")]
#[command(version)]
pub struct Cli {
    /// Address to bind the server to
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory `workspace=none` and relative workspaces resolve against
    /// (default: current directory)
    #[arg(long, env = "TERMGATE_BASE_DIR", value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Working directory for sessions that request none
    /// (default: <base-dir>/WorkSpace)
    #[arg(long, env = "TERMGATE_WORKSPACE_DIR", value_name = "DIR")]
    pub workspace_dir: Option<PathBuf>,

    /// Bridge executable (default: termgate-bridge next to this binary)
    #[arg(long, env = "TERMGATE_BRIDGE", value_name = "PATH")]
    pub bridge_path: Option<PathBuf>,

    /// Shell the bridges run (default: platform shell)
    #[arg(long, env = "SHELL_PATH", value_name = "PATH")]
    pub shell: Option<String>,

    /// Initial columns when the client sends none
    #[arg(long, env = "TERMGATE_COLS", default_value_t = 120)]
    pub cols: u16,

    /// Initial rows when the client sends none
    #[arg(long, env = "TERMGATE_ROWS", default_value_t = 30)]
    pub rows: u16,

    /// Maximum number of concurrent sessions
    #[arg(long, env = "TERMGATE_MAX_SESSIONS", default_value_t = MAX_CONCURRENT_SESSIONS)]
    pub max_sessions: usize,

    /// Write a JSON-lines transcript per session into this directory
    #[arg(long, env = "TERMGATE_TRANSCRIPT_DIR", value_name = "DIR")]
    pub transcript_dir: Option<PathBuf>,

    /// Serve static files from this directory under /static
    #[arg(long, env = "TERMGATE_WEB_DIR", value_name = "DIR")]
    pub web_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "termgate",
            "--host",
            "127.0.0.1",
            "--port",
            "9001",
            "--cols",
            "100",
            "--rows",
            "40",
            "--max-sessions",
            "3",
            "--shell",
            "/bin/sh",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 9001);
        assert_eq!((cli.cols, cli.rows), (100, 40));
        assert_eq!(cli.max_sessions, 3);
        assert_eq!(cli.shell.as_deref(), Some("/bin/sh"));
        assert!(cli.verbose);
    }
}
