use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use termgate_protocol::GridSize;
use termgate_terminal::{LaunchOptions, ProcessLauncher, MAX_CONCURRENT_SESSIONS};

use crate::cli::Cli;

/// Name of the default session working directory under the base dir
pub const WORKSPACE_DIR_NAME: &str = "WorkSpace";

/// Resolved gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub base_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub bridge_path: PathBuf,
    pub shell: Option<String>,
    pub initial_grid: GridSize,
    pub max_sessions: usize,
    pub transcript_dir: Option<PathBuf>,
    pub web_dir: Option<PathBuf>,
}

impl GatewayConfig {
    /// Defaults for everything but the two paths; binds to an ephemeral
    /// loopback port.
    pub fn new(base_dir: PathBuf, bridge_path: PathBuf) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            workspace_dir: base_dir.join(WORKSPACE_DIR_NAME),
            base_dir,
            bridge_path,
            shell: None,
            initial_grid: GridSize::new(120, 30).unwrap_or_default(),
            max_sessions: MAX_CONCURRENT_SESSIONS,
            transcript_dir: None,
            web_dir: None,
        }
    }

    pub fn with_shell(mut self, shell: Option<String>) -> Self {
        self.shell = shell;
        self
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let bind_addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", cli.host, cli.port))?;

        let base_dir = match &cli.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let workspace_dir = cli
            .workspace_dir
            .clone()
            .unwrap_or_else(|| base_dir.join(WORKSPACE_DIR_NAME));
        let bridge_path = match &cli.bridge_path {
            Some(path) => path.clone(),
            None => ProcessLauncher::default_bridge_path()?,
        };
        let initial_grid =
            GridSize::new(cli.cols, cli.rows).context("--cols and --rows must be positive")?;

        Ok(Self {
            bind_addr,
            base_dir,
            workspace_dir,
            bridge_path,
            shell: cli.shell.clone(),
            initial_grid,
            max_sessions: cli.max_sessions,
            transcript_dir: cli.transcript_dir.clone(),
            web_dir: cli.web_dir.clone(),
        })
    }

    /// Create the default workspace and check the bridge is where we expect
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workspace_dir).with_context(|| {
            format!(
                "Failed to create workspace directory {}",
                self.workspace_dir.display()
            )
        })?;
        if !self.bridge_path.exists() {
            tracing::warn!(
                "Bridge executable not found at {}; sessions will fail to start",
                self.bridge_path.display()
            );
        }
        Ok(())
    }

    /// Working directory for a session given the client's `workspace`
    /// parameter: `none` means the base dir, relative paths are taken from
    /// the base dir, and no parameter means the default workspace.
    pub fn resolve_workspace(&self, requested: Option<&str>) -> PathBuf {
        match requested.map(str::trim).filter(|w| !w.is_empty()) {
            None => self.workspace_dir.clone(),
            Some("none") => self.base_dir.clone(),
            Some(path) => {
                let path = Path::new(path);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.base_dir.join(path)
                }
            }
        }
    }

    /// Initial grid from the client's `cols`/`rows`, when both are usable
    pub fn initial_grid(&self, cols: Option<i64>, rows: Option<i64>) -> GridSize {
        match (cols, rows) {
            (Some(cols), Some(rows)) => GridSize::from_signed(cols, rows).unwrap_or(self.initial_grid),
            _ => self.initial_grid,
        }
    }

    pub fn launch_options(
        &self,
        session_id: &str,
        workspace: Option<&str>,
        cols: Option<i64>,
        rows: Option<i64>,
    ) -> LaunchOptions {
        LaunchOptions {
            session_id: session_id.to_string(),
            grid: self.initial_grid(cols, rows),
            working_dir: self.resolve_workspace(workspace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn config() -> GatewayConfig {
        GatewayConfig::new(PathBuf::from("/srv/app"), PathBuf::from("/usr/bin/termgate-bridge"))
    }

    #[test]
    fn test_workspace_resolution() {
        let config = config();
        assert_eq!(config.resolve_workspace(None), PathBuf::from("/srv/app/WorkSpace"));
        assert_eq!(config.resolve_workspace(Some("")), PathBuf::from("/srv/app/WorkSpace"));
        assert_eq!(config.resolve_workspace(Some("none")), PathBuf::from("/srv/app"));
        assert_eq!(
            config.resolve_workspace(Some("projects/demo")),
            PathBuf::from("/srv/app/projects/demo")
        );
        assert_eq!(config.resolve_workspace(Some("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_client_grid_needs_both_positive_dimensions() {
        let config = config();
        let fallback = GridSize::new(120, 30).unwrap();
        assert_eq!(config.initial_grid(Some(80), Some(24)), GridSize::new(80, 24).unwrap());
        assert_eq!(config.initial_grid(Some(80), None), fallback);
        assert_eq!(config.initial_grid(Some(0), Some(24)), fallback);
        assert_eq!(config.initial_grid(None, None), fallback);
    }

    #[test]
    fn test_launch_options_combine_query_parameters() {
        let options = config().launch_options("s1", Some("none"), Some(100), Some(50));
        assert_eq!(options.session_id, "s1");
        assert_eq!(options.grid, GridSize::new(100, 50).unwrap());
        assert_eq!(options.working_dir, PathBuf::from("/srv/app"));
    }

    #[test]
    fn test_from_cli_derives_paths() {
        let cli = Cli::try_parse_from([
            "termgate",
            "--host",
            "127.0.0.1",
            "--port",
            "8123",
            "--base-dir",
            "/srv/app",
            "--bridge-path",
            "/opt/termgate-bridge",
        ])
        .unwrap();
        let config = GatewayConfig::from_cli(&cli).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8123".parse().unwrap());
        assert_eq!(config.workspace_dir, PathBuf::from("/srv/app/WorkSpace"));
        assert_eq!(config.bridge_path, PathBuf::from("/opt/termgate-bridge"));
    }

    #[test]
    fn test_zero_columns_are_rejected() {
        let cli = Cli::try_parse_from(["termgate", "--cols", "0", "--bridge-path", "/b"]).unwrap();
        assert!(GatewayConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_prepare_creates_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig::new(dir.path().to_path_buf(), dir.path().join("bridge"));
        config.prepare().unwrap();
        assert!(dir.path().join("WorkSpace").is_dir());
    }
}
