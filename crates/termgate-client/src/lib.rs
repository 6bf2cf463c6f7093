//! Client side of the terminal gateway.
//!
//! A [`Multiplexer`] owns a set of tabs. Each tab pairs one gateway
//! connection, one render surface and one resize coordinator, and is torn
//! down as a unit.

pub mod connection;
mod debounce;
mod error;
mod multiplexer;
mod resize;
pub mod surface;
mod tab;

use std::time::Duration;

use termgate_protocol::GridSize;
use url::Url;

pub use connection::{Connection, Connector, Incoming, WsConnector};
pub use debounce::Debouncer;
pub use error::ClientError;
pub use multiplexer::{Multiplexer, TabUpdate};
pub use resize::{CellMetrics, ContainerSize, ResizeCoordinator};
pub use surface::{RenderSurface, SurfaceFactory, Vt100Factory, Vt100Surface};
pub use tab::{Tab, TabStatus};

/// Resize observer debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway base url, e.g. `ws://127.0.0.1:8000`
    pub gateway_url: String,
    pub debounce: Duration,
    pub cell: CellMetrics,
    /// Grid new surfaces start with, before any container size is known
    pub initial_grid: GridSize,
    /// Working directory requested for new sessions
    pub workspace: Option<String>,
}

impl ClientConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            debounce: DEFAULT_DEBOUNCE,
            cell: CellMetrics::default(),
            initial_grid: GridSize::default(),
            workspace: None,
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Connection target for one session
    pub fn session_url(&self, session_id: &str) -> Result<Url, ClientError> {
        let mut base = Url::parse(&self.gateway_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut url = base.join(&format!("terminal/{}", session_id))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("cols", &self.initial_grid.cols().to_string())
                .append_pair("rows", &self.initial_grid.rows().to_string());
            if let Some(workspace) = &self.workspace {
                query.append_pair("workspace", workspace);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_carries_grid_and_workspace() {
        let config = ClientConfig::new("ws://127.0.0.1:8000").with_workspace("none");
        let url = config.session_url("term-1").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8000/terminal/term-1?cols=80&rows=24&workspace=none"
        );
    }

    #[test]
    fn test_session_url_keeps_base_path() {
        let config = ClientConfig::new("wss://example.com/gateway");
        let url = config.session_url("abc").unwrap();
        assert_eq!(url.path(), "/gateway/terminal/abc");
    }

    #[test]
    fn test_bad_gateway_url_is_an_error() {
        let config = ClientConfig::new("not a url");
        assert!(matches!(config.session_url("x"), Err(ClientError::Url(_))));
    }
}
