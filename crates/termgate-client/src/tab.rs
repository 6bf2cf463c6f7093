use tokio::task::JoinHandle;

use crate::connection::Connection;
use crate::resize::ResizeCoordinator;
use crate::surface::RenderSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// One terminal tab: a connection, a surface and a resize observer, owned
/// together and torn down together.
pub struct Tab {
    id: String,
    title: String,
    session_id: String,
    pub(crate) surface: Box<dyn RenderSurface>,
    pub(crate) connection: Option<Box<dyn Connection>>,
    /// Task driving the current connection's incoming traffic
    pub(crate) pump: Option<JoinHandle<()>>,
    pub(crate) generation: u64,
    pub(crate) status: TabStatus,
    pub(crate) resize: ResizeCoordinator,
}

impl Tab {
    pub(crate) fn new(
        id: String,
        title: String,
        surface: Box<dyn RenderSurface>,
        resize: ResizeCoordinator,
    ) -> Self {
        Self {
            session_id: id.clone(),
            id,
            title,
            surface,
            connection: None,
            pump: None,
            generation: 0,
            status: TabStatus::Connecting,
            resize,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Gateway session this tab is attached to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> TabStatus {
        self.status
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn resize_pending(&self) -> bool {
        self.resize.is_pending()
    }

    /// Drop the current connection and its pump, if any
    pub(crate) fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    /// Release everything the tab owns. Safe to call more than once.
    pub(crate) fn shutdown(&mut self) {
        self.drop_connection();
        self.resize.disconnect();
        if !self.surface.is_disposed() {
            self.surface.dispose();
        }
        self.status = TabStatus::Disconnected;
    }
}

impl Drop for Tab {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
