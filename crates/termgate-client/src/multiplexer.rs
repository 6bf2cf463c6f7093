use std::sync::Arc;

use termgate_protocol::{banner, ControlFrame, GridSize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::connection::{Connection, Connector, Incoming};
use crate::error::ClientError;
use crate::resize::{ContainerSize, ResizeCoordinator};
use crate::surface::SurfaceFactory;
use crate::tab::{Tab, TabStatus};
use crate::ClientConfig;

/// Event raised by a tab's connection task or resize timer
pub(crate) struct TabEvent {
    tab: String,
    generation: u64,
    kind: EventKind,
}

enum EventKind {
    Opened(Box<dyn Connection>),
    Output(Vec<u8>),
    Closed(Option<String>),
    ResizeDue,
}

/// What processing one event changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabUpdate {
    Connected { tab: String },
    Output { tab: String, bytes: usize },
    Disconnected { tab: String, reason: Option<String> },
    /// Resize sent to the gateway
    Resized { tab: String, grid: GridSize },
    /// Surface refitted while no connection was open
    Fitted { tab: String, grid: GridSize },
    /// Stale, redundant or for a tab that no longer exists
    Ignored,
}

/// Owns every open tab and routes connection and timer events to them
pub struct Multiplexer {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    surfaces: Arc<dyn SurfaceFactory>,
    tabs: Vec<Tab>,
    active: Option<String>,
    opened: usize,
    events_tx: mpsc::UnboundedSender<TabEvent>,
    events_rx: mpsc::UnboundedReceiver<TabEvent>,
}

impl Multiplexer {
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        surfaces: Arc<dyn SurfaceFactory>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            surfaces,
            tabs: Vec::new(),
            active: None,
            opened: 0,
            events_tx,
            events_rx,
        }
    }

    /// Create a tab with a fresh session id, start connecting it and make
    /// it the active tab. Returns the tab id.
    pub fn open_tab(&mut self) -> Result<String, ClientError> {
        let id = format!("term-{}", Uuid::new_v4());
        let url = self.config.session_url(&id)?;

        self.opened += 1;
        let title = format!("Terminal {}", self.opened);
        let surface = self.surfaces.create(self.config.initial_grid);
        let mut resize = ResizeCoordinator::new(self.config.debounce, self.config.cell);
        resize.observe();

        let mut tab = Tab::new(id.clone(), title, surface, resize);
        tab.pump = Some(spawn_connection(
            self.connector.clone(),
            self.events_tx.clone(),
            id.clone(),
            tab.generation,
            url,
        ));
        self.tabs.push(tab);
        self.select_tab(&id)?;

        tracing::info!(tab = %id, "Opened tab");
        Ok(id)
    }

    /// Show one tab and hide the rest. Connections are left alone.
    pub fn select_tab(&mut self, id: &str) -> Result<(), ClientError> {
        if !self.tabs.iter().any(|t| t.id() == id) {
            return Err(ClientError::UnknownTab(id.to_string()));
        }
        for tab in &mut self.tabs {
            let visible = tab.id() == id;
            tab.surface.set_visible(visible);
        }
        self.active = Some(id.to_string());
        Ok(())
    }

    /// Close a tab's connection, dispose its surface, stop its resize
    /// observer and forget it. Returns false if there was no such tab.
    pub fn close_tab(&mut self, id: &str) -> bool {
        let Some(index) = self.tabs.iter().position(|t| t.id() == id) else {
            return false;
        };
        let mut tab = self.tabs.remove(index);
        tab.shutdown();
        tracing::info!(tab = %id, "Closed tab");

        if self.active.as_deref() == Some(id) {
            self.active = None;
            if let Some(next) = self.tabs.last().map(|t| t.id().to_string()) {
                let _ = self.select_tab(&next);
            }
        }
        true
    }

    /// Reconnect a tab to its session with a new connection
    pub fn reopen_tab(&mut self, id: &str) -> Result<(), ClientError> {
        let session_id = self.tab_mut(id)?.session_id().to_string();
        let url = self.config.session_url(&session_id)?;
        let connector = self.connector.clone();
        let events = self.events_tx.clone();

        let tab = self.tab_mut(id)?;
        tab.drop_connection();
        tab.resize.reset();
        tab.generation += 1;
        tab.status = TabStatus::Connecting;
        tab.pump = Some(spawn_connection(
            connector,
            events,
            id.to_string(),
            tab.generation,
            url,
        ));

        tracing::info!(tab = %id, generation = tab.generation, "Reopening tab");
        Ok(())
    }

    /// Forward keystrokes to a tab's session
    pub fn send_input(&mut self, id: &str, data: &str) -> Result<(), ClientError> {
        let tab = self.tab_mut(id)?;
        if tab.status != TabStatus::Connected {
            return Err(ClientError::NotConnected(id.to_string()));
        }
        let connection = tab
            .connection
            .as_mut()
            .ok_or_else(|| ClientError::NotConnected(id.to_string()))?;
        connection.send(&ControlFrame::input(data))
    }

    /// Resize observer callback for a tab's container
    pub fn container_resized(&mut self, id: &str, size: ContainerSize) -> Result<bool, ClientError> {
        let events = self.events_tx.clone();
        let tab = self.tab_mut(id)?;
        let event_tab = tab.id().to_string();
        let generation = tab.generation;
        Ok(tab.resize.container_resized(size, move || {
            let _ = events.send(TabEvent {
                tab: event_tab,
                generation,
                kind: EventKind::ResizeDue,
            });
        }))
    }

    /// Wait for and handle the next event
    pub async fn process_next(&mut self) -> Option<TabUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.handle(event))
    }

    /// Handle every event that is already queued
    pub fn process_pending(&mut self) -> Vec<TabUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.push(self.handle(event));
        }
        updates
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id() == id)
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active.as_deref()?)
    }

    fn tab_mut(&mut self, id: &str) -> Result<&mut Tab, ClientError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| ClientError::UnknownTab(id.to_string()))
    }

    fn handle(&mut self, event: TabEvent) -> TabUpdate {
        let TabEvent {
            tab: id,
            generation,
            kind,
        } = event;

        let Some(tab) = self
            .tabs
            .iter_mut()
            .find(|t| t.id() == id && t.generation == generation)
        else {
            if let EventKind::Opened(mut connection) = kind {
                connection.close();
            }
            return TabUpdate::Ignored;
        };

        match kind {
            EventKind::Opened(mut connection) => {
                if tab.status != TabStatus::Connecting {
                    connection.close();
                    return TabUpdate::Ignored;
                }
                let grid = tab.surface.grid();
                match connection.send(&ControlFrame::resize(grid)) {
                    Ok(()) => tab.resize.applied(grid),
                    Err(e) => tracing::warn!(tab = %id, "Initial resize failed: {}", e),
                }
                tab.connection = Some(connection);
                tab.status = TabStatus::Connected;
                tracing::debug!(tab = %id, grid = %grid, "Connected");
                TabUpdate::Connected { tab: id }
            }
            EventKind::Output(bytes) => {
                if tab.status != TabStatus::Connected {
                    return TabUpdate::Ignored;
                }
                tab.surface.write(&bytes);
                TabUpdate::Output {
                    tab: id,
                    bytes: bytes.len(),
                }
            }
            EventKind::Closed(reason) => {
                if let Some(mut connection) = tab.connection.take() {
                    connection.close();
                }
                tab.pump = None;
                tab.resize.cancel();
                tab.status = TabStatus::Disconnected;
                tab.surface.write(banner::disconnected().as_bytes());
                tracing::info!(tab = %id, reason = ?reason, "Disconnected");
                TabUpdate::Disconnected { tab: id, reason }
            }
            EventKind::ResizeDue => {
                let Some(grid) = tab.resize.take_due() else {
                    return TabUpdate::Ignored;
                };
                tab.surface.fit(grid);

                let connection = match (tab.status, tab.connection.as_mut()) {
                    (TabStatus::Connected, Some(connection)) => connection,
                    _ => return TabUpdate::Fitted { tab: id, grid },
                };
                match connection.send(&ControlFrame::resize(grid)) {
                    Ok(()) => {
                        tab.resize.applied(grid);
                        tracing::debug!(tab = %id, grid = %grid, "Resize sent");
                        TabUpdate::Resized { tab: id, grid }
                    }
                    Err(e) => {
                        tracing::warn!(tab = %id, "Resize failed: {}", e);
                        TabUpdate::Fitted { tab: id, grid }
                    }
                }
            }
        }
    }
}

/// Connect in the background and turn the connection's traffic into events
/// tagged with the tab and generation they belong to.
fn spawn_connection(
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<TabEvent>,
    tab: String,
    generation: u64,
    url: Url,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = |kind: EventKind| {
            events
                .send(TabEvent {
                    tab: tab.clone(),
                    generation,
                    kind,
                })
                .is_ok()
        };

        match connector.connect(&url).await {
            Ok((connection, mut incoming)) => {
                if !send(EventKind::Opened(connection)) {
                    return;
                }
                while let Some(message) = incoming.recv().await {
                    match message {
                        Incoming::Data(bytes) => {
                            if !send(EventKind::Output(bytes)) {
                                return;
                            }
                        }
                        Incoming::Closed(reason) => {
                            send(EventKind::Closed(reason));
                            return;
                        }
                    }
                }
                send(EventKind::Closed(None));
            }
            Err(e) => {
                tracing::warn!(tab = %tab, "Connection failed: {}", e);
                send(EventKind::Closed(Some(e.to_string())));
            }
        }
    })
}
