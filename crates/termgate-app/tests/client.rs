//! The native multiplexer against a live gateway.
#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use termgate::{GatewayConfig, WebServer};
use termgate_client::{
    ClientConfig, ContainerSize, Multiplexer, TabStatus, TabUpdate, Vt100Factory, WsConnector,
};
use termgate_protocol::GridSize;
use termgate_terminal::SessionRegistry;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

async fn start_gateway() -> (String, Arc<SessionRegistry>, tempfile::TempDir) {
    let base = tempfile::tempdir().unwrap();
    let config = GatewayConfig::new(
        base.path().to_path_buf(),
        PathBuf::from(env!("CARGO_BIN_EXE_termgate-bridge")),
    )
    .with_shell(Some("/bin/sh".to_string()));
    config.prepare().unwrap();

    let server = WebServer::new(config);
    let registry = server.registry();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(server.serve(listener, std::future::pending()));

    (url, registry, base)
}

/// Drive the multiplexer until `done` holds
async fn pump_until(mux: &mut Multiplexer, what: &str, done: impl Fn(&Multiplexer) -> bool) {
    let reached = timeout(WAIT, async {
        while !done(mux) {
            if mux.process_next().await.is_none() {
                break;
            }
        }
    })
    .await;
    assert!(reached.is_ok() && done(mux), "never reached: {what}");
}

fn screen_contains(mux: &Multiplexer, tab: &str, needle: &str) -> bool {
    mux.tab(tab)
        .map(|t| t.surface().contents().contains(needle))
        .unwrap_or(false)
}

#[tokio::test]
async fn test_tab_follows_its_container() {
    let (url, registry, _base) = start_gateway().await;
    let mut mux = Multiplexer::new(
        ClientConfig::new(url),
        Arc::new(WsConnector),
        Arc::new(Vt100Factory::default()),
    );

    let tab = mux.open_tab().unwrap();
    let session_id = mux.tab(&tab).unwrap().session_id().to_string();
    pump_until(&mut mux, "connected", |m| {
        m.tab(&tab).map(|t| t.status()) == Some(TabStatus::Connected)
    })
    .await;
    pump_until(&mut mux, "banner", |m| screen_contains(m, &tab, "Connected to session")).await;

    // 981x510 pixels at 9x17 per cell
    for step in 0..10 {
        let size = ContainerSize::new(900.0 + step as f64 * 9.0, 510.0);
        mux.container_resized(&tab, size).unwrap();
    }
    assert!(mux.container_resized(&tab, ContainerSize::new(981.0, 510.0)).unwrap());

    let resized = timeout(WAIT, async {
        loop {
            match mux.process_next().await {
                Some(TabUpdate::Resized { grid, .. }) => return grid,
                Some(_) => continue,
                None => panic!("event stream ended"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(resized, GridSize::new(109, 30).unwrap());

    mux.send_input(&tab, "stty size\n").unwrap();
    pump_until(&mut mux, "new size in the shell", |m| screen_contains(m, &tab, "30 109")).await;
    assert_eq!(registry.grid(&session_id).await, GridSize::new(109, 30));

    assert!(mux.close_tab(&tab));
    let emptied = timeout(WAIT, async {
        while !registry.is_empty().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(emptied.is_ok(), "session outlived its tab");
}

#[tokio::test]
async fn test_tabs_get_their_own_shells() {
    let (url, registry, _base) = start_gateway().await;
    let mut mux = Multiplexer::new(
        ClientConfig::new(url),
        Arc::new(WsConnector),
        Arc::new(Vt100Factory::default()),
    );

    let first = mux.open_tab().unwrap();
    let second = mux.open_tab().unwrap();
    assert_eq!(mux.active_tab().map(|t| t.id().to_string()), Some(second.clone()));

    pump_until(&mut mux, "both connected", |m| {
        m.tabs().iter().all(|t| t.status() == TabStatus::Connected)
    })
    .await;
    assert_eq!(registry.len().await, 2);

    mux.send_input(&first, "echo first-$((40+2))\n").unwrap();
    pump_until(&mut mux, "first output", |m| screen_contains(m, &first, "first-42")).await;
    assert!(!screen_contains(&mux, &second, "first-42"));
}
