//! Chat relay server binary.
//!
//! Serves WebSocket chat rooms with broadcast fan-out. The demo setup uses
//! the in-memory store with one open room and header-based identity; a real
//! deployment supplies its own `RoomStore` and auth middleware.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomcast-server
//! cargo run --bin roomcast-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;

use roomcast::{
    common::logger::setup_logger,
    domain::RoomId,
    hub::{Hub, HubConfig},
    infrastructure::store::InMemoryRoomStore,
    session::SessionConfig,
    ui::{AppState, run_server},
};

#[derive(Parser, Debug)]
#[command(name = "roomcast-server")]
#[command(about = "Real-time chat relay with room-scoped broadcast", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Deliver each broadcast back to its sender as well
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    self_echo: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // 1. Persistence collaborator (in-memory for the demo), with one open
    // room so any authenticated user can connect right away.
    let store = Arc::new(InMemoryRoomStore::new());
    let lobby = RoomId::new("lobby".to_string()).expect("static room id is valid");
    store.add_open_room(lobby.clone(), "Lobby").await;

    // 2. Hub loop, the single owner of room membership.
    let (hub, hub_loop) = Hub::new(HubConfig {
        self_echo: args.self_echo,
        ..HubConfig::default()
    });
    tokio::spawn(hub_loop.run());
    if let Err(e) = hub.create_room(lobby).await {
        tracing::error!("hub failed to start: {}", e);
        std::process::exit(1);
    }

    // 3. Shared state and server.
    let state = Arc::new(AppState {
        hub,
        store,
        session_config: SessionConfig::default(),
    });
    if let Err(e) = run_server(args.host, args.port, state).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}
