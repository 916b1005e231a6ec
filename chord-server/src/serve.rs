//! TCP listener and the accept loop: one task per WebSocket connection,
//! matching the teacher relay's thread-per-connection shape but using async
//! tasks instead of OS threads, since the engine run per request is pure CPU
//! and the connection itself spends most of its time waiting on I/O.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::corpus;
use crate::state::ServerState;

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = load_state(&config)?;
    println!(
        "loaded stat sets: {} known chords across major/parallel-minor/relative-minor",
        state.all_chords.len()
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    println!("Chord server listening on {}", listener.local_addr()?);
    println!("Press Ctrl+C to stop.");

    accept_loop(listener, state).await
}

/// Bind a listener and load state without starting the accept loop — split
/// out so tests can bind to an OS-assigned port (`127.0.0.1:0`), read back
/// the real address, and drive `accept_loop` directly.
pub async fn bind(config: &ServerConfig) -> Result<(TcpListener, Arc<ServerState>), Box<dyn std::error::Error>> {
    let state = load_state(config)?;
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    Ok((listener, state))
}

/// Accept connections until Ctrl+C. Each connection runs its own request
/// loop on its own task; a broken connection never brings down the others.
pub async fn accept_loop(listener: TcpListener, state: Arc<ServerState>) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let state = state.clone();
                tokio::spawn(async move {
                    println!("connection from {peer}");
                    if let Err(e) = handle_connection(stream, state).await {
                        eprintln!("connection {peer} closed: {e}");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                return Ok(());
            }
        }
    }
}

/// Load the cached `StatSet` snapshot if present, otherwise parse the
/// corpora fresh. `chord-server build-stats` is how an operator refreshes
/// the snapshot; the server itself never reparses on every request.
fn load_state(config: &ServerConfig) -> Result<Arc<ServerState>, Box<dyn std::error::Error>> {
    let stats = if config.cache_path.exists() {
        println!("loading stat sets from {}", config.cache_path.display());
        crate::cache::load(&config.cache_path)?
    } else {
        println!("no stat set snapshot found, parsing corpora from {}", config.corpus_dir.display());
        corpus::build_from_disk(config)?
    };
    Ok(ServerState::new(stats, config.default_recommendations))
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> Result<(), Box<dyn std::error::Error>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = msg?;
        if !msg.is_text() {
            continue;
        }
        let reply = crate::connection::handle_message(&state, msg.to_text()?);
        write.send(Message::Text(reply)).await?;
    }
    Ok(())
}
