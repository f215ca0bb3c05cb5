//! Downstream WebSocket server
//!
//! Routes:
//! - `/`, `/ws`, `/stream`: WebSocket upgrade, verdict frames pushed as text
//! - `/health`: `OK`
//! - `/status`: JSON counters

use crate::error::Result;
use crate::publisher::encode;
use crate::state::VerifierState;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::Frame;
use warp::ws::{Message, WebSocket};
use warp::Filter;

/// Bind the server and serve until `shutdown` resolves.
///
/// Returns the bound address (useful with port 0) and the server task.
pub fn bind(
    state: Arc<VerifierState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let ws_state = state.clone();
    let ws_handler = move |ws: warp::ws::Ws, peer: Option<SocketAddr>| {
        let state = ws_state.clone();
        async move {
            Ok::<_, warp::Rejection>(
                ws.on_upgrade(move |socket| handle_connection(state, socket, peer)),
            )
        }
    };

    let ws_root = warp::path::end()
        .and(warp::ws())
        .and(warp::addr::remote())
        .and_then(ws_handler.clone());
    let ws_route = warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and_then(ws_handler.clone());
    // Alias kept for dashboards that connect to /stream
    let ws_stream_route = warp::path("stream")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::addr::remote())
        .and_then(ws_handler);

    let health_route = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let status_state = state;
    let status_route = warp::path("status")
        .and(warp::get())
        .map(move || warp::reply::json(&status_state.status()));

    let routes = ws_root
        .or(ws_route)
        .or(ws_stream_route)
        .or(health_route)
        .or(status_route);

    let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!("Verdict server listening on {}", bound);
    Ok((bound, tokio::spawn(server)))
}

async fn handle_connection(state: Arc<VerifierState>, ws: WebSocket, peer: Option<SocketAddr>) {
    let label = peer.map_or_else(|| "unknown".to_string(), |p| p.to_string());

    let greeting = if state.snapshot_on_connect {
        match encode(&Frame::Stats(state.stats_frame())) {
            Ok(frame) => Some(frame),
            Err(e) => {
                error!("Failed to encode stats snapshot: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (id, mut rx) = match state.registry.register(label.clone(), greeting) {
        Ok(registered) => registered,
        Err(e) => {
            warn!(peer = %label, "Rejecting subscriber: {}", e);
            let _ = ws.close().await;
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws.split();

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if let Err(e) = ws_sender.send(Message::text(&*text)).await {
                            warn!(subscriber = %id, "Failed to send frame: {}", e);
                            break;
                        }
                    }
                    None => {
                        // Released by the registry: queue drained, close politely
                        let _ = ws_sender.send(Message::close()).await;
                        break;
                    }
                }
            }

            ws_msg = ws_receiver.next() => {
                match ws_msg {
                    Some(Ok(msg)) if msg.is_close() => {
                        info!(subscriber = %id, "Subscriber disconnected");
                        break;
                    }
                    // Client-to-server frames carry no meaning
                    Some(Ok(_)) => debug!(subscriber = %id, "Ignoring client frame"),
                    Some(Err(e)) => {
                        warn!(subscriber = %id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.registry.remove(id);
}
