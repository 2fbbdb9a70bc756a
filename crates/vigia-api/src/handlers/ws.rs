//! WebSocket handler for real-time call and extension updates
//!
//! Each connected client gets its own subscription to the broadcast hub;
//! frames are pushed as they happen, there is no polling.

use crate::broadcast::{WsBroadcaster, WsMessage};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// WebSocket connection handler
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    hub: web::Data<Arc<WsBroadcaster>>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    info!(client = %client_ip, "WebSocket connection established");

    let hub = hub.get_ref().clone();
    actix_web::rt::spawn(async move {
        ws_session(session, msg_stream, hub, client_ip).await;
    });

    Ok(response)
}

/// Handle one WebSocket session
async fn ws_session(
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    hub: Arc<WsBroadcaster>,
    client_ip: String,
) {
    let mut updates = hub.subscribe();
    let mut ping_interval = interval(Duration::from_secs(30));
    // the first tick fires immediately; skip it
    ping_interval.tick().await;

    loop {
        tokio::select! {
            // Handle incoming messages
            Some(msg) = msg_stream.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        debug!(client = %client_ip, "Received text: {}", text);
                        if text.contains("ping") {
                            if let Ok(json) = serde_json::to_string(&WsMessage::Pong) {
                                let _ = session.text(json).await;
                            }
                        }
                    }
                    Ok(Message::Ping(msg)) => {
                        if session.pong(&msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(reason)) => {
                        info!(client = %client_ip, "Client closed connection: {:?}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(client = %client_ip, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            // Push live updates
            update = updates.recv() => {
                match update {
                    Ok(msg) => {
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if session.text(json).await.is_err() {
                                    warn!(client = %client_ip, "Failed to push update, closing connection");
                                    break;
                                }
                            }
                            Err(e) => error!(client = %client_ip, "Serialization error: {}", e),
                        }
                    }
                    // a slow client missed frames; keep going with the fresh ones
                    Err(RecvError::Lagged(missed)) => {
                        warn!(client = %client_ip, missed, "Client lagged behind the update stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // Keep the connection alive
            _ = ping_interval.tick() => {
                if session.ping(b"").await.is_err() {
                    warn!(client = %client_ip, "Failed to send ping, closing connection");
                    break;
                }
            }
        }
    }

    info!(client = %client_ip, "WebSocket connection closed");
    let _ = session.close(None).await;
}
