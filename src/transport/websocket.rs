//! WebSocket transport
//!
//! Minimal WebSocket server translating protocol JSON into broker calls.
//! Responsibilities:
//! - Accept TCP/WebSocket connections
//! - Enforce attach-first: a connection must `attach` a subscriber name
//!   before any other command
//! - Pump the attached subscriber's inbox to the socket as `delivery` frames
//! - Detach the subscriber when the connection goes away
//!
//! Broker calls are synchronous and short; they run inline on the
//! connection task. Only the socket writer awaits on the network.
//!
//! The writer queue is bounded. A peer that stops reading stalls the writer,
//! then the pump, and finally leaves the subscriber's inbox full, so the
//! broker's delivery timeout and drop accounting apply to slow sockets too.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::subscriber::Subscriber;
use crate::transport::message::{ClientMessage, ServerMessage};

/// Frames queued for one connection's socket writer.
const OUTBOUND_CAPACITY: usize = 16;

/// Binds `addr` and serves connections until the task is dropped.
pub async fn start_websocket_server(addr: &str, broker: Broker) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, broker).await;
    Ok(())
}

pub async fn serve(listener: TcpListener, broker: Broker) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                spawn(handle_connection(stream, peer, broker.clone()));
            }
            Err(e) => error!("Failed to accept connection: {e}"),
        }
    }
}

/// The subscriber attached by one connection and the task forwarding its inbox.
struct Session {
    subscriber: Arc<Subscriber>,
    pump: JoinHandle<()>,
}

impl Session {
    fn open(broker: &Broker, name: &str, out: &mpsc::Sender<ServerMessage>) -> Self {
        let subscriber = broker.attach(name);
        let out = out.clone();
        let inbox = subscriber.take_inbox();

        let pump = spawn(async move {
            let Some(mut inbox) = inbox else {
                return;
            };
            while let Some(message) = inbox.next().await {
                if out.send(ServerMessage::Delivery { message }).await.is_err() {
                    break;
                }
            }
            debug!(subscriber = inbox.name(), "inbox pump finished");
        });

        Self { subscriber, pump }
    }

    // Detaching closes the inbox, which ends the pump on its own.
    async fn close(self, broker: &Broker) {
        broker.detach(&self.subscriber);
        let _ = self.pump.await;
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, broker: Broker) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake error: {e}");
            return;
        }
    };
    debug!(%peer, "connection accepted");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    let writer = spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {e}");
                    continue;
                }
            };
            if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                warn!(%peer, "Failed to send message: {e}");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut session: Option<Session> = None;

    while let Some(frame) = ws_receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%peer, "WebSocket read error: {e}");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        if !frame.is_text() {
            continue;
        }
        let Ok(text) = frame.to_text() else {
            continue;
        };

        let reply = match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Attach { name }) => {
                if let Some(current) = &session {
                    ServerMessage::error(
                        "already_attached",
                        format!("connection is attached as {}", current.subscriber.name()),
                    )
                } else if name.is_empty() {
                    ServerMessage::error("invalid_name", "subscriber name must not be empty")
                } else {
                    session = Some(Session::open(&broker, &name, &tx));
                    ServerMessage::Attached { name }
                }
            }
            Ok(ClientMessage::Detach) => match session.take() {
                Some(current) => {
                    current.close(&broker).await;
                    ServerMessage::Detached
                }
                None => not_attached(),
            },
            Ok(command) => match &session {
                Some(current) => dispatch(&broker, &current.subscriber, command),
                None => not_attached(),
            },
            Err(e) => {
                warn!(%peer, "Invalid client message: {e} | {text}");
                ServerMessage::error("invalid_message", e.to_string())
            }
        };

        if tx.send(reply).await.is_err() {
            break;
        }
    }

    if let Some(current) = session.take() {
        current.close(&broker).await;
    }
    drop(tx);
    let _ = writer.await;
    info!(%peer, "connection closed");
}

/// Runs one command on behalf of the connection's subscriber `me`.
pub fn dispatch(broker: &Broker, me: &Arc<Subscriber>, command: ClientMessage) -> ServerMessage {
    let name = me.name();

    let outcome = match command {
        ClientMessage::Subscribe { topic } => broker
            .subscribe(me, &topic)
            .map(|()| format!("{name} subscribed to {topic}")),
        ClientMessage::Unsubscribe { topic } => {
            broker.unsubscribe(me, &topic);
            Ok(format!("{name} unsubscribed from {topic}"))
        }
        ClientMessage::CreateTopic {
            name: topic,
            limit,
            admin,
        } => {
            broker.create_topic(&topic, limit, admin.as_deref());
            Ok(format!("{topic} created"))
        }
        ClientMessage::Join {
            topic,
            admin,
            promote,
        } => broker
            .join_group(me, &topic, &admin, promote)
            .map(|()| format!("{name} joined {topic}")),
        ClientMessage::Leave { topic, admin } => broker
            .leave_group(me, &topic, &admin)
            .map(|()| format!("{name} left {topic}")),
        ClientMessage::Broadcast { topic, payload } => broker
            .broadcast(&payload, name, &topic)
            .map(|()| format!("{name} published to {topic}")),
        ClientMessage::Send { receiver, payload } => broker
            .send(&payload, name, &receiver)
            .map(|()| format!("{name} sent a message to {receiver}")),
        ClientMessage::History { topic } => {
            let records = broker.get_history(&topic);
            return ServerMessage::History { topic, records };
        }
        ClientMessage::MemberCount { topic } => {
            let count = broker.member_count(&topic);
            return ServerMessage::MemberCount { topic, count };
        }
        ClientMessage::Attach { .. } | ClientMessage::Detach => {
            return ServerMessage::error(
                "session_command",
                "attach and detach are handled by the connection",
            );
        }
    };

    match outcome {
        Ok(message) => ServerMessage::Ok { message },
        Err(err) => err.into(),
    }
}

fn not_attached() -> ServerMessage {
    ServerMessage::error("not_attached", "attach a subscriber name first")
}
