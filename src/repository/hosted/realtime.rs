//! Realtime Channel Client
//!
//! One websocket per client, speaking the Phoenix channel protocol. Every
//! subscription joins its own topic listening to `postgres_changes` on a
//! single table; dropping the subscription leaves the topic. A heartbeat
//! keeps the socket alive. There is no reconnect: when the socket closes,
//! every open subscription sees its channel end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::Endpoint;
use crate::domain::Table;
use crate::repository::change::{ChangeEvent, ChangeKind, ChangeSubscription};
use crate::repository::error::{BackendError, BackendResult};
use crate::repository::traits::ChangeFeed;
use crate::session::SessionProvider;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Join {
        topic: String,
        table: Table,
        access_token: Option<String>,
        tx: mpsc::UnboundedSender<ChangeEvent>,
    },
    Leave {
        topic: String,
    },
}

#[derive(Clone)]
pub struct RealtimeClient {
    commands: mpsc::UnboundedSender<Command>,
    session: Arc<dyn SessionProvider>,
    next_topic: Arc<AtomicU64>,
}

impl RealtimeClient {
    /// Open the socket and start its driver task
    pub async fn connect(
        endpoint: &Endpoint,
        session: Arc<dyn SessionProvider>,
    ) -> BackendResult<Self> {
        let url = socket_url(endpoint);
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::info!("realtime socket connected to {}", endpoint.base_url());

        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(socket, rx));

        Ok(Self {
            commands,
            session,
            next_topic: Arc::new(AtomicU64::new(1)),
        })
    }
}

impl ChangeFeed for RealtimeClient {
    fn subscribe(&self, table: Table) -> BackendResult<ChangeSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let n = self.next_topic.fetch_add(1, Ordering::Relaxed);
        let topic = format!("realtime:{}-changes-{}", table, n);
        let access_token = self.session.current().and_then(|s| s.access_token);

        self.commands
            .send(Command::Join {
                topic: topic.clone(),
                table,
                access_token,
                tx,
            })
            .map_err(|_| BackendError::ChannelClosed)?;

        let commands = self.commands.clone();
        Ok(ChangeSubscription::new(table, rx).on_release(move || {
            let _ = commands.send(Command::Leave { topic });
        }))
    }
}

pub(crate) fn socket_url(endpoint: &Endpoint) -> String {
    let base = endpoint.base_url();
    let ws_base = if let Some(host) = base.strip_prefix("https://") {
        format!("wss://{}", host)
    } else if let Some(host) = base.strip_prefix("http://") {
        format!("ws://{}", host)
    } else {
        base.to_string()
    };
    format!(
        "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
        ws_base,
        utf8_percent_encode(endpoint.anon_key(), NON_ALPHANUMERIC)
    )
}

fn join_frame(topic: &str, table: Table, access_token: Option<&str>, msg_ref: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "ref": msg_ref.to_string(),
        "join_ref": msg_ref.to_string(),
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table.as_str() }
                ]
            },
            "access_token": access_token
        }
    })
}

fn leave_frame(topic: &str, msg_ref: u64) -> Value {
    json!({ "topic": topic, "event": "phx_leave", "ref": msg_ref.to_string(), "payload": {} })
}

fn heartbeat_frame(msg_ref: u64) -> Value {
    json!({ "topic": "phoenix", "event": "heartbeat", "ref": msg_ref.to_string(), "payload": {} })
}

/// Change event carried by a `postgres_changes` payload
pub fn parse_postgres_change(payload: &Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let event = ChangeKind::parse(data.get("type")?.as_str()?)?;
    let table = Table::from_name(data.get("table")?.as_str()?)?;
    let schema = data
        .get("schema")
        .and_then(Value::as_str)
        .unwrap_or("public")
        .to_string();
    let row = |key: &str| {
        data.get(key)
            .and_then(Value::as_object)
            .filter(|row| !row.is_empty())
            .cloned()
    };

    Some(ChangeEvent {
        event,
        schema,
        table,
        new: row("record"),
        old: row("old_record"),
    })
}

fn dispatch(text: &str, topics: &mut HashMap<String, mpsc::UnboundedSender<ChangeEvent>>) {
    let Ok(message) = serde_json::from_str::<Value>(text) else {
        tracing::warn!("realtime: unparseable frame");
        return;
    };
    let topic = message.get("topic").and_then(Value::as_str).unwrap_or_default();
    let event = message.get("event").and_then(Value::as_str).unwrap_or_default();

    match event {
        "postgres_changes" => {
            let Some(change) = message.get("payload").and_then(parse_postgres_change) else {
                tracing::warn!("realtime: malformed change on {}", topic);
                return;
            };
            let delivered = topics.get(topic).map(|tx| tx.send(change).is_ok());
            if delivered == Some(false) {
                topics.remove(topic);
            }
        }
        "phx_reply" => {
            let status = message
                .pointer("/payload/status")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if status != "ok" {
                tracing::warn!("realtime: {} replied {}", topic, status);
            }
        }
        "phx_error" | "phx_close" => {
            tracing::warn!("realtime: channel {} closed by server ({})", topic, event);
            topics.remove(topic);
        }
        _ => {}
    }
}

async fn run_socket(socket: Socket, mut commands: mpsc::UnboundedReceiver<Command>) {
    let (mut sink, mut stream) = socket.split();
    let mut topics: HashMap<String, mpsc::UnboundedSender<ChangeEvent>> = HashMap::new();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut next_ref: u64 = 1;

    loop {
        let frame = tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Join { topic, table, access_token, tx }) => {
                    tracing::debug!("realtime: joining {}", topic);
                    topics.insert(topic.clone(), tx);
                    join_frame(&topic, table, access_token.as_deref(), next_ref)
                }
                Some(Command::Leave { topic }) => {
                    if topics.remove(&topic).is_none() {
                        continue;
                    }
                    tracing::debug!("realtime: leaving {}", topic);
                    leave_frame(&topic, next_ref)
                }
                None => break,
            },
            _ = heartbeat.tick() => heartbeat_frame(next_ref),
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&text, &mut topics);
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::warn!("realtime: socket closed");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!("realtime: socket error: {}", e);
                    break;
                }
            },
        };

        next_ref += 1;
        if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
            tracing::warn!("realtime: send failed: {}", e);
            break;
        }
    }

    let _ = sink.close().await;
}
