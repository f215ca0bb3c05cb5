//! Newline-framed TCP bridge to the message broker
//!
//! ```text
//! client -> broker   CONNECT <vpn> <username> <password>
//!                    SUBSCRIBE <topic>
//!                    ACK <sequence>
//! broker -> client   OK | ERR <reason>        (reply to CONNECT / SUBSCRIBE)
//!                    MSG <sequence> <payload>
//! ```
//!
//! A rejected CONNECT is an authentication failure and is never retried.
//! Connection loss, read errors and refused connects go through the
//! [`ReconnectPolicy`]; unacknowledged messages are the broker's to redeliver.
//! Acks for deliveries handed out before a reconnect or shutdown are still
//! written on the connection they arrived on.

use super::{Delivery, ReconnectPolicy, ReplaySource};
use crate::error::BusError;
use async_trait::async_trait;
use config::{BusConfig, Secret};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection parameters for one subscription
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub host: String,
    pub vpn_name: String,
    pub username: String,
    pub password: Secret,
    pub topic: String,
}

impl BridgeSettings {
    pub fn new(bus: &BusConfig, host: String, topic: String) -> Self {
        Self {
            host,
            vpn_name: bus.vpn_name.clone(),
            username: bus.username.clone(),
            password: bus.password.clone(),
            topic,
        }
    }
}

/// Live session. The ack writer owns the write half and outlives the
/// connection until every outstanding [`Delivery`] has been acked or dropped.
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    ack_tx: mpsc::UnboundedSender<u64>,
    ack_writer: JoinHandle<()>,
}

pub struct LineBridgeBus {
    settings: BridgeSettings,
    policy: ReconnectPolicy,
    connection: Option<Connection>,
    line: Vec<u8>,
}

impl LineBridgeBus {
    /// Connect and subscribe, retrying transient failures per `policy`
    pub async fn connect(settings: BridgeSettings, policy: ReconnectPolicy) -> Result<Self, BusError> {
        let mut bus = Self {
            settings,
            policy,
            connection: None,
            line: Vec::with_capacity(1024),
        };
        bus.reconnect().await?;
        Ok(bus)
    }

    async fn reconnect(&mut self) -> Result<(), BusError> {
        self.connection = None;
        let mut attempt = 0;

        loop {
            match self.open().await {
                Ok(connection) => {
                    info!(
                        host = %self.settings.host,
                        topic = %self.settings.topic,
                        "Subscribed to replay topic"
                    );
                    self.connection = Some(connection);
                    return Ok(());
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(BusError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        host = %self.settings.host,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Bus connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn open(&mut self) -> Result<Connection, BusError> {
        let stream = TcpStream::connect(&self.settings.host)
            .await
            .map_err(|source| BusError::Connect {
                host: self.settings.host.clone(),
                source,
            })?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let s = &self.settings;
        let hello = format!("CONNECT {} {} {}\n", s.vpn_name, s.username, s.password.expose());
        write.write_all(hello.as_bytes()).await?;
        if let Err(reason) = read_reply(&mut reader, &mut self.line).await? {
            return Err(BusError::Auth(reason));
        }

        write.write_all(format!("SUBSCRIBE {}\n", s.topic).as_bytes()).await?;
        if let Err(reason) = read_reply(&mut reader, &mut self.line).await? {
            return Err(BusError::Subscribe {
                topic: s.topic.clone(),
                reason,
            });
        }

        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let ack_writer = tokio::spawn(write_acks(write, ack_rx));
        Ok(Connection {
            reader,
            ack_tx,
            ack_writer,
        })
    }
}

#[async_trait]
impl ReplaySource for LineBridgeBus {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BusError> {
        loop {
            let Some(connection) = self.connection.as_mut() else {
                self.reconnect().await?;
                continue;
            };

            self.line.clear();
            match connection.reader.read_until(b'\n', &mut self.line).await {
                Ok(0) => warn!(host = %self.settings.host, "Broker closed the connection"),
                Ok(_) => match parse_message(strip_newline(&self.line)) {
                    Some((sequence, payload)) => {
                        return Ok(Some(Delivery::new(
                            sequence,
                            payload.to_vec(),
                            Some(connection.ack_tx.clone()),
                        )));
                    }
                    None => {
                        debug!(line = %String::from_utf8_lossy(&self.line), "Ignoring broker line");
                        continue;
                    }
                },
                Err(e) => warn!(host = %self.settings.host, error = %e, "Bus read failed"),
            }
            self.reconnect().await?;
        }
    }

    fn describe(&self) -> String {
        format!("bus {} topic {}", self.settings.host, self.settings.topic)
    }

    async fn close(&mut self) {
        let Some(Connection {
            reader,
            ack_tx,
            ack_writer,
        }) = self.connection.take()
        else {
            return;
        };
        drop(reader);
        drop(ack_tx);
        if let Err(e) = ack_writer.await {
            warn!(host = %self.settings.host, error = %e, "Ack writer failed");
        }
        debug!(host = %self.settings.host, "Bus connection closed");
    }
}

async fn write_acks(mut write: OwnedWriteHalf, mut acks: mpsc::UnboundedReceiver<u64>) {
    while let Some(sequence) = acks.recv().await {
        if let Err(e) = write.write_all(format!("ACK {sequence}\n").as_bytes()).await {
            debug!(error = %e, "Ack writer stopped");
            break;
        }
    }
}

/// `Ok(Ok(()))` for `OK`, `Ok(Err(reason))` for `ERR <reason>`
async fn read_reply(
    reader: &mut BufReader<OwnedReadHalf>,
    line: &mut Vec<u8>,
) -> Result<Result<(), String>, BusError> {
    line.clear();
    if reader.read_until(b'\n', line).await? == 0 {
        return Err(BusError::Closed);
    }
    let reply = String::from_utf8_lossy(strip_newline(line));
    match reply.split_once(' ') {
        _ if reply == "OK" => Ok(Ok(())),
        Some(("ERR", reason)) => Ok(Err(reason.to_string())),
        _ if reply == "ERR" => Ok(Err(String::new())),
        _ => Err(BusError::Protocol(reply.to_string())),
    }
}

fn strip_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `MSG <sequence> <payload>`
fn parse_message(line: &[u8]) -> Option<(u64, &[u8])> {
    let rest = line.strip_prefix(b"MSG ")?;
    let space = rest.iter().position(|&b| b == b' ')?;
    let sequence = std::str::from_utf8(&rest[..space]).ok()?.parse().ok()?;
    Some((sequence, &rest[space + 1..]))
}
