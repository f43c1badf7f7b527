// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NSQ wire protocol client: HTTP publish against nsqd, and the raw TCP
//! protocol (IDENTIFY/SUB/RDY/FIN/REQ) for subscribing, with a single
//! `nsqlookupd` endpoint used for producer discovery. Multi-producer
//! fan-out and lookupd failover are out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

use super::wire;
use super::{BusError, BusPublisher, BusSubscriber, Message, MessageHandler};

const FRAME_TYPE_RESPONSE: i32 = 0;
const FRAME_TYPE_ERROR: i32 = 1;
const FRAME_TYPE_MESSAGE: i32 = 2;

/// Publishes over nsqd's HTTP API (`POST /pub?topic=`).
#[derive(Clone)]
pub struct NsqPublisher {
    nsqd_http_addr: String,
}

impl NsqPublisher {
    pub fn new(nsqd_http_addr: impl Into<String>) -> Self {
        Self { nsqd_http_addr: nsqd_http_addr.into() }
    }
}

#[async_trait]
impl BusPublisher for NsqPublisher {
    async fn publish(&self, topic: &str, body: &[u8]) -> Result<(), BusError> {
        let path = format!("/pub?topic={topic}");
        let response = wire::post(&self.nsqd_http_addr, &path, body)
            .await
            .map_err(|e| BusError::Publish(topic.to_string(), e.to_string()))?;

        if response.status != 200 {
            let detail = String::from_utf8_lossy(&response.body).into_owned();
            return Err(BusError::Publish(topic.to_string(), format!("nsqd returned {}: {detail}", response.status)));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct LookupResponse {
    producers: Vec<LookupProducer>,
}

#[derive(serde::Deserialize)]
struct LookupProducer {
    broadcast_address: String,
    tcp_port: u16,
}

/// Subscribes over NSQ's raw TCP protocol, resolving a producer through one
/// `nsqlookupd` HTTP endpoint.
#[derive(Clone)]
pub struct NsqSubscriber {
    lookupd_http_addr: String,
}

impl NsqSubscriber {
    pub fn new(lookupd_http_addr: impl Into<String>) -> Self {
        Self { lookupd_http_addr: lookupd_http_addr.into() }
    }

    async fn resolve_producer(&self, topic: &str) -> Result<String, BusError> {
        let path = format!("/lookup?topic={topic}");
        let response = wire::get(&self.lookupd_http_addr, &path)
            .await
            .map_err(|e| BusError::Lookup(topic.to_string(), self.lookupd_http_addr.clone(), e.to_string()))?;

        let parsed: LookupResponse = serde_json::from_slice(&response.body)
            .map_err(|e| BusError::Lookup(topic.to_string(), self.lookupd_http_addr.clone(), e.to_string()))?;

        let producer = parsed.producers.into_iter().next().ok_or_else(|| {
            BusError::Lookup(topic.to_string(), self.lookupd_http_addr.clone(), "no producers".to_string())
        })?;

        Ok(format!("{}:{}", producer.broadcast_address, producer.tcp_port))
    }
}

/// A command line destined for the single TCP writer half, produced either
/// by the reader loop (NOP) or by a spawned handler task reporting
/// FIN/REQ once it completes.
type OutgoingCommand = (String, Option<Vec<u8>>);

#[async_trait]
impl BusSubscriber for NsqSubscriber {
    async fn subscribe(
        &self,
        topic: &str,
        channel: &str,
        concurrency: usize,
        handler: Arc<dyn MessageHandler>,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> Result<(), BusError> {
        let producer_addr = self.resolve_producer(topic).await?;

        let mut stream = TcpStream::connect(&producer_addr)
            .await
            .map_err(|e| BusError::Connect(producer_addr.clone(), e.to_string()))?;

        stream
            .write_all(b"  V2")
            .await
            .map_err(|e| BusError::Protocol(e.to_string()))?;

        let identify_body = serde_json::json!({
            "client_id": "sbx-daemon",
            "hostname": "sbx-daemon",
            "feature_negotiation": false,
        });
        send_command(&mut stream, "IDENTIFY", Some(identify_body.to_string().as_bytes())).await?;
        read_frame(&mut stream).await?;

        send_command(&mut stream, &format!("SUB {topic} {channel}"), None).await?;
        read_frame(&mut stream).await?;

        send_command(&mut stream, &format!("RDY {concurrency}"), None).await?;

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        // One task owns the write half; the reader loop and every spawned
        // handler task send their outgoing frames through this channel, so
        // a handler in flight never blocks the reader from pulling the
        // next frame (that would silently collapse concurrency to 1).
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<OutgoingCommand>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some((name, body)) = rx.recv().await {
                if send_command(&mut writer, &name, body.as_deref()).await.is_err() {
                    break;
                }
            }
        });

        let mut in_flight = Vec::new();
        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                frame = read_frame(&mut reader) => {
                    match frame {
                        Ok(frame) => match frame.frame_type {
                            FRAME_TYPE_RESPONSE if frame.data == b"_heartbeat_" => {
                                let _: Result<(), _> = tx.send(("NOP".to_string(), None));
                            }
                            FRAME_TYPE_ERROR => {
                                break Err(BusError::Protocol(String::from_utf8_lossy(&frame.data).into_owned()));
                            }
                            FRAME_TYPE_MESSAGE => {
                                let (message_id, body) = match parse_message(&frame.data) {
                                    Ok(parsed) => parsed,
                                    Err(e) => break Err(e),
                                };
                                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                    break Ok(());
                                };
                                let handler = handler.clone();
                                let tx = tx.clone();
                                in_flight.push(tokio::spawn(async move {
                                    let result = handler.handle(Message { body }).await;
                                    drop(permit);
                                    let command = match result {
                                        Ok(()) => format!("FIN {}", hex_id(&message_id)),
                                        Err(_) => format!("REQ {} 0", hex_id(&message_id)),
                                    };
                                    let _: Result<(), _> = tx.send((command, None));
                                }));
                            }
                            _ => {}
                        },
                        Err(BusError::Protocol(msg)) if msg == "eof" => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        for task in in_flight {
            let _ = task.await;
        }
        drop(tx);
        let _ = writer_task.await;
        result
    }
}

struct Frame {
    frame_type: i32,
    data: Vec<u8>,
}

async fn read_frame<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, BusError> {
    let mut size_buf = [0u8; 4];
    match reader.read_exact(&mut size_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(BusError::Protocol("eof".to_string()))
        }
        Err(e) => return Err(BusError::Protocol(e.to_string())),
    }
    let size = u32::from_be_bytes(size_buf) as usize;

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await.map_err(|e| BusError::Protocol(e.to_string()))?;

    if payload.len() < 4 {
        return Err(BusError::Protocol("frame shorter than its type header".to_string()));
    }
    let mut type_buf = [0u8; 4];
    type_buf.copy_from_slice(&payload[0..4]);
    let frame_type = i32::from_be_bytes(type_buf);
    Ok(Frame { frame_type, data: payload[4..].to_vec() })
}

/// Message frame layout: 8-byte timestamp, 2-byte attempts, 16-byte id, body.
fn parse_message(data: &[u8]) -> Result<([u8; 16], Vec<u8>), BusError> {
    if data.len() < 26 {
        return Err(BusError::Protocol("truncated message frame".to_string()));
    }
    let mut message_id = [0u8; 16];
    message_id.copy_from_slice(&data[10..26]);
    Ok((message_id, data[26..].to_vec()))
}

fn hex_id(id: &[u8; 16]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}

async fn send_command<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    name: &str,
    body: Option<&[u8]>,
) -> Result<(), BusError> {
    writer.write_all(name.as_bytes()).await.map_err(|e| BusError::Protocol(e.to_string()))?;
    writer.write_all(b"\n").await.map_err(|e| BusError::Protocol(e.to_string()))?;
    if let Some(body) = body {
        writer
            .write_all(&(body.len() as u32).to_be_bytes())
            .await
            .map_err(|e| BusError::Protocol(e.to_string()))?;
        writer.write_all(body).await.map_err(|e| BusError::Protocol(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "nsq_tests.rs"]
mod tests;
