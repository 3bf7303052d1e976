/*
 * Created on Mon Jul 27 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Client runtime
//!
//! Owns one socket, one receive task, and two user callbacks. A
//! successful `start()` only means the socket connected: confirmation of
//! the handshake arrives asynchronously through the connection callback,
//! mirroring `MessagingClient.start`/`_handle_connection_confirmation` in
//! the source this crate was distilled from.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::config::Config;
use crate::container::Container;
use crate::error::{Error, NetResult};
use crate::frame::FrameCodec;
use crate::session;
use crate::value::Value;

pub type ConnCallback = Box<dyn Fn(String, String, bool) + Send + Sync>;
pub type RecvCallback = Box<dyn Fn(String, Container) + Send + Sync>;

#[derive(Default)]
pub struct ClientHandlers {
    pub on_connect: Option<ConnCallback>,
    pub on_receive: Option<RecvCallback>,
}

/// The client's own identity. It starts as whatever the caller supplied
/// and is overwritten with the server's assignment once
/// `confirm_connection` arrives, exactly as `_handle_connection_confirmation`
/// does in the source.
struct Identity {
    source_id: String,
    source_sub_id: String,
}

type SharedWriter = Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>;

pub struct Client {
    connection_key: String,
    codec: FrameCodec,
    identity: Arc<Mutex<Identity>>,
    handlers: Arc<ClientHandlers>,
    writer: Option<SharedWriter>,
    shutdown: Arc<Notify>,
    recv_task: Option<tokio::task::JoinHandle<()>>,
}

impl Client {
    pub fn new(source_id: impl Into<String>, connection_key: impl Into<String>, config: &Config, handlers: ClientHandlers) -> Self {
        Self {
            connection_key: connection_key.into(),
            codec: FrameCodec::new(config.start_sentinel, config.end_sentinel, config.max_frame_size),
            identity: Arc::new(Mutex::new(Identity {
                source_id: source_id.into(),
                source_sub_id: String::new(),
            })),
            handlers: Arc::new(handlers),
            writer: None,
            shutdown: Arc::new(Notify::new()),
            recv_task: None,
        }
    }

    /// Connect, spawn the receive task, and send the initial
    /// `request_connection`. Success here only means the socket
    /// connected.
    pub async fn start(&mut self, host: &str, port: u16, auto_echo: bool, auto_echo_interval_seconds: i8) -> NetResult<()> {
        let stream = TcpStream::connect((host, port)).await?;
        let (read_half, write_half) = stream.into_split();
        let writer: SharedWriter = Arc::new(AsyncMutex::new(write_half));
        self.writer = Some(writer.clone());

        let identity = self.identity.clone();
        let handlers = self.handlers.clone();
        let codec = self.codec;
        let shutdown = self.shutdown.clone();
        self.recv_task = Some(tokio::spawn(receive_loop(read_half, identity, handlers, codec, shutdown)));

        let (source_id, source_sub_id) = {
            let id = self.identity.lock();
            (id.source_id.clone(), id.source_sub_id.clone())
        };
        let mut request = session::request_connection(
            &source_id,
            &source_sub_id,
            &self.connection_key,
            auto_echo,
            auto_echo_interval_seconds,
            false,
        );
        let wire = request.serialize();
        let mut w = writer.lock().await;
        self.codec.write_frame(&mut *w, wire.as_bytes()).await?;
        Ok(())
    }

    /// Shut the socket down in both directions, signal the receive task,
    /// and join it with a bounded timeout.
    pub async fn stop(&mut self) {
        self.shutdown.notify_one();
        if let Some(writer) = self.writer.take() {
            let mut w = writer.lock().await;
            let _ = tokio::io::AsyncWriteExt::shutdown(&mut *w).await;
        }
        if let Some(task) = self.recv_task.take() {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                debug!("client receive task did not stop within the shutdown timeout");
            }
        }
    }

    /// Refuses if disconnected, or if `target_id` is empty. Fills in
    /// `source_id`/`source_sub_id` from the client's current identity if
    /// the container doesn't already carry one.
    pub async fn send_packet(&self, mut container: Container) -> NetResult<()> {
        let Some(writer) = &self.writer else {
            return Err(Error::NotConnected);
        };
        if container.target_id().is_empty() {
            return Err(Error::invalid_argument("target_id is empty"));
        }
        if container.source_id().is_empty() {
            let id = self.identity.lock();
            container.set_source_id(id.source_id.clone());
            container.set_source_sub_id(id.source_sub_id.clone());
        }
        let wire = container.serialize();
        let mut w = writer.lock().await;
        self.codec.write_frame(&mut *w, wire.as_bytes()).await?;
        Ok(())
    }

    /// Convenience wrapper: build a `Container` and send it in one call.
    pub async fn send_message(&self, target_id: &str, message_type: &str, values: Vec<Value>) -> NetResult<()> {
        let container = Container::create(target_id, "", "", "", message_type, values);
        self.send_packet(container).await
    }

    pub fn current_identity(&self) -> (String, String) {
        let id = self.identity.lock();
        (id.source_id.clone(), id.source_sub_id.clone())
    }
}

async fn receive_loop(mut read_half: OwnedReadHalf, identity: Arc<Mutex<Identity>>, handlers: Arc<ClientHandlers>, codec: FrameCodec, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            frame = codec.read_frame(&mut read_half) => {
                match frame {
                    Ok(Some(payload)) => {
                        let Ok(text) = String::from_utf8(payload) else { continue };
                        let mut message = Container::parse(&text);
                        handle_message(&mut message, &identity, &handlers);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("client receive error: {e}");
                        break;
                    }
                }
            }
        }
    }
}

fn handle_message(message: &mut Container, identity: &Arc<Mutex<Identity>>, handlers: &ClientHandlers) {
    if message.message_type() == "confirm_connection" {
        handle_confirmation(message, identity, handlers);
    } else if let Some(cb) = &handlers.on_receive {
        cb(message.source_id().to_string(), message.clone());
    }
}

/// Presence of a `confirm` value (any value) means success; its absence
/// means failure reported with whatever identity the peer claimed on the
/// wire, not the client's prior identity -- matching
/// `_handle_connection_confirmation` exactly. On success the client's own
/// identity is adopted from `target_id`/`target_sub_id` (what the server
/// assigned to this client), but the callback is invoked with the
/// server's own identity (`source_id`/`source_sub_id`), matching the
/// `(server_id, server_sub_id, True)` contract.
fn handle_confirmation(message: &mut Container, identity: &Arc<Mutex<Identity>>, handlers: &ClientHandlers) {
    if session::first_raw(message, "confirm").is_none() {
        if let Some(cb) = &handlers.on_connect {
            cb(message.source_id().to_string(), message.source_sub_id().to_string(), false);
        }
        return;
    }

    let target_id = message.target_id().to_string();
    let target_sub_id = message.target_sub_id().to_string();
    {
        let mut id = identity.lock();
        id.source_id = target_id.clone();
        id.source_sub_id = target_sub_id.clone();
    }
    let server_id = message.source_id().to_string();
    let server_sub_id = message.source_sub_id().to_string();
    info!("connection confirmed: {target_id}/{target_sub_id}");
    if let Some(cb) = &handlers.on_connect {
        cb(server_id, server_sub_id, true);
    }
}
