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

//! # Server runtime
//!
//! Owns the listen socket, the session [`Registry`], one accept task, and
//! one echo-scheduler task. `recv`/`connect`/`disconnect` user callbacks
//! are plain boxed closures stored in [`Handlers`], in the spirit of the
//! teacher's callback-oriented `dbnet::ConnectionHandler`, adapted
//! because this crate has genuine pluggable user callbacks rather than a
//! fixed internal query executor.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::config::Config;
use crate::container::Container;
use crate::error::NetResult;
use crate::frame::FrameCodec;
use crate::session;

use super::registry::{ClientInfo, Registry, SessionRecord, SharedWriter};

pub type ConnCallback = Box<dyn Fn(String, String, bool) + Send + Sync>;
pub type RecvCallback = Box<dyn Fn(String, Container) + Send + Sync>;
pub type DiscCallback = Box<dyn Fn(String) + Send + Sync>;

/// The three user callbacks a [`Server`] drives, matching spec.md §6's
/// handler callback contracts one-to-one, plus the handler table that
/// decides whether a given `message_type` is dispatched to `on_receive`
/// at all.
#[derive(Default)]
pub struct Handlers {
    pub on_connect: Option<ConnCallback>,
    pub on_receive: Option<RecvCallback>,
    pub on_disconnect: Option<DiscCallback>,
    /// `message_type`s this server recognizes for `on_receive`, besides
    /// the built-in `request_connection`. A type outside this table is
    /// unknown: the sender gets an `error` response and `on_receive` is
    /// never invoked for it, regardless of whether one is registered --
    /// matching spec.md §4.4's "routes by message_type through a handler
    /// table" and §8 scenario 6.
    pub known_message_types: HashSet<String>,
}

const SERVER_ID: &str = "server";

pub struct Server {
    config: Config,
    codec: FrameCodec,
    registry: Arc<Registry>,
    handlers: Arc<Handlers>,
    shutdown: broadcast::Sender<()>,
    accept_task: Option<tokio::task::JoinHandle<()>>,
    echo_task: Option<tokio::task::JoinHandle<()>>,
}

impl Server {
    pub fn new(config: Config, handlers: Handlers) -> Self {
        let codec = FrameCodec::new(config.start_sentinel, config.end_sentinel, config.max_frame_size);
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            codec,
            registry: Arc::new(Registry::default()),
            handlers: Arc::new(handlers),
            shutdown,
            accept_task: None,
            echo_task: None,
        }
    }

    /// Bind the listen socket and spawn the accept loop and echo
    /// scheduler. Returns the bound address (useful when `config.port`
    /// was `0`, e.g. in tests).
    pub async fn start(&mut self) -> NetResult<SocketAddr> {
        let listener = TcpListener::bind((self.config.host, self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!("server listening on {local_addr}");

        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.registry.clone(),
            self.handlers.clone(),
            self.codec,
            self.shutdown.subscribe(),
        ));
        self.accept_task = Some(accept_task);

        let echo_task = tokio::spawn(echo_scheduler(
            self.registry.clone(),
            self.codec,
            Duration::from_millis(self.config.echo_poll_interval_ms),
            self.shutdown.subscribe(),
        ));
        self.echo_task = Some(echo_task);

        Ok(local_addr)
    }

    /// Signal shutdown, close every session's socket to break its read,
    /// then join both background tasks with a bounded timeout.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(());
        for (_, _, writer) in self.registry.snapshot_all() {
            let mut w = writer.lock().await;
            let _ = tokio::io::AsyncWriteExt::shutdown(&mut *w).await;
        }
        for task in [self.accept_task.take(), self.echo_task.take()].into_iter().flatten() {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!("server task did not stop within the shutdown timeout");
            }
        }
        info!("server stopped");
    }

    /// Scan the registry for `client_id` and send `container` to it.
    pub async fn send_to_client(&self, client_id: &str, container: &mut Container) -> bool {
        let Some(id) = self.registry.find_by_client_id(client_id) else {
            warn!("client not found: {client_id}");
            return false;
        };
        if container.source_id().is_empty() {
            container.set_source_id(SERVER_ID);
        }
        let wire = container.serialize();
        send_via(&self.registry, &self.codec, id, wire.as_bytes()).await
    }

    /// Send `container` to every connected session whose client id is
    /// not in `exclude`. Returns the number of successful sends.
    pub async fn broadcast(&self, mut container: Container, exclude: &HashSet<String>) -> usize {
        if container.source_id().is_empty() {
            container.set_source_id(SERVER_ID);
        }
        let wire = container.serialize();
        let payload = wire.as_bytes();
        let mut count = 0;
        for (_, client_id, writer) in self.registry.snapshot_all() {
            if exclude.contains(&client_id) {
                continue;
            }
            let mut w = writer.lock().await;
            // a failed send here is reaped by that session's own receive
            // task on its next read error, not by broadcast itself
            if self.codec.write_frame(&mut *w, payload).await.is_ok() {
                count += 1;
            }
        }
        count
    }

    pub fn connected_clients(&self) -> Vec<ClientInfo> {
        self.registry.connected_clients()
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }
}

async fn send_via(registry: &Registry, codec: &FrameCodec, id: Uuid, payload: &[u8]) -> bool {
    match registry.writer(id) {
        Some(writer) => {
            let mut w = writer.lock().await;
            codec.write_frame(&mut *w, payload).await.is_ok()
        }
        None => false,
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    handlers: Arc<Handlers>,
    codec: FrameCodec,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        let id = Uuid::new_v4();
                        let (read_half, write_half) = socket.into_split();
                        registry.insert(
                            id,
                            SessionRecord {
                                addr,
                                client_id: String::new(),
                                client_sub_id: String::new(),
                                connection_key: String::new(),
                                auto_echo: false,
                                auto_echo_interval: Duration::from_secs(1),
                                last_echo: Instant::now(),
                                echo_count: 0,
                                writer: Arc::new(AsyncMutex::new(write_half)),
                            },
                        );
                        info!("new connection from {addr} (session: {id})");
                        tokio::spawn(receive_task(id, read_half, registry.clone(), handlers.clone(), codec));
                    }
                    Err(e) => error!("accept error: {e}"),
                }
            }
        }
    }
}

async fn receive_task(
    id: Uuid,
    mut read_half: OwnedReadHalf,
    registry: Arc<Registry>,
    handlers: Arc<Handlers>,
    codec: FrameCodec,
) {
    loop {
        match codec.read_frame(&mut read_half).await {
            Ok(Some(payload)) => {
                let Ok(text) = String::from_utf8(payload) else { continue };
                let mut message = Container::parse(&text);
                dispatch(id, &mut message, &registry, &handlers, &codec).await;
            }
            Ok(None) => break,
            Err(e) => {
                debug!("session {id} receive error: {e}");
                break;
            }
        }
    }
    disconnect(id, &registry, &handlers).await;
}

async fn dispatch(id: Uuid, message: &mut Container, registry: &Arc<Registry>, handlers: &Arc<Handlers>, codec: &FrameCodec) {
    match message.message_type() {
        "request_connection" => handle_connection_request(id, message, registry, handlers, codec).await,
        "" => {}
        t if handlers.known_message_types.contains(t) => {
            let client_id = client_id_for(registry, id);
            if let Some(cb) = &handlers.on_receive {
                cb(client_id, message.clone());
            }
        }
        t => {
            let reply = session::error_response(message.source_id(), message.source_sub_id(), format!("unknown message type: {t}"));
            send_reply(registry, codec, id, reply).await;
        }
    }
}

async fn send_reply(registry: &Arc<Registry>, codec: &FrameCodec, id: Uuid, mut reply: Container) {
    if reply.source_id().is_empty() {
        reply.set_source_id(SERVER_ID);
    }
    let wire = reply.serialize();
    let _ = send_via(registry, codec, id, wire.as_bytes()).await;
}

fn client_id_for(registry: &Registry, id: Uuid) -> String {
    registry.client_id_of(id).unwrap_or_else(|| id.to_string())
}

async fn handle_connection_request(id: Uuid, message: &mut Container, registry: &Arc<Registry>, handlers: &Arc<Handlers>, codec: &FrameCodec) {
    let client_id = message.source_id().to_string();
    let source_sub = message.source_sub_id().to_string();
    let client_sub_id = if source_sub.is_empty() { session::generate_sub_id() } else { source_sub };

    let connection_key = session::first_raw(message, "connection_key").unwrap_or_default();
    let auto_echo = session::first_raw(message, "auto_echo")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let auto_echo_interval_seconds = session::first_raw(message, "auto_echo_interval_seconds")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1);

    registry.update(id, |r| {
        r.client_id = client_id.clone();
        r.client_sub_id = client_sub_id.clone();
        r.connection_key = connection_key.clone();
        r.auto_echo = auto_echo;
        r.auto_echo_interval = Duration::from_secs(auto_echo_interval_seconds);
        r.last_echo = Instant::now();
    });

    let session_id = id.to_string();
    let mut confirm = session::confirm_connection(SERVER_ID, &client_id, &client_sub_id, &session_id);
    let wire = confirm.serialize();
    let _ = send_via(registry, codec, id, wire.as_bytes()).await;

    info!("client connected: {client_id}/{client_sub_id}");
    if let Some(cb) = &handlers.on_connect {
        cb(client_id, client_sub_id, true);
    }
}

async fn disconnect(id: Uuid, registry: &Arc<Registry>, handlers: &Arc<Handlers>) {
    let Some(record) = registry.remove(id) else { return };
    {
        let mut w = record.writer.lock().await;
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut *w).await;
    }
    // the `client_id or session_session_id` typo in the original falls back
    // to the session id, never a second client id -- preserved here.
    let client_id = if record.client_id.is_empty() { id.to_string() } else { record.client_id };
    info!("client disconnected: {client_id}");
    if let Some(cb) = &handlers.on_disconnect {
        cb(client_id);
    }
}

async fn echo_scheduler(registry: Arc<Registry>, codec: FrameCodec, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                for (id, client_id, client_sub_id, writer, echo_count) in registry.due_for_echo(now) {
                    let next_count = echo_count.wrapping_add(1);
                    let mut packet = session::echo(&client_id, &client_sub_id, unix_timestamp(), next_count);
                    let wire = packet.serialize();
                    if write_echo(&writer, &codec, wire.as_bytes()).await {
                        registry.mark_echo_sent(id, now, next_count);
                    }
                }
            }
        }
    }
}

async fn write_echo(writer: &SharedWriter, codec: &FrameCodec, payload: &[u8]) -> bool {
    let mut w = writer.lock().await;
    codec.write_frame(&mut *w, payload).await.is_ok()
}

fn unix_timestamp() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
