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

//! # Session registry
//!
//! One [`Registry`] per [`crate::net::server::Server`], keyed by a
//! server-generated session [`Uuid`]. The map itself is guarded by a
//! single `parking_lot::Mutex`; a session's socket write half is guarded
//! separately by its own `tokio::sync::Mutex` so that holding the
//! registry lock never overlaps with an in-flight write or a socket
//! close, per the concurrency model's "never close a held socket under
//! the lock" rule.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

pub type SharedWriter = Arc<AsyncMutex<OwnedWriteHalf>>;

/// Everything the registry knows about one connected socket.
pub struct SessionRecord {
    pub addr: SocketAddr,
    pub client_id: String,
    pub client_sub_id: String,
    pub connection_key: String,
    pub auto_echo: bool,
    pub auto_echo_interval: Duration,
    pub last_echo: Instant,
    pub echo_count: u32,
    pub writer: SharedWriter,
}

/// A read-only snapshot of one connected client, returned by
/// [`Registry::connected_clients`].
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub client_sub_id: String,
    pub addr: SocketAddr,
    pub auto_echo: bool,
}

#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<Uuid, SessionRecord>>,
}

impl Registry {
    pub fn insert(&self, id: Uuid, record: SessionRecord) {
        self.sessions.lock().insert(id, record);
    }

    pub fn remove(&self, id: Uuid) -> Option<SessionRecord> {
        self.sessions.lock().remove(&id)
    }

    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut SessionRecord)) {
        if let Some(record) = self.sessions.lock().get_mut(&id) {
            f(record);
        }
    }

    pub fn writer(&self, id: Uuid) -> Option<SharedWriter> {
        self.sessions.lock().get(&id).map(|r| r.writer.clone())
    }

    /// The client identity assigned to session `id`, if the registry
    /// still holds it and it's non-empty.
    pub fn client_id_of(&self, id: Uuid) -> Option<String> {
        self.sessions.lock().get(&id).map(|r| r.client_id.clone()).filter(|c| !c.is_empty())
    }

    /// Linear scan for the session carrying `client_id`. Acceptable per
    /// spec.md §4.6: the client-id-to-session-id mapping is not indexed
    /// since the expected session count is small.
    pub fn find_by_client_id(&self, client_id: &str) -> Option<Uuid> {
        self.sessions
            .lock()
            .iter()
            .find(|(_, r)| r.client_id == client_id)
            .map(|(id, _)| *id)
    }

    /// Snapshot the sessions due for an echo at `now`, then release the
    /// lock — the caller sends outside of it.
    pub fn due_for_echo(&self, now: Instant) -> Vec<(Uuid, String, String, SharedWriter, u32)> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, r)| {
                r.auto_echo && !r.client_id.is_empty() && now.saturating_duration_since(r.last_echo) >= r.auto_echo_interval
            })
            .map(|(id, r)| (*id, r.client_id.clone(), r.client_sub_id.clone(), r.writer.clone(), r.echo_count))
            .collect()
    }

    pub fn mark_echo_sent(&self, id: Uuid, at: Instant, new_count: u32) {
        self.update(id, |r| {
            r.last_echo = at;
            r.echo_count = new_count;
        });
    }

    /// Snapshot every session's id, assigned client id, and writer, then
    /// release the lock. Used by `broadcast` and shutdown.
    pub fn snapshot_all(&self) -> Vec<(Uuid, String, SharedWriter)> {
        self.sessions
            .lock()
            .iter()
            .map(|(id, r)| (*id, r.client_id.clone(), r.writer.clone()))
            .collect()
    }

    pub fn connected_clients(&self) -> Vec<ClientInfo> {
        self.sessions
            .lock()
            .values()
            .filter(|r| !r.client_id.is_empty())
            .map(|r| ClientInfo {
                client_id: r.client_id.clone(),
                client_sub_id: r.client_sub_id.clone(),
                addr: r.addr,
                auto_echo: r.auto_echo,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
