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

//! # Session protocol messages
//!
//! The three message shapes that make up the handshake and liveness
//! protocol, plus the error response sent for an unrecognized
//! `message_type`. Each builder returns a fully-headed [`Container`]
//! ready for [`crate::frame::FrameCodec::write_frame`] after
//! serialization.

use crate::container::Container;
use crate::value::{Value, ValueKind};

pub const SERVER_VERSION: &str = "2.0.0";

/// A freshly generated short client sub-id: the first 8 hex characters of
/// a UUIDv4, matching `str(uuid.uuid4())[:8]` in the original.
pub fn generate_sub_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A fresh session id: a full UUIDv4, matching `str(uuid.uuid4())`.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Build a `request_connection` message. `target_id` is always `"server"`
/// in the original and carried over unchanged here; `session_type` is
/// fixed at `"1"`, the only value the source ever sends.
pub fn request_connection(
    source_id: &str,
    source_sub_id: &str,
    connection_key: &str,
    auto_echo: bool,
    auto_echo_interval_seconds: i8,
    bridge_mode: bool,
) -> Container {
    Container::create(
        "server",
        "",
        source_id,
        source_sub_id,
        "request_connection",
        vec![
            Value::new("connection_key", ValueKind::Bytes, connection_key),
            Value::new("auto_echo", ValueKind::Bool, auto_echo.to_string()),
            Value::new(
                "auto_echo_interval_seconds",
                ValueKind::Int8,
                auto_echo_interval_seconds.to_string(),
            ),
            Value::new("session_type", ValueKind::Char, "1"),
            Value::new("bridge_mode", ValueKind::Bool, bridge_mode.to_string()),
            Value::container("snipping_targets"),
        ],
    )
}

/// Build a `confirm_connection` message. `source_sub_id` is deliberately
/// left unset, matching the original's omission of that header on this
/// particular message.
pub fn confirm_connection(server_id: &str, target_id: &str, target_sub_id: &str, session_id: &str) -> Container {
    Container::create(
        target_id,
        target_sub_id,
        server_id,
        "",
        "confirm_connection",
        vec![
            Value::new("confirm", ValueKind::Bool, "true"),
            Value::new("session_id", ValueKind::String, session_id),
            Value::new("server_version", ValueKind::String, SERVER_VERSION),
        ],
    )
}

/// Build an `echo` message. `echo_count` is a real per-session counter in
/// this crate (see `DESIGN.md`), not the original's constant `"1"`.
pub fn echo(target_id: &str, target_sub_id: &str, timestamp: i64, echo_count: u32) -> Container {
    Container::create(
        target_id,
        target_sub_id,
        "",
        "",
        "echo",
        vec![
            Value::new("timestamp", ValueKind::Int64, timestamp.to_string()),
            Value::new("echo_count", ValueKind::UInt32, echo_count.to_string()),
        ],
    )
}

/// Build the response to an unrecognized `message_type`.
pub fn error_response(target_id: &str, target_sub_id: &str, message: impl Into<String>) -> Container {
    Container::create(
        target_id,
        target_sub_id,
        "",
        "",
        "error",
        vec![Value::new("error", ValueKind::String, message.into())],
    )
}

/// The raw text of the first value named `name`, if any — the pattern
/// both the server's `_handle_connection_request` and the client's
/// `_handle_connection_confirmation` use to pull a single scalar out of a
/// message.
pub fn first_raw(container: &mut Container, name: &str) -> Option<String> {
    container.get(name).first().map(|v| v.raw().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_connection_targets_literal_server() {
        let mut c = request_connection("cli", "", "key123", true, 5, false);
        assert_eq!(c.target_id(), "server");
        assert_eq!(c.message_type(), "request_connection");
        assert_eq!(first_raw(&mut c, "connection_key").as_deref(), Some("key123"));
        assert_eq!(first_raw(&mut c, "session_type").as_deref(), Some("1"));
    }

    #[test]
    fn confirm_connection_omits_source_sub_id() {
        let mut c = confirm_connection("srv", "cli", "abcd1234", "session-xyz");
        assert_eq!(c.source_sub_id(), "");
        assert_eq!(first_raw(&mut c, "session_id").as_deref(), Some("session-xyz"));
    }

    #[test]
    fn generated_sub_id_is_eight_hex_chars() {
        let id = generate_sub_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
