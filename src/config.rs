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

//! # Configuration
//!
//! [`Config`] is the resolved, ready-to-use configuration the runtime
//! actually binds against. [`ConfigFile`] is its serde-deserialized,
//! everything-optional counterpart, matching the split the teacher keeps
//! between a resolved `ConfigurationSet` and a raw `cfgfile::Config`: the
//! file format tolerates missing keys, the resolved form never does.

use crate::error::{Error, NetResult};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
pub const DEFAULT_PORT: u16 = 2278;
pub const DEFAULT_START_SENTINEL: u8 = 0xE7;
pub const DEFAULT_END_SENTINEL: u8 = 0x43;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;
pub const DEFAULT_MAX_CONNECTIONS: usize = 4096;
pub const DEFAULT_ECHO_POLL_INTERVAL_MS: u64 = 100;

/// Fallback worker count when the host doesn't report its parallelism.
pub const DEFAULT_WORKER_COUNT_FALLBACK: usize = 4;

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(DEFAULT_WORKER_COUNT_FALLBACK)
}

/// The resolved configuration a [`crate::net::server::Server`] or
/// [`crate::net::client::Client`] is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: usize,
    pub start_sentinel: u8,
    pub end_sentinel: u8,
    pub max_frame_size: u32,
    pub echo_poll_interval_ms: u64,
    /// Informational only: this crate runs on tokio's global multi-thread
    /// runtime, whose worker thread count is fixed by `#[tokio::main]`
    /// before any `Config` is ever built. Carried for parity with spec.md
    /// §6's configuration value list and for callers that want to size
    /// their own pools (e.g. a `demos/` binary) off the same number.
    pub worker_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            start_sentinel: DEFAULT_START_SENTINEL,
            end_sentinel: DEFAULT_END_SENTINEL,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            echo_poll_interval_ms: DEFAULT_ECHO_POLL_INTERVAL_MS,
            worker_count: default_worker_count(),
        }
    }
}

impl Config {
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            host: file.server.host.unwrap_or(defaults.host),
            port: file.server.port.unwrap_or(defaults.port),
            max_connections: file.server.max_connections.unwrap_or(defaults.max_connections),
            worker_count: file.server.worker_count.unwrap_or(defaults.worker_count),
            start_sentinel: file.transport.as_ref().and_then(|t| t.start_sentinel).unwrap_or(defaults.start_sentinel),
            end_sentinel: file.transport.as_ref().and_then(|t| t.end_sentinel).unwrap_or(defaults.end_sentinel),
            max_frame_size: file.transport.as_ref().and_then(|t| t.max_frame_size).unwrap_or(defaults.max_frame_size),
            echo_poll_interval_ms: file
                .transport
                .and_then(|t| t.echo_poll_interval_ms)
                .unwrap_or(defaults.echo_poll_interval_ms),
        }
    }

    /// Load from a YAML file, falling back to [`Config::default`] for any
    /// key the file omits.
    pub fn load(path: impl AsRef<std::path::Path>) -> NetResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile =
            serde_yaml::from_str(&raw).map_err(|e| Error::parse(format!("invalid config file: {e}")))?;
        Ok(Self::from_file(file))
    }
}

/// The on-disk (YAML) representation. Every key is optional; a missing
/// section or field falls back to [`Config::default`] in [`Config::from_file`].
#[derive(Deserialize, Debug, PartialEq)]
pub struct ConfigFile {
    pub(crate) server: ConfigFileServer,
    pub(crate) transport: Option<ConfigFileTransport>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ConfigFileServer {
    pub(crate) host: Option<IpAddr>,
    pub(crate) port: Option<u16>,
    pub(crate) max_connections: Option<usize>,
    pub(crate) worker_count: Option<usize>,
}

#[derive(Deserialize, Debug, PartialEq, Default)]
pub struct ConfigFileTransport {
    pub(crate) start_sentinel: Option<u8>,
    pub(crate) end_sentinel: Option<u8>,
    pub(crate) max_frame_size: Option<u32>,
    pub(crate) echo_poll_interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_sentinels() {
        let c = Config::default();
        assert_eq!(c.start_sentinel, 0xE7);
        assert_eq!(c.end_sentinel, 0x43);
    }

    #[test]
    fn default_worker_count_is_nonzero() {
        let c = Config::default();
        assert!(c.worker_count > 0);
    }

    #[test]
    fn worker_count_can_be_overridden_from_file() {
        let file = ConfigFile {
            server: ConfigFileServer {
                host: None,
                port: None,
                max_connections: None,
                worker_count: Some(2),
            },
            transport: None,
        };
        let c = Config::from_file(file);
        assert_eq!(c.worker_count, 2);
    }

    #[test]
    fn missing_transport_section_falls_back_to_defaults() {
        let file = ConfigFile {
            server: ConfigFileServer {
                host: None,
                port: Some(9000),
                max_connections: None,
                worker_count: None,
            },
            transport: None,
        };
        let c = Config::from_file(file);
        assert_eq!(c.port, 9000);
        assert_eq!(c.host, DEFAULT_HOST);
        assert_eq!(c.start_sentinel, DEFAULT_START_SENTINEL);
    }

    #[test]
    fn partial_transport_section_mixes_file_and_defaults() {
        let file = ConfigFile {
            server: ConfigFileServer::default(),
            transport: Some(ConfigFileTransport {
                start_sentinel: Some(1),
                end_sentinel: None,
                max_frame_size: None,
                echo_poll_interval_ms: None,
            }),
        };
        let c = Config::from_file(file);
        assert_eq!(c.start_sentinel, 1);
        assert_eq!(c.end_sentinel, DEFAULT_END_SENTINEL);
    }
}
