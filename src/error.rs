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

use std::{fmt, io::Error as IoError};

pub type NetResult<T> = Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// the underlying socket failed
    IoError(IoError),
    /// frame resync was triggered, the type byte was unrecognized, the
    /// declared length exceeded the configured maximum, or the end
    /// sentinel didn't match
    ProtocolError(String),
    /// the header or data block of a container was malformed
    ParseError(String),
    /// the handshake failed: a missing `confirm` value, or (server-side)
    /// an unrecognized connection key
    HandshakeError(String),
    /// a send was attempted before `start()` or after `stop()`
    NotConnected,
    /// a send was attempted with an empty `target_id`
    InvalidArgument(String),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolError(msg.into())
    }
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::HandshakeError(msg.into())
    }
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "I/O error: {e}"),
            Self::ProtocolError(e) => write!(f, "protocol error: {e}"),
            Self::ParseError(e) => write!(f, "parse error: {e}"),
            Self::HandshakeError(e) => write!(f, "handshake error: {e}"),
            Self::NotConnected => write!(f, "not connected"),
            Self::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<IoError> for Error {
    fn from(ioe: IoError) -> Self {
        Self::IoError(ioe)
    }
}
