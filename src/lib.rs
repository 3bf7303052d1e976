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

//! A typed, self-describing message container format, its length-framed
//! resynchronizing TCP transport, and the session protocol (handshake,
//! identity assignment, echo) layered on top of it.
//!
//! [`value`] and [`container`] are the data model: a recursive,
//! whitespace-escaped text grammar for a named, typed value forest.
//! [`frame`] is the wire codec. [`session`] builds the handshake/echo
//! message shapes. [`net`] drives both ends of the wire: [`net::server`]
//! is a concurrent multi-session runtime, [`net::client`] a single-socket
//! one.

pub mod config;
pub mod container;
pub mod error;
pub mod frame;
pub mod net;
pub mod session;
pub mod value;

pub use config::Config;
pub use container::Container;
pub use error::{Error, NetResult};
pub use value::{ScalarValue, Value, ValueKind};
