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

//! A thin manual-testing harness, not part of the crate's specified
//! surface. Starts a server on the configured host/port, logs connect,
//! receive, and disconnect events, and runs until interrupted.

use log::info;
use msgcontainer::config::Config;
use msgcontainer::net::server::{Handlers, Server};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = Config::default();
    let handlers = Handlers {
        on_connect: Some(Box::new(|id, sub_id, ok| {
            info!("connect: {id}/{sub_id} ok={ok}");
        })),
        on_receive: Some(Box::new(|peer, container| {
            info!("receive from {peer}: {}", container.message_type());
        })),
        on_disconnect: Some(Box::new(|id| {
            info!("disconnect: {id}");
        })),
        ..Handlers::default()
    };

    let mut server = Server::new(config, handlers);
    let addr = server.start().await.expect("failed to bind listen socket");
    info!("listening on {addr}, press ctrl-c to stop");

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    server.stop().await;
}
