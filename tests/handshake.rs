use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;
use std::time::Duration;

use msgcontainer::config::Config;
use msgcontainer::net::client::{Client, ClientHandlers};
use msgcontainer::net::server::{Handlers, Server};

fn loopback_config() -> Config {
    let mut config = Config::default();
    config.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.port = 0;
    config
}

#[tokio::test]
async fn handshake_assigns_identity_and_confirms() {
    let config = loopback_config();
    let mut server = Server::new(config.clone(), Handlers::default());
    let addr = server.start().await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let handlers = ClientHandlers {
        on_connect: Some(Box::new(move |id, sub_id, ok| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send((id, sub_id, ok));
            }
        })),
        on_receive: None,
    };
    let mut client = Client::new("cli", "secret-key", &config, handlers);
    client
        .start(&addr.ip().to_string(), addr.port(), false, 1)
        .await
        .expect("client should connect to the loopback server");

    let (peer_id, peer_sub_id, ok) = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("handshake should complete within the timeout")
        .unwrap();

    // the connection callback reports the server's own identity, per
    // spec.md §8 scenario 1 -- never the client's newly-assigned one
    assert!(ok);
    assert_eq!(peer_id, "server");
    assert_eq!(peer_sub_id, "");

    // the client's own identity is adopted separately, from the confirm
    // message's target_id/target_sub_id
    let (client_id, client_sub_id) = client.current_identity();
    assert_eq!(client_id, "cli");
    assert_eq!(client_sub_id.len(), 8);
    assert!(client_sub_id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(server.session_count(), 1);

    client.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn server_generates_sub_id_when_client_omits_one() {
    let config = loopback_config();
    let mut server = Server::new(config.clone(), Handlers::default());
    let addr = server.start().await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let handlers = ClientHandlers {
        on_connect: Some(Box::new(move |id, sub_id, ok| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send((id, sub_id, ok));
            }
        })),
        on_receive: None,
    };
    // the client never sets its own sub-id before connecting
    let mut client = Client::new("anon", "", &config, handlers);
    client.start(&addr.ip().to_string(), addr.port(), false, 1).await.unwrap();

    let (server_id, server_sub_id, ok) = tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    assert!(ok);
    assert_eq!(server_id, "server");
    assert_eq!(server_sub_id, "");

    // the server must have generated a sub-id for the client, since the
    // client never supplied one of its own
    let (_client_id, client_sub_id) = client.current_identity();
    assert_eq!(client_sub_id.len(), 8);
    assert!(client_sub_id.chars().all(|c| c.is_ascii_hexdigit()));

    client.stop().await;
    server.stop().await;
}
