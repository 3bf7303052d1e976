use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use msgcontainer::config::Config;
use msgcontainer::container::Container;
use msgcontainer::net::client::{Client, ClientHandlers};
use msgcontainer::net::server::{Handlers, Server};
use msgcontainer::value::{Value, ValueKind};

async fn connect_client(
    config: &Config,
    addr: SocketAddr,
    name: &str,
) -> (Client, tokio::sync::oneshot::Receiver<(String, String, bool)>, tokio::sync::mpsc::UnboundedReceiver<Container>) {
    let (conn_tx, conn_rx) = tokio::sync::oneshot::channel();
    let conn_tx = Mutex::new(Some(conn_tx));
    let (recv_tx, recv_rx) = tokio::sync::mpsc::unbounded_channel();
    let handlers = ClientHandlers {
        on_connect: Some(Box::new(move |id, sub, ok| {
            if let Some(tx) = conn_tx.lock().unwrap().take() {
                let _ = tx.send((id, sub, ok));
            }
        })),
        on_receive: Some(Box::new(move |_peer, container| {
            let _ = recv_tx.send(container);
        })),
    };
    let mut client = Client::new(name, "key", config, handlers);
    client.start(&addr.ip().to_string(), addr.port(), false, 1).await.unwrap();
    (client, conn_rx, recv_rx)
}

#[tokio::test]
async fn broadcast_excludes_listed_client() {
    let mut config = Config::default();
    config.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.port = 0;
    let mut server = Server::new(config.clone(), Handlers::default());
    let addr = server.start().await.unwrap();

    let (mut client_a, conn_a, mut recv_a) = connect_client(&config, addr, "alice").await;
    let (mut client_b, conn_b, mut recv_b) = connect_client(&config, addr, "bob").await;

    let (_server_id_a, _sub_a, ok_a) = tokio::time::timeout(Duration::from_secs(2), conn_a).await.unwrap().unwrap();
    let (_server_id_b, _sub_b, ok_b) = tokio::time::timeout(Duration::from_secs(2), conn_b).await.unwrap().unwrap();
    assert!(ok_a && ok_b);

    // the connection callback now reports the server's identity, so the
    // excluded client's own registry id comes from its adopted identity
    let mut exclude = HashSet::new();
    exclude.insert(client_a.current_identity().0);

    let packet = Container::create(
        "",
        "",
        "",
        "",
        "announcement",
        vec![Value::new("text", ValueKind::String, "server is restarting")],
    );
    let delivered = server.broadcast(packet, &exclude).await;
    assert_eq!(delivered, 1);

    let got = tokio::time::timeout(Duration::from_millis(500), recv_b.recv())
        .await
        .expect("bob should receive the broadcast")
        .unwrap();
    assert_eq!(got.message_type(), "announcement");

    let excluded = tokio::time::timeout(Duration::from_millis(300), recv_a.recv()).await;
    assert!(excluded.is_err(), "excluded client must not receive the broadcast");

    client_a.stop().await;
    client_b.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn unknown_message_type_gets_an_error_reply_even_with_on_receive_registered() {
    let mut config = Config::default();
    config.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.port = 0;

    // a server that *does* register on_receive, with "ping" as its only
    // recognized custom type -- the point of this test is that "unknown"
    // is a property of the message_type itself, not of whether a handler
    // happens to be registered
    let (server_recv_tx, mut server_recv_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut known_message_types = HashSet::new();
    known_message_types.insert("ping".to_string());
    let handlers = Handlers {
        on_receive: Some(Box::new(move |peer, container| {
            let _ = server_recv_tx.send((peer, container.message_type().to_string()));
        })),
        known_message_types,
        ..Handlers::default()
    };
    let mut server = Server::new(config.clone(), handlers);
    let addr = server.start().await.unwrap();

    let (mut client_a, conn_a, mut recv_a) = connect_client(&config, addr, "sender").await;
    let (mut client_b, conn_b, mut recv_b) = connect_client(&config, addr, "bystander").await;
    tokio::time::timeout(Duration::from_secs(2), conn_a).await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(2), conn_b).await.unwrap().unwrap();

    let target_id = client_b.current_identity().0;

    // a recognized type reaches the server's on_receive
    client_a.send_message(&target_id, "ping", vec![]).await.unwrap();
    let (_peer, recognized_type) = tokio::time::timeout(Duration::from_millis(500), server_recv_rx.recv())
        .await
        .expect("the recognized type should reach on_receive")
        .unwrap();
    assert_eq!(recognized_type, "ping");

    // an unrecognized type is still rejected with an error reply, even
    // though on_receive is registered on this server
    client_a.send_message(&target_id, "nonsense_type", vec![]).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_millis(500), recv_a.recv())
        .await
        .expect("sender should get an error reply")
        .unwrap();
    assert_eq!(reply.message_type(), "error");

    let server_saw_unknown_type = tokio::time::timeout(Duration::from_millis(300), server_recv_rx.recv()).await;
    assert!(server_saw_unknown_type.is_err(), "on_receive must not be invoked for an unrecognized type");

    let bystander_got_it = tokio::time::timeout(Duration::from_millis(300), recv_b.recv()).await;
    assert!(bystander_got_it.is_err(), "an unknown message type must not be broadcast");

    client_a.stop().await;
    client_b.stop().await;
    server.stop().await;
}
