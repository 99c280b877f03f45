use postchannel::{ChannelOptions, InstanceId, PostChannel};
use postchannel_websocket::{WsEndpoint, WsError, accept, connect};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const PATIENCE: Duration = Duration::from_secs(5);

async fn socket_pair() -> (WsEndpoint, WsEndpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        accept(stream).await.unwrap()
    });
    let client = connect(&format!("ws://{addr}")).await.unwrap();
    (server.await.unwrap(), client)
}

fn inbox() -> (
    impl FnMut(&InstanceId, Value) + Send + 'static,
    mpsc::UnboundedReceiver<Value>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (move |_: &InstanceId, msg: Value| drop(tx.send(msg)), rx)
}

#[tokio::test]
async fn handshake_and_receipts_over_a_socket() {
    let (server, client) = socket_pair().await;
    let (on_server, mut server_rx) = inbox();
    let (on_client, mut client_rx) = inbox();

    let hub = PostChannel::<Value>::open(
        on_server,
        ChannelOptions::from_endpoint(server.endpoint()).instance("hub"),
    )
    .unwrap();
    let tab = PostChannel::<Value>::open(
        on_client,
        ChannelOptions::from_endpoint(client.endpoint()).instance("tab"),
    )
    .unwrap();

    timeout(PATIENCE, async { tokio::join!(hub.ready(), tab.ready()) })
        .await
        .expect("handshake over websocket did not converge");
    assert_eq!(hub.peer().unwrap().as_str(), "tab");

    tab.send(&json!({"type": "hello"})).unwrap();
    assert_eq!(
        timeout(PATIENCE, server_rx.recv()).await.unwrap().unwrap(),
        json!({"type": "hello"})
    );

    let delivery = hub.acknowledged_send(&json!({"type": "ping"})).unwrap();
    timeout(PATIENCE, delivery).await.expect("no receipt");
    assert_eq!(client_rx.try_recv().unwrap(), json!({"type": "ping"}));
}

#[tokio::test]
async fn closed_socket_stops_delivery() {
    let (server, client) = socket_pair().await;
    let hub = PostChannel::<Value>::open(
        |_, _| {},
        ChannelOptions::from_endpoint(server.endpoint()).instance("hub"),
    )
    .unwrap();
    let tab = PostChannel::<Value>::open(
        |_, _| {},
        ChannelOptions::from_endpoint(client.endpoint()).instance("tab"),
    )
    .unwrap();
    timeout(PATIENCE, async { tokio::join!(hub.ready(), tab.ready()) })
        .await
        .unwrap();

    assert!(!server.is_closed());
    client.close();
    let delivery = hub.acknowledged_send(&json!(1)).unwrap();
    assert!(timeout(Duration::from_millis(200), delivery).await.is_err());

    timeout(PATIENCE, async {
        while !server.is_closed() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server side never noticed the close");
}

#[tokio::test]
async fn dropping_an_endpoint_closes_the_socket() {
    let (server, client) = socket_pair().await;
    drop(client);

    timeout(PATIENCE, async {
        while !server.is_closed() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dropped client left the socket open");
}

#[tokio::test]
async fn unreachable_server_fails_at_construction() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = connect(&format!("ws://{addr}")).await.err().unwrap();
    assert!(matches!(err, WsError::Handshake(_)));
}
