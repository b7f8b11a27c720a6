//! Integration tests for the listener: a real server socket, real
//! clients, both protocols on one port.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

use bonkhost_transport::{Incoming, Listener};

async fn bind() -> (Listener, String) {
    let listener = Listener::bind("127.0.0.1:0", None).await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn connect_ws(
    addr: &str,
) -> tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
> {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("client should connect");
    ws
}

#[tokio::test]
async fn test_websocket_text_round_trip() {
    let (mut listener, addr) = bind().await;

    let server = tokio::spawn(async move { listener.accept().await.unwrap() });
    let mut client = connect_ws(&addr).await;

    let Incoming::Socket(conn) = server.await.unwrap() else {
        panic!("expected a websocket upgrade");
    };
    assert!(conn.id().into_inner() > 0);
    assert!(conn.peer_ip().is_loopback());

    let (mut writer, mut reader) = conn.split();

    client
        .send(Message::Text(r#"["10",{"message":"hi"}]"#.into()))
        .await
        .unwrap();
    let frame = reader.next_text().await.unwrap().unwrap();
    assert_eq!(frame, r#"["10",{"message":"hi"}]"#);

    writer.send_text(r#"["20",0,"hi"]"#.to_string()).await.unwrap();
    let msg = client.next().await.unwrap().unwrap();
    assert_eq!(msg.into_text().unwrap().as_str(), r#"["20",0,"hi"]"#);

    writer.close().await.unwrap();
}

#[tokio::test]
async fn test_reader_sees_none_on_client_close() {
    let (mut listener, addr) = bind().await;
    let server = tokio::spawn(async move { listener.accept().await.unwrap() });
    let mut client = connect_ws(&addr).await;

    let Incoming::Socket(conn) = server.await.unwrap() else {
        panic!("expected a websocket upgrade");
    };
    let (_writer, mut reader) = conn.split();

    client.send(Message::Close(None)).await.unwrap();
    assert!(reader.next_text().await.unwrap().is_none());
}

#[tokio::test]
async fn test_binary_and_ping_frames_are_skipped() {
    let (mut listener, addr) = bind().await;
    let server = tokio::spawn(async move { listener.accept().await.unwrap() });
    let mut client = connect_ws(&addr).await;

    let Incoming::Socket(conn) = server.await.unwrap() else {
        panic!("expected a websocket upgrade");
    };
    let (_writer, mut reader) = conn.split();

    client
        .send(Message::Binary(b"ignored".to_vec().into()))
        .await
        .unwrap();
    client
        .send(Message::Ping(b"ping".to_vec().into()))
        .await
        .unwrap();
    client
        .send(Message::Text("kept".into()))
        .await
        .unwrap();

    assert_eq!(reader.next_text().await.unwrap().unwrap(), "kept");
}

#[tokio::test]
async fn test_plain_http_get_is_answered_with_json() {
    let (mut listener, addr) = bind().await;
    let server = tokio::spawn(async move { listener.accept().await.unwrap() });

    let mut client = TcpStream::connect(&addr).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: example\r\nAccept: */*\r\n\r\n")
        .await
        .unwrap();

    let Incoming::Http(request) = server.await.unwrap() else {
        panic!("expected a plain http request");
    };
    assert!(request.peer_ip().is_loopback());
    request
        .respond_json(r#"{"isBonkServer":true}"#)
        .await
        .unwrap();

    let mut response = String::new();
    client.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Access-Control-Allow-Origin: *"));
    assert!(response.contains("Content-Type: application/json"));
    assert!(response.ends_with(r#"{"isBonkServer":true}"#));
}
