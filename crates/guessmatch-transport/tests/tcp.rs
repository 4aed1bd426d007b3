//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a plain `tokio::net::TcpStream` client.

use guessmatch_transport::{Connection, TcpTransport, Transport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Binds on port 0 and returns the transport plus its concrete address.
async fn bind_any() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_tcp_accept_and_send_receive() {
    let (mut transport, addr) = bind_any().await;

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });

    let mut client = TcpStream::connect(&addr).await.expect("client should connect");
    let server_conn = server_handle.await.expect("task should complete");

    assert!(server_conn.id().get() > 0);

    // Server sends, client receives.
    server_conn
        .send(b"hello from server")
        .await
        .expect("send should succeed");
    let mut buf = [0u8; 17];
    client.read_exact(&mut buf).await.expect("client read");
    assert_eq!(&buf, b"hello from server");

    // Client sends, server receives.
    client.write_all(b"hello from client").await.unwrap();
    let mut received = Vec::new();
    while received.len() < 17 {
        let chunk = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, b"hello from client");

    server_conn.close().await.expect("close should succeed");
    let n = client.read(&mut [0u8; 8]).await.expect("read after close");
    assert_eq!(n, 0, "client should see end-of-stream after close");
}

#[tokio::test]
async fn test_tcp_recv_returns_none_on_client_close() {
    let (mut transport, addr) = bind_any().await;

    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let client = TcpStream::connect(&addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    drop(client);

    let result = server_conn.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_tcp_connection_ids_are_unique() {
    let (mut transport, addr) = bind_any().await;

    let server_handle = tokio::spawn(async move {
        let a = transport.accept().await.unwrap();
        let b = transport.accept().await.unwrap();
        (a.id(), b.id())
    });

    let _c1 = TcpStream::connect(&addr).await.unwrap();
    let _c2 = TcpStream::connect(&addr).await.unwrap();

    let (a, b) = server_handle.await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_tcp_bind_on_taken_port_fails() {
    let (_transport, addr) = bind_any().await;

    let err = TcpTransport::bind(&addr).await.err().expect("port is taken");
    assert!(matches!(err, TransportError::Bind { .. }));
    assert!(err.to_string().contains(&addr));
}
