//! Integration tests for the WebSocket listener.
//!
//! These spin up a real listener and a `tokio-tungstenite` client and check
//! that frames flow in both directions, that the upgrade target is
//! recorded, and that a pending read does not block a concurrent write.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use quickchess_transport::{Connection, WebSocketListener};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port and returns the listener plus its address.
    async fn listen() -> (WebSocketListener, String) {
        let listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        (listener, addr)
    }

    async fn connect_client(addr: &str, path: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (listener, addr) = listen().await;

        let server_handle = tokio::spawn(async move {
            let pending = listener.accept().await.expect("should accept");
            pending.upgrade().await.expect("should upgrade")
        });

        let mut client_ws = connect_client(&addr, "/player1/abc123").await;
        let server_conn = server_handle.await.expect("task should complete");

        assert!(server_conn.id().into_inner() > 0);
        assert_eq!(server_conn.target(), "/player1/abc123");

        // Server sends, client receives a text frame.
        server_conn
            .send("hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "hello from server");

        // Client sends, server receives.
        client_ws
            .send(Message::Text("e2e4".into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"e2e4");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (listener, addr) = listen().await;

        let server_handle = tokio::spawn(async move {
            listener.accept().await.unwrap().upgrade().await.unwrap()
        });

        let mut client_ws = connect_client(&addr, "/").await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        let (listener, addr) = listen().await;

        let server_handle = tokio::spawn(async move {
            listener.accept().await.unwrap().upgrade().await.unwrap()
        });

        let mut client_ws = connect_client(&addr, "/").await;
        let server_conn = Arc::new(server_handle.await.unwrap());

        // Park a reader on the connection; the client never sends anything.
        let reader = Arc::clone(&server_conn);
        let _pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), server_conn.send("ping"))
            .await
            .expect("send must not wait for the reader")
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "ping");
    }
}
