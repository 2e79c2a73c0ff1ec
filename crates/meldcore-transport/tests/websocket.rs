//! Integration tests for the WebSocket transport: a real server and
//! client exchanging frames over loopback.

#[cfg(feature = "websocket")]
mod websocket {
    use meldcore_transport::{Connection, Transport, WebSocketTransport};

    /// Connects a tokio-tungstenite client to the given address.
    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url).await.expect("client connects");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        // Port 0 lets the OS pick a free port; local_addr tells the
        // client where to go.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.expect("bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });

        let mut client_ws = connect_client(&addr.to_string()).await;
        let server_conn = server_handle.await.expect("accept task completes");
        assert!(server_conn.id().into_inner() > 0);

        // Server to client.
        server_conn.send(b"hello from server").await.expect("send");

        use futures_util::StreamExt;
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // Client to server.
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_websocket_text_frames_arrive_as_bytes() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.expect("bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr.to_string()).await;
        let server_conn = server_handle.await.unwrap();

        // Browsers send JSON as text frames; the transport flattens
        // both frame kinds to bytes.
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws.send(Message::Text(r#"{"type":"heartbeat"}"#.into())).await.unwrap();

        let received = server_conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, br#"{"type":"heartbeat"}"#);
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.expect("bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("accept") });
        let mut client_ws = connect_client(&addr.to_string()).await;
        let server_conn = server_handle.await.unwrap();

        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv does not error");
        assert!(result.is_none(), "clean close surfaces as None");
    }
}
