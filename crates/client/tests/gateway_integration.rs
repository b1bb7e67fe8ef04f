//! Integration tests: GatewayClient against an in-process mock gateway.
//!
//! Each test stands up a real WebSocket server on a loopback port and
//! scripts the gateway side of the protocol.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use hermes_client::{ClientConfig, ClientError, GatewayClient, callback, handler};

const SHORT: Duration = Duration::from_secs(2);

fn test_config(port: u16) -> ClientConfig {
    let mut config = ClientConfig::new(format!("ws://127.0.0.1:{port}/ws"));
    config.reconnect_interval_ms = 50;
    // Keep pings out of the way unless a test wants them.
    config.ping_interval_ms = 60_000;
    config
}

async fn bind() -> (u16, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (port, listener)
}

fn response_for(cmd: &Value, data: Value) -> Message {
    let reply = json!({
        "type": "response",
        "id": cmd["id"],
        "command": cmd["command"],
        "data": data,
        "timestamp": "2024-01-01T00:00:00Z",
    });
    Message::Text(reply.to_string().into())
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_connect_and_command_round_trip() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            let reply = response_for(
                &cmd,
                json!({"contacts": [{"id": "c1", "name": "Alice"}]}),
            );
            cmd_tx.send(cmd).unwrap();
            ws.send(reply).await.unwrap();
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();
    assert!(client.is_connected());

    let response = client
        .send_command("getContacts", json!({}), SHORT)
        .await
        .unwrap();
    assert_eq!(response.command, "getContacts");
    assert_eq!(response.data["contacts"][0]["name"], "Alice");
    assert_eq!(client.pending_commands(), 0);

    // Wire shape of the command the gateway saw.
    let seen = cmd_rx.recv().await.unwrap();
    assert_eq!(seen["type"], "command");
    assert_eq!(seen["command"], "getContacts");
    assert_eq!(seen["timestamp"], Value::Null);
    assert!(seen["id"].as_str().is_some_and(|id| !id.is_empty()));

    client.disconnect().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_responses_out_of_order_match_by_id() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut commands = Vec::new();
        while commands.len() < 2 {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                commands.push(serde_json::from_str::<Value>(&text).unwrap());
            }
        }

        // Reply in reverse arrival order.
        for cmd in commands.iter().rev() {
            let reply = response_for(cmd, json!({"for": cmd["command"]}));
            ws.send(reply).await.unwrap();
        }

        // Keep the connection open until the client goes away.
        while ws.next().await.is_some() {}
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let (alpha, beta) = tokio::join!(
        client.send_command("alpha", json!({}), SHORT),
        client.send_command("beta", json!({}), SHORT),
    );

    assert_eq!(alpha.unwrap().data["for"], "alpha");
    assert_eq!(beta.unwrap().data["for"], "beta");
}

#[tokio::test]
async fn test_send_command_without_connection_fails_fast() {
    let client = GatewayClient::new(test_config(1));
    let result = client.send_command("getChats", json!({}), SHORT).await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
    assert_eq!(client.pending_commands(), 0);
}

#[tokio::test]
async fn test_pending_commands_rejected_on_transport_close() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // Swallow two commands, then drop the connection.
        let mut seen = 0;
        while seen < 2 {
            if let Some(Ok(Message::Text(_))) = ws.next().await {
                seen += 1;
            }
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let (a, b) = tokio::join!(
        client.send_command("one", json!({}), Duration::from_secs(10)),
        client.send_command("two", json!({}), Duration::from_secs(10)),
    );

    assert!(matches!(a, Err(ClientError::Connection(_))));
    assert!(matches!(b, Err(ClientError::Connection(_))));
    assert_eq!(client.pending_commands(), 0);
}

#[tokio::test]
async fn test_remote_error_rejects_only_its_command() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            let reply = if cmd["command"] == "bad" {
                let error = json!({"type": "error", "id": cmd["id"], "error": "boom"});
                Message::Text(error.to_string().into())
            } else {
                response_for(&cmd, json!({}))
            };
            ws.send(reply).await.unwrap();
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let result = client.send_command("bad", json!({}), SHORT).await;
    match result {
        Err(ClientError::Remote(message)) => assert_eq!(message, "boom"),
        other => panic!("expected remote error, got {other:?}"),
    }

    // The connection is still usable afterwards.
    assert!(client.is_connected());
    client.send_command("good", json!({}), SHORT).await.unwrap();
}

#[tokio::test]
async fn test_timeout_drops_late_response() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let mut first = true;
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            if first {
                first = false;
                // Answer only after the caller's timeout has elapsed.
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            ws.send(response_for(&cmd, json!({}))).await.unwrap();
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let result = client
        .send_command("slow", json!({}), Duration::from_millis(100))
        .await;
    assert!(matches!(result, Err(ClientError::Timeout)));
    assert_eq!(client.pending_commands(), 0);

    // The late response is silently dropped and the connection keeps
    // serving correlation traffic.
    let response = client.send_command("fast", json!({}), SHORT).await.unwrap();
    assert_eq!(response.command, "fast");
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text("this is not json".into())).await.unwrap();
        ws.send(Message::Text(r#"{"type": "wat"}"#.into())).await.unwrap();

        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            ws.send(response_for(&cmd, json!({}))).await.unwrap();
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let response = client.send_command("ping", json!({}), SHORT).await.unwrap();
    assert_eq!(response.command, "ping");
}

#[tokio::test]
async fn test_events_update_auth_flag_and_reach_handlers() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let authenticated = json!({"type": "event", "event": "authenticated"});
        ws.send(Message::Text(authenticated.to_string().into()))
            .await
            .unwrap();

        // Each sync command gates the next scripted batch of events.
        let mut syncs = 0;
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            ws.send(response_for(&cmd, json!({}))).await.unwrap();
            syncs += 1;

            let events = match syncs {
                1 => vec![json!({"type": "event", "event": "qr", "qr": "qr-data"})],
                2 => vec![
                    json!({"type": "event", "event": "qr", "qr": "ignored"}),
                    json!({"type": "event", "event": "ready"}),
                    json!({"type": "event", "event": "disconnected", "reason": "logout"}),
                ],
                _ => vec![],
            };
            for event in events {
                ws.send(Message::Text(event.to_string().into())).await.unwrap();
            }
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    let client_flag = client.clone();
    wait_until(move || client_flag.is_authenticated()).await;

    let (qr_tx, mut qr_rx) = mpsc::unbounded_channel::<Value>();
    let qr_handler = handler(move |payload| {
        let qr_tx = qr_tx.clone();
        async move {
            qr_tx.send(payload)?;
            Ok(())
        }
    });
    client.register_event_handler("qr", qr_handler.clone());

    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel::<()>();
    client.register_event_handler(
        "ready",
        handler(move |_payload| {
            let ready_tx = ready_tx.clone();
            async move {
                ready_tx.send(())?;
                Ok(())
            }
        }),
    );

    // Sync 1: a qr event reaches the registered handler.
    client.send_command("sync", json!({}), SHORT).await.unwrap();
    let payload = qr_rx.recv().await.unwrap();
    assert_eq!(payload["qr"], "qr-data");

    // Sync 2: the unregistered handler sees nothing more; ready and
    // disconnected still flow.
    client.unregister_event_handler("qr", &qr_handler);
    client.send_command("sync", json!({}), SHORT).await.unwrap();
    ready_rx.recv().await.unwrap();

    let client_flag = client.clone();
    wait_until(move || !client_flag.is_authenticated()).await;
    assert!(qr_rx.try_recv().is_err());

    // The gateway-level disconnected event does not drop the transport.
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_connect_callbacks_and_idempotent_connect() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while ws.next().await.is_some() {}
            });
        }
    });

    let client = GatewayClient::new(test_config(port));

    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));

    let counter = connects.clone();
    client.on_connect(callback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));
    let counter = disconnects.clone();
    client.on_disconnect(callback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    client.connect().await.unwrap();
    // Connecting while connected is a no-op.
    client.connect().await.unwrap();
    assert_eq!(connects.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_reconnects_after_server_side_drop() {
    let _ = env_logger::try_init();
    let (port, listener) = bind().await;

    tokio::spawn(async move {
        // First connection: handshake, then drop straight away.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        // Second connection: behave.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let cmd: Value = serde_json::from_str(&text).unwrap();
            ws.send(response_for(&cmd, json!({}))).await.unwrap();
        }
    });

    let client = GatewayClient::new(test_config(port));
    client.connect().await.unwrap();

    // The client notices the drop and reconnects on its own.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match client
            .send_command("ping", json!({}), Duration::from_millis(500))
            .await
        {
            Ok(response) => {
                assert_eq!(response.command, "ping");
                break;
            }
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("client never reconnected: {e}"),
        }
    }
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    let _ = env_logger::try_init();

    // Grab a port with nothing listening on it.
    let (port, listener) = bind().await;
    drop(listener);

    let mut config = test_config(port);
    config.reconnect_interval_ms = 20;
    config.max_reconnect_attempts = 2;

    let client = GatewayClient::new(config);
    assert!(matches!(
        client.connect().await,
        Err(ClientError::Connection(_))
    ));

    // Give the reconnection loop time to run dry.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!client.is_connected());
}
