//! Tests against an in-process `log.io` endpoint served by axum.
use super::*;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(2);

/// What the fake endpoint does once a client connects.
struct Script {
    auth_replies: Vec<String>,
    frames: Vec<String>,
    close_after_frames: bool,
}

impl Script {
    fn ready(frames: Vec<String>) -> Self {
        Self {
            auth_replies: vec![json!({"type": "ready"}).to_string()],
            frames,
            close_after_frames: false,
        }
    }
}

/// Starts the endpoint and returns its origin plus every text frame the
/// client sent (a close frame shows up as `"<close>"`).
async fn spawn_server(script: Script) -> (String, mpsc::UnboundedReceiver<String>) {
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let script = Arc::new(script);

    let app = Router::new().route(
        "/api/v0/log.io",
        get(move |ws: WebSocketUpgrade| {
            let script = script.clone();
            let seen_tx = seen_tx.clone();
            async move { ws.on_upgrade(move |socket| serve(socket, script, seen_tx)) }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), seen_rx)
}

async fn serve(mut socket: WebSocket, script: Arc<Script>, seen: mpsc::UnboundedSender<String>) {
    match socket.recv().await {
        Some(Ok(Message::Text(auth))) => {
            let _ = seen.send(auth);
        }
        _ => return,
    }
    for frame in script.auth_replies.iter().chain(script.frames.iter()) {
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    if script.close_after_frames {
        let _ = socket.send(Message::Close(None)).await;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let _ = seen.send(text);
            }
            Message::Close(_) => {
                let _ = seen.send("<close>".to_string());
                break;
            }
            _ => {}
        }
    }
}

fn options(origin: &str) -> DialOptions {
    let mut opts = DialOptions::new(origin);
    opts.connect_timeout = WAIT;
    opts.auth_timeout = WAIT;
    opts
}

fn log_frame(message: &str) -> Value {
    json!({"type": "log", "time": 1_700_000_000_000_i64, "lvl": "INFO", "log": message})
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

fn as_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap()
}

/// Registers listeners that forward into channels, then starts dispatch.
fn wire(
    client: &LogIo,
) -> (
    mpsc::UnboundedReceiver<String>,
    mpsc::UnboundedReceiver<Option<CloseReason>>,
) {
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = mpsc::unbounded_channel();
    let _ = client.add_log_listener(move |record| {
        let _ = log_tx.send(record.message.clone());
    });
    let _ = client.add_close_listener(move |reason| {
        let _ = close_tx.send(reason.clone());
    });
    client.start();
    (log_rx, close_rx)
}

#[tokio::test]
async fn dial_sends_token_and_completes_on_ready() {
    let (origin, mut seen) = spawn_server(Script::ready(vec![])).await;

    let client = dial(&options(&origin), "secret").await.unwrap();

    assert_eq!(as_json(&next(&mut seen).await), json!({"token": "secret"}));
    assert!(client.is_active());
}

#[tokio::test]
async fn dial_skips_unrelated_replies_before_ready() {
    let mut script = Script::ready(vec![]);
    script
        .auth_replies
        .insert(0, json!({"type": "motd", "text": "hi"}).to_string());
    let (origin, _seen) = spawn_server(script).await;

    let client = dial(&options(&origin), "secret").await.unwrap();
    assert!(client.is_active());
}

#[tokio::test]
async fn dial_fails_with_server_error_message() {
    let script = Script {
        auth_replies: vec![json!({"type": "error", "message": "bad token"}).to_string()],
        frames: vec![],
        close_after_frames: false,
    };
    let (origin, _seen) = spawn_server(script).await;

    let err = dial(&options(&origin), "nope").await.unwrap_err();
    assert!(matches!(err, DialError::Rejected(ref msg) if msg == "bad token"), "{err:?}");
}

#[tokio::test]
async fn dial_fails_on_unparseable_reply() {
    let script = Script {
        auth_replies: vec!["<html>".to_string()],
        frames: vec![],
        close_after_frames: false,
    };
    let (origin, _seen) = spawn_server(script).await;

    let err = dial(&options(&origin), "secret").await.unwrap_err();
    assert!(matches!(err, DialError::Handshake(_)), "{err:?}");
}

#[tokio::test]
async fn dial_fails_when_server_closes_before_reply() {
    let script = Script {
        auth_replies: vec![],
        frames: vec![],
        close_after_frames: true,
    };
    let (origin, _seen) = spawn_server(script).await;

    let err = dial(&options(&origin), "secret").await.unwrap_err();
    assert!(matches!(err, DialError::Closed), "{err:?}");
}

#[tokio::test]
async fn dial_rejects_origin_without_host() {
    let err = dial(&options("not-a-url"), "secret").await.unwrap_err();
    assert!(matches!(err, DialError::InvalidOrigin(_)));
}

#[tokio::test]
async fn dial_times_out_and_drops_half_open_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accepts the TCP connection but never answers the upgrade request.
    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        loop {
            match sock.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    });

    let mut opts = options(&format!("http://{}", addr));
    opts.connect_timeout = Duration::from_millis(200);

    let err = dial(&opts, "secret").await.unwrap_err();
    assert!(matches!(err, DialError::Timeout), "{err:?}");

    tokio::time::timeout(WAIT, server)
        .await
        .expect("client socket was not closed")
        .unwrap();
}

#[tokio::test]
async fn dial_reports_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = dial(&options(&format!("http://{}", addr)), "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, DialError::Connect(_)), "{err:?}");
}

#[tokio::test]
async fn secure_dial_fails_cleanly_without_tls_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accepts the connection and hangs up before any TLS handshake.
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        drop(sock);
    });

    let err = dial(&options(&format!("https://{}", addr)), "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, DialError::Connect(_)), "{err:?}");
}

#[tokio::test]
async fn batched_messages_reach_listeners_in_order() {
    let frames = vec![
        json!([log_frame("a"), log_frame("b"), log_frame("c")]).to_string(),
        log_frame("d").to_string(),
    ];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for listener in ["first", "second"] {
        let tx = tx.clone();
        let _ = client.add_log_listener(move |record| {
            let _ = tx.send(format!("{}:{}", listener, record.message));
        });
    }
    client.start();

    let mut got = Vec::new();
    for _ in 0..8 {
        got.push(next(&mut rx).await);
    }
    assert_eq!(
        got,
        vec![
            "first:a", "second:a", "first:b", "second:b", "first:c", "second:c", "first:d",
            "second:d"
        ]
    );
}

#[tokio::test]
async fn ping_is_answered_with_echoed_data() {
    let frames = vec![
        json!({"type": "ping", "data": {"seq": 7}}).to_string(),
        json!([{"type": "ping"}, {"type": "ping", "data": null}]).to_string(),
    ];
    let (origin, mut seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let _ = wire(&client);

    let _token = next(&mut seen).await;
    assert_eq!(
        as_json(&next(&mut seen).await),
        json!({"type": "pong", "data": {"seq": 7}})
    );
    assert_eq!(as_json(&next(&mut seen).await), json!({"type": "pong"}));
    assert_eq!(
        as_json(&next(&mut seen).await),
        json!({"type": "pong", "data": null})
    );
}

#[tokio::test]
async fn server_error_is_terminal() {
    let frames = vec![
        json!([
            log_frame("before"),
            {"type": "error", "message": "boom"},
            log_frame("after")
        ])
        .to_string(),
        log_frame("later").to_string(),
    ];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let (mut logs, mut closes) = wire(&client);

    assert_eq!(next(&mut logs).await, "before");
    assert_eq!(
        next(&mut closes).await,
        Some(CloseReason::Server("boom".into()))
    );
    assert!(!client.is_active());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(logs.try_recv().is_err());
    assert!(closes.try_recv().is_err());

    client.close();
    assert!(closes.try_recv().is_err());
}

#[tokio::test]
async fn close_twice_notifies_once() {
    let (origin, mut seen) = spawn_server(Script::ready(vec![])).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let (_logs, mut closes) = wire(&client);

    client.close();
    client.close();

    assert_eq!(next(&mut closes).await, None);
    assert!(!client.is_active());
    tokio::time::timeout(WAIT, client.closed())
        .await
        .expect("connection task did not finish");

    let _token = next(&mut seen).await;
    assert_eq!(next(&mut seen).await, "<close>");
    assert!(closes.try_recv().is_err());
}

#[tokio::test]
async fn set_level_sends_control_message_while_connected() {
    let (origin, mut seen) = spawn_server(Script::ready(vec![])).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let _ = wire(&client);

    client.set_level(LogLevel::Warn);
    let _token = next(&mut seen).await;
    assert_eq!(
        as_json(&next(&mut seen).await),
        json!({"type": "set-level", "level": "WARN"})
    );

    client.close();
    client.set_level(LogLevel::Debug);
    assert_eq!(next(&mut seen).await, "<close>");
}

#[tokio::test]
async fn server_close_notifies_without_reason() {
    let mut script = Script::ready(vec![log_frame("last").to_string()]);
    script.close_after_frames = true;
    let (origin, _seen) = spawn_server(script).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let (mut logs, mut closes) = wire(&client);

    assert_eq!(next(&mut logs).await, "last");
    assert_eq!(next(&mut closes).await, None);
    assert!(!client.is_active());
}

#[tokio::test]
async fn lenient_mode_drops_malformed_frames() {
    let frames = vec!["{oops".to_string(), log_frame("fine").to_string()];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let (mut logs, mut closes) = wire(&client);

    assert_eq!(next(&mut logs).await, "fine");
    assert!(client.is_active());
    assert!(closes.try_recv().is_err());
}

#[tokio::test]
async fn strict_mode_closes_on_malformed_frame() {
    let frames = vec!["{oops".to_string(), log_frame("never").to_string()];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let mut opts = options(&origin);
    opts.json_mode = JsonMode::Strict;
    let client = dial(&opts, "secret").await.unwrap();
    let (mut logs, mut closes) = wire(&client);

    assert!(matches!(
        next(&mut closes).await,
        Some(CloseReason::Malformed(_))
    ));
    assert!(!client.is_active());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(logs.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribed_log_listener_stops_receiving() {
    let frames = vec![log_frame("one").to_string()];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();

    let (dropped_tx, mut dropped_rx) = mpsc::unbounded_channel::<String>();
    let sub = client.add_log_listener(move |record| {
        let _ = dropped_tx.send(record.message.clone());
    });
    sub.unsubscribe();
    let (mut logs, _closes) = wire(&client);

    assert_eq!(next(&mut logs).await, "one");
    assert!(dropped_rx.try_recv().is_err());
}

#[tokio::test]
async fn close_from_listener_stops_batch_and_closes_socket() {
    let frames = vec![json!([log_frame("a"), log_frame("b")]).to_string()];
    let (origin, mut seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();

    let (log_tx, mut logs) = mpsc::unbounded_channel();
    let inner = client.clone();
    let _ = client.add_log_listener(move |record| {
        let _ = log_tx.send(record.message.clone());
        inner.close();
    });
    let (close_tx, mut closes) = mpsc::unbounded_channel();
    let _ = client.add_close_listener(move |reason| {
        let _ = close_tx.send(reason.clone());
    });
    client.start();

    assert_eq!(next(&mut logs).await, "a");
    assert_eq!(next(&mut closes).await, None);
    tokio::time::timeout(WAIT, client.closed())
        .await
        .expect("connection task did not finish");

    let _token = next(&mut seen).await;
    assert_eq!(next(&mut seen).await, "<close>");
    assert!(logs.try_recv().is_err());
    assert!(closes.try_recv().is_err());
}

#[tokio::test]
async fn dropping_last_handle_closes_connection() {
    let (origin, mut seen) = spawn_server(Script::ready(vec![])).await;
    let client = dial(&options(&origin), "secret").await.unwrap();
    let other = client.clone();
    let _token = next(&mut seen).await;

    drop(client);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(other.is_active());
    assert!(seen.try_recv().is_err());

    drop(other);
    assert_eq!(next(&mut seen).await, "<close>");
}

#[tokio::test]
async fn pings_are_answered_before_start() {
    let frames = vec![
        json!({"type": "ping", "data": 1}).to_string(),
        log_frame("held").to_string(),
    ];
    let (origin, mut seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();

    let _token = next(&mut seen).await;
    assert_eq!(
        as_json(&next(&mut seen).await),
        json!({"type": "pong", "data": 1})
    );

    let (mut logs, _closes) = wire(&client);
    assert_eq!(next(&mut logs).await, "held");
}

#[tokio::test]
async fn close_before_start_is_reported_on_start() {
    let frames = vec![json!({"type": "error", "message": "boom"}).to_string()];
    let (origin, _seen) = spawn_server(Script::ready(frames)).await;
    let client = dial(&options(&origin), "secret").await.unwrap();

    tokio::time::timeout(WAIT, client.closed())
        .await
        .expect("connection task did not finish");
    assert!(!client.is_active());

    let (_logs, mut closes) = wire(&client);
    assert_eq!(
        next(&mut closes).await,
        Some(CloseReason::Server("boom".into()))
    );
}
