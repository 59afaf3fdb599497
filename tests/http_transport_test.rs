//! Integration tests for the HTTP transport against a local collector.

#![cfg(feature = "http")]

use axum::{extract::State, routing::post, Form, Router};
use evtrack::core::{serialize_info, EventRecord, SessionId, SessionManager};
use evtrack::host::PageMetrics;
use evtrack::transport::{Delivery, DeliveryMode, HttpTransport, Transport, TransportError};
use evtrack::{Config, EventKind};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

type Received = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn save(
    State(received): State<Received>,
    Form(fields): Form<HashMap<String, String>>,
) -> String {
    let reply = if fields.get("action").map(String::as_str) == Some("init") {
        "42".to_string()
    } else {
        String::new()
    };
    received
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(fields);
    reply
}

/// Start a collector on its own thread and runtime; the transport owns a
/// separate runtime and must not run inside this one.
fn start_collector() -> (SocketAddr, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let state = received.clone();
    let (addr_tx, addr_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build collector runtime");
        runtime.block_on(async move {
            let app = Router::new().route("/save", post(save)).with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind collector");
            addr_tx
                .send(listener.local_addr().expect("No local address"))
                .expect("Failed to report address");
            axum::serve(listener, app).await.expect("Collector failed");
        });
    });

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("Collector did not start");
    (addr, received)
}

fn records() -> Vec<EventRecord> {
    vec![
        EventRecord::new(0, 10, 5, 6, EventKind::Click, "//*[@id='go']"),
        EventRecord::new(0, 20, 7, 8, EventKind::MouseMove, "window"),
    ]
}

fn init_payload() -> evtrack::Payload {
    let metrics = PageMetrics {
        url: "https://shop.test/cart".to_string(),
        screen_width: 1440,
        ..PageMetrics::default()
    };
    let config = Config {
        task_name: "cart".to_string(),
        ..Config::default()
    };
    SessionManager::build_init_payload(&records(), metrics, &config)
}

#[test]
fn test_sync_init_returns_session_id() {
    let (addr, received) = start_collector();
    let transport = HttpTransport::new(format!("http://{addr}/save")).unwrap();

    let delivery = transport.send(&init_payload(), DeliveryMode::Sync).unwrap();
    match delivery {
        Delivery::Completed(body) => assert_eq!(SessionId::parse(&body), SessionId::new(42)),
        other => panic!("expected a completed delivery, got {other:?}"),
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let fields = &received[0];
    assert_eq!(fields["action"], "init");
    assert_eq!(fields["url"], "https://shop.test/cart");
    assert_eq!(fields["screenw"], "1440");
    assert_eq!(fields["task"], "cart");
    assert_eq!(fields["info"], serialize_info(&records()));
}

#[test]
fn test_async_append_runs_completion() {
    let (addr, received) = start_collector();
    let transport = HttpTransport::new(format!("http://{addr}/save")).unwrap();
    let payload = SessionManager::build_append_payload(SessionId::new(42).unwrap(), &records());

    let (done_tx, done_rx) = mpsc::channel();
    let delivery = transport
        .send(
            &payload,
            DeliveryMode::Async(Some(Box::new(move |r: Result<String, TransportError>| {
                let _ = done_tx.send(r);
            }))),
        )
        .unwrap();
    assert!(matches!(delivery, Delivery::Dispatched));

    let reply = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(reply, Ok(String::new()));

    let received = received.lock().unwrap();
    assert_eq!(received[0]["uid"], "42");
    assert_eq!(received[0]["action"], "append");
}

#[test]
fn test_unreachable_collector_is_a_network_error() {
    // Bind and drop a listener to get a port nobody is serving.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let transport = HttpTransport::new(format!("http://127.0.0.1:{port}/save")).unwrap();

    let result = transport.send(&init_payload(), DeliveryMode::Sync);
    assert!(matches!(result, Err(TransportError::Network(_))));
}
