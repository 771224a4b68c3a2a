//! Shared helpers for unit tests: a scriptable camera device and a webhook
//! receiver, both real HTTP servers on loopback.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc;

/// Smallest byte string that still looks like a JPEG (SOI .. EOI).
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0xFF, 0xD9];

/// Serve `app` on an ephemeral loopback port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[derive(Default)]
struct Behaviour {
    status: Option<u16>,
    delay:  Option<Duration>,
}

#[derive(Default)]
struct CameraState {
    behaviour: Mutex<Behaviour>,
    captures:  AtomicUsize,
}

/// Handle to a running fake camera.
pub struct MockCamera {
    pub addr: SocketAddr,
    state:    Arc<CameraState>,
}

impl MockCamera {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer `/capture` with `status` and no body from now on.
    pub fn fail_with(&self, status: u16) {
        self.state.behaviour.lock().unwrap().status = Some(status);
    }

    /// Sleep before answering `/capture`.
    pub fn delay(&self, d: Duration) {
        self.state.behaviour.lock().unwrap().delay = Some(d);
    }

    pub fn captures(&self) -> usize {
        self.state.captures.load(Ordering::SeqCst)
    }
}

pub async fn mock_camera() -> MockCamera {
    let state = Arc::new(CameraState::default());
    let app = Router::new()
        .route("/", get(|| async { "ESP32-CAM" }))
        .route("/capture", get(camera_capture))
        .with_state(Arc::clone(&state));
    MockCamera { addr: serve(app).await, state }
}

async fn camera_capture(State(state): State<Arc<CameraState>>) -> Response {
    state.captures.fetch_add(1, Ordering::SeqCst);
    let (status, delay) = {
        let b = state.behaviour.lock().unwrap();
        (b.status, b.delay)
    };
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
    match status {
        Some(code) => StatusCode::from_u16(code).unwrap().into_response(),
        None => ([(header::CONTENT_TYPE, "image/jpeg")], JPEG).into_response(),
    }
}

/// One request received by [`mock_webhook`].
#[derive(Debug)]
pub struct Delivery {
    pub authorization: Option<String>,
    pub body:          serde_json::Value,
}

/// Start a webhook receiver; returns its URL and the stream of deliveries.
pub async fn mock_webhook() -> (String, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/webhook/capture",
        post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
            let tx = tx.clone();
            async move {
                let authorization = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = tx.send(Delivery { authorization, body });
                StatusCode::OK
            }
        }),
    );
    let addr = serve(app).await;
    (format!("http://{addr}/webhook/capture"), rx)
}
