use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Routes:
/// - `/ok` always 200
/// - `/status/:code` responds with `code`
/// - `/delay/ms/:delay_ms` 200 after the delay
/// - `/books/` 200 with a JSON list of books
pub fn router(hits: Arc<AtomicU64>) -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/status/:code", get(status))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/books/", get(books))
        .with_state(hits)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, router(Arc::new(AtomicU64::new(0))))
        .await
        .unwrap();
}

/// A mock service running in the background on an ephemeral local port.
pub struct MockService {
    addr: SocketAddr,
    hits: Arc<AtomicU64>,
}

impl MockService {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests received so far, across all routes.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn() -> MockService {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU64::new(0));

    let app = router(hits.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    debug!("Mock service listening on {addr}");
    MockService { addr, hits }
}

/// A local address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[debug_handler]
async fn ok(State(hits): State<Arc<AtomicU64>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

#[debug_handler]
async fn status(State(hits): State<Arc<AtomicU64>>, Path(code): Path<u16>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

#[debug_handler]
async fn delay(State(hits): State<Arc<AtomicU64>>, Path(delay_ms): Path<u64>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    StatusCode::OK
}

#[derive(Serialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
}

#[debug_handler]
async fn books(State(hits): State<Arc<AtomicU64>>) -> Json<Vec<Book>> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(vec![
        Book {
            id: 1,
            title: "The Rust Programming Language".to_string(),
            author: "Steve Klabnik".to_string(),
        },
        Book {
            id: 2,
            title: "Programming Rust".to_string(),
            author: "Jim Blandy".to_string(),
        },
    ])
}
