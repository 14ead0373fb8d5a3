use axum::{
    debug_handler,
    extract::Path,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use metrics::{counter, gauge};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Token accepted by the `/secure` routes.
pub const MOCK_TOKEN: &str = "mock-secret";

pub fn router() -> Router {
    Router::new()
        .route("/find/:account/:table/:id", get(find))
        .route("/delay/ms/:delay_ms/find/:account/:table/:id", get(delay))
        .route("/limited/:max_rps/find/:account/:table/:id", get(limited))
        .route("/secure/find/:account/:table/:id", get(secure))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(addr: SocketAddr) {
    let listener = TcpListener::bind(&addr).await.unwrap();
    serve(listener).await;
}

pub async fn serve(listener: TcpListener) {
    axum::serve(listener, router()).await.unwrap();
}

/// Serve on an ephemeral localhost port in the background.
pub async fn spawn() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener));
    addr
}

#[derive(Debug, Serialize)]
pub struct Row {
    pub account: String,
    pub table: String,
    pub id: String,
}

/// Ids prefixed `missing` are not found, ids prefixed `fail` are server errors.
fn lookup(account: String, table: String, id: String) -> Result<Json<Row>, StatusCode> {
    REQUESTS.fetch_add(1, Ordering::Relaxed);
    counter!("mock_service.requests").increment(1);

    if id.starts_with("missing") {
        Err(StatusCode::NOT_FOUND)
    } else if id.starts_with("fail") {
        Err(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        Ok(Json(Row { account, table, id }))
    }
}

#[debug_handler]
pub async fn find(
    Path((account, table, id)): Path<(String, String, String)>,
) -> Result<Json<Row>, StatusCode> {
    lookup(account, table, id)
}

#[debug_handler]
pub async fn delay(
    Path((delay_ms, account, table, id)): Path<(u64, String, String, String)>,
) -> Result<Json<Row>, StatusCode> {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    lookup(account, table, id)
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Rejects with 429 once more than `max_rps` requests arrive in a second.
#[debug_handler]
pub async fn limited(
    Path((max_rps, account, table, id)): Path<(u32, String, String, String)>,
) -> Result<Json<Row>, StatusCode> {
    let read = LIMITED_MAP.read().unwrap().get(&max_rps).cloned();
    let limiter = if let Some(limiter) = read {
        limiter
    } else {
        let limiter = Arc::new(rate_limiter(max_rps));
        LIMITED_MAP
            .write()
            .unwrap()
            .entry(max_rps)
            .or_insert(limiter)
            .clone()
    };

    match limiter.check() {
        Ok(_) => lookup(account, table, id),
        Err(_) => {
            debug!("Rejected {id:?}, over {max_rps} rps");
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}

#[debug_handler]
pub async fn secure(
    headers: HeaderMap,
    Path((account, table, id)): Path<(String, String, String)>,
) -> Result<Json<Row>, StatusCode> {
    let expected = format!("Bearer {MOCK_TOKEN}");
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => lookup(account, table, id),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/** Utils **/

pub fn rate_limiter(rps: u32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(
        NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN),
    ))
}

/** Request Printer **/

static REQUESTS: AtomicU64 = AtomicU64::new(0);

pub async fn rps_measure_task() {
    let mut last = REQUESTS.load(Ordering::Relaxed);
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let now = REQUESTS.load(Ordering::Relaxed);
        println!("{} RPS", now - last);
        gauge!("mock_service.rps").set((now - last) as f64);
        last = now;
    }
}
