//! Exposes an in-process fake explorer API for use in integration tests.
//!
//! ```
//! use scanload_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/api/scan/transfers");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{Value, json};

/// How the fake API answers requests.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Answer with a successful list response.
    ///
    /// The list has `min(row, n)` entries, where `row` is taken from the request body.
    Transfers(usize),

    /// Answer every request with the given status and raw body.
    Fixed {
        /// HTTP status code.
        status: u16,
        /// Response body, sent as `application/json` regardless of its content.
        body: String,
    },
}

/// A request received by the [`TestServer`].
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    /// The request method.
    pub method: Method,
    /// The request path.
    pub path: String,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// The request body, or `Value::Null` if it was not JSON.
    pub body: Value,
}

#[derive(Clone, Debug)]
struct AppState {
    reply: Reply,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

/// An in-process fake explorer API for use in integration tests.
///
/// Every path is served with the configured [`Reply`], and all requests are recorded. The server
/// listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl TestServer {
    /// Starts a server that answers with three transfers per request.
    pub async fn new() -> Self {
        Self::with_reply(Reply::Transfers(3)).await
    }

    /// Starts a server that answers with the given reply.
    pub async fn with_reply(reply: Reply) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = AppState {
            reply,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            requests,
        }
    }

    /// Returns the base URL of the server, suitable as a scenario host.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn host(&self) -> String {
        format!("http://localhost:{}", self.socket.port())
    }

    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.host(), path)
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    state.requests.lock().unwrap().push(ReceivedRequest {
        method,
        path: uri.path().to_owned(),
        content_type,
        body: body.clone(),
    });

    match state.reply {
        Reply::Transfers(available) => {
            let row = body["row"].as_u64().unwrap_or(10) as usize;
            let address = body["address"].as_str().unwrap_or_default();
            let transfers: Vec<Value> = (0..available.min(row))
                .map(|i| {
                    json!({
                        "from": address,
                        "to": "16ZL8yLyXv3V3L3z9ofR1ovFLziyXaN1DPq4yffMAZ9czzBD",
                        "extrinsic_index": format!("1000-{i}"),
                        "hash": format!("0x{i:064x}"),
                        "amount": "1",
                        "success": true,
                    })
                })
                .collect();

            let envelope = json!({
                "code": 0,
                "message": "Success",
                "generated_at": 1_600_000_000,
                "data": { "count": transfers.len(), "transfers": transfers },
            });
            (StatusCode::OK, axum::Json(envelope)).into_response()
        }
        Reply::Fixed { status, body } => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
    }
}
