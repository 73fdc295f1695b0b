//! Local `axum` server for exercising the HTTP clients.

use std::{collections::VecDeque, sync::Arc};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tokio::{net::TcpListener, sync::Mutex};

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    /// Path plus query string.
    pub uri: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct ServerState {
    responses: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<CapturedRequest>>,
    silent: bool,
}

pub struct TestServer {
    pub url: String,
    state: Arc<ServerState>,
}

impl TestServer {
    /// Serves the canned `(status, body)` responses in order; later requests get a 500.
    pub async fn serve(responses: Vec<(u16, String)>) -> Self {
        Self::start(ServerState {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
        .await
    }

    /// Accepts requests but never answers them.
    pub async fn silent() -> Self {
        Self::start(ServerState {
            silent: true,
            ..Default::default()
        })
        .await
    }

    async fn start(state: ServerState) -> Self {
        let state = Arc::new(state);
        let router = Router::new().fallback(respond).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { url, state }
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().await.clone()
    }
}

async fn respond(State(state): State<Arc<ServerState>>, method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()).map(str::to_string);

    state.requests.lock().await.push(CapturedRequest {
        method,
        uri: uri.to_string(),
        content_type,
        body,
    });

    if state.silent {
        std::future::pending::<()>().await;
    }

    let (status, body) = state
        .responses
        .lock()
        .await
        .pop_front()
        .unwrap_or((500, r#"{"error":"no scripted response"}"#.to_string()));

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
