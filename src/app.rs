use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Settings;
use crate::error::BootstrapError;
use crate::instrumentation::Instrumentation;
use crate::metrics::{gather_metrics, WORKER_HTTP_REQUESTS_TOTAL, WORKER_HTTP_REQUEST_DURATION_SECONDS, WORKER_LISTENING};

struct AppState {
    worker_id: String,
    started_at: Instant,
}

pub struct App {
    router: Router,
}

impl App {
    /// Requires an [`Instrumentation`] handle so the app can only be built once hooks are installed.
    pub fn build(instrumentation: &Instrumentation, settings: &Settings) -> Self {
        let state = Arc::new(AppState {
            worker_id: settings.worker_id.clone(),
            started_at: Instant::now(),
        });

        let router = Router::new()
            .route("/api/health", get(health))
            .route("/metrics", get(metrics))
            .route_layer(middleware::from_fn(track_requests))
            .with_state(state);

        debug!(
            worker_id = %settings.worker_id,
            instrumentation_activated_at = %instrumentation.activated_at(),
            "Application built"
        );

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn listen<F>(
        self,
        host: &str,
        port: u16,
        mut shutdown: broadcast::Receiver<()>,
        on_ready: F,
    ) -> Result<Server, BootstrapError>
    where
        F: FnOnce(SocketAddr),
    {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| BootstrapError::Bind {
                addr: format!("{host}:{port}"),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        WORKER_LISTENING.set(1);
        let router = self.router;
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                })
                .await;
            WORKER_LISTENING.set(0);
            result
        });

        on_ready(local_addr);
        Ok(Server { local_addr, task })
    }
}

pub struct Server {
    local_addr: SocketAddr,
    pub(crate) task: JoinHandle<std::io::Result<()>>,
}

impl Server {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "workerId": state.worker_id,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn metrics() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], gather_metrics())
}

async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();

    WORKER_HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());
    WORKER_HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}
