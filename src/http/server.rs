//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: every method on every path goes to the dispatcher
//! - Wire up middleware (tracing, request deadline, body limit)
//! - Bind to the listener and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ListenerConfig, ServiceConfig};
use crate::http::request::inbound_request;
use crate::ingest::dispatcher::WebhookDispatcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<WebhookDispatcher>,
    pub listener: ListenerConfig,
}

/// HTTP front door for webhook ingestion.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, dispatcher: Arc<WebhookDispatcher>) -> Self {
        let state = AppState {
            dispatcher,
            listener: config.listener.clone(),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The body limit sits outside the timeout so the timeout wraps the
    /// route's own response body.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let max_body = config.listener.max_body_bytes;
        Router::new()
            .route("/", any(webhook_handler))
            .route("/{*path}", any(webhook_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(max_body))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn webhook_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Rejected webhook body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "message": "Payload Too Large",
                    "error": e.to_string(),
                })),
            )
                .into_response();
        }
    };

    let inbound = inbound_request(&parts, &bytes, peer, &state.listener);
    state.dispatcher.handle(inbound).await.into_response()
}
