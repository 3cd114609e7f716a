use anyhow::Context;
use axum::Router;
use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use tokio::net;

use crate::domain::AppState;
use crate::infrastructure::http::handlers::content::{
    create_content, delete_content, get_content, request_transition, update_content,
};
use crate::infrastructure::http::handlers::health_check;
use crate::infrastructure::http::handlers::reader::{list_content, read_content};

mod api;
mod handlers;

/// Configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig<'a> {
    pub port: &'a str,
}

/// The application's HTTP server. The underlying HTTP package is opaque to module consumers.
pub struct HttpServer {
    router: axum::Router,
    listener: net::TcpListener,
}

impl HttpServer {
    /// Returns a new HTTP server bound to the port specified in `config`.
    pub async fn new(state: impl AppState, config: HttpServerConfig<'_>) -> anyhow::Result<Self> {
        let trace_layer = tower_http::trace::TraceLayer::new_for_http().make_span_with(
            |request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                tracing::info_span!("http_request", method = ?request.method(), uri)
            },
        );
        // see: https://github.com/Ptrskay3/axum-prometheus
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        let router = routes()
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(trace_layer)
            .layer(prometheus_layer)
            .with_state(state);

        let listener = net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
            .await
            .with_context(|| format!("failed to listen on {}", config.port))?;

        Ok(Self { router, listener })
    }

    /// Runs the HTTP server until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let address = self.listener.local_addr()?;
        tracing::info!("listening on {}", address);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("received error from running server")?;
        Ok(())
    }
}

/// Application routes without the metrics endpoint and middleware.
/// The prometheus recorder is process global, so tests drive this router directly.
pub fn router<S: AppState>(state: S) -> Router {
    routes().with_state(state)
}

fn routes<S: AppState>() -> Router<S> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .route("/content", get(list_content::<S>))
        .route("/content/{id}", get(read_content::<S>))
}

fn api_routes<S: AppState>() -> Router<S> {
    Router::new()
        .route("/content", axum::routing::post(create_content::<S>))
        .route(
            "/content/{id}",
            get(get_content::<S>)
                .patch(update_content::<S>)
                .delete(delete_content::<S>),
        )
        .route(
            "/content/{id}/transitions",
            axum::routing::post(request_transition::<S>),
        )
}
