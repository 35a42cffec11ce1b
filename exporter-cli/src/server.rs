//! HTTP endpoint serving the exposition.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use fritzbox_cable::Exporter;
use fritzbox_cable::metrics::CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info};

#[derive(Clone)]
struct AppState {
    exporter: Arc<Exporter>,
    telemetry_path: Arc<str>,
}

pub struct MetricsServer {
    bind_address: String,
    telemetry_path: String,
    exporter: Arc<Exporter>,
    cancel_token: CancellationToken,
}

impl MetricsServer {
    pub fn new(
        bind_address: impl Into<String>,
        telemetry_path: impl Into<String>,
        exporter: Arc<Exporter>,
    ) -> Self {
        Self {
            bind_address: bind_address.into(),
            telemetry_path: telemetry_path.into(),
            exporter,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token that stops the server once cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            exporter: self.exporter.clone(),
            telemetry_path: Arc::from(self.telemetry_path.as_str()),
        };

        let mut router = Router::new().route(&self.telemetry_path, get(metrics_handler));
        if self.telemetry_path != "/" {
            router = router.route("/", get(root_handler));
        }

        router.with_state(state).layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let mut make_span =
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::DEBUG);
                    use tower_http::trace::MakeSpan;
                    make_span.make_span(req)
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        let on_response = tower_http::trace::DefaultOnResponse::new()
                            .level(tracing::Level::DEBUG);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                ),
        )
    }

    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.bind_address.as_str())
            .await
            .with_context(|| format!("failed to listen on {}", self.bind_address))?;
        let local_addr = listener.local_addr()?;

        info!(
            address = %local_addr,
            path = %self.telemetry_path,
            "metrics server listening"
        );

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("metrics server shutting down");
            })
            .await
            .context("metrics server failed")?;

        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.exporter.collect().await {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn root_handler(State(state): State<AppState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.telemetry_path.to_string())],
    )
        .into_response()
}
