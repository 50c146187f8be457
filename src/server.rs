use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::error::Error;
use crate::issuance::IssuanceContext;

#[derive(Clone)]
pub struct AppState {
    pub issuance: Arc<IssuanceContext>,
}

/// HTTP front for an [`IssuanceContext`].
pub struct IssuanceServer {
    config: ServiceConfig,
    issuance: Arc<IssuanceContext>,
    shutdown_tx: watch::Sender<bool>,
}

impl IssuanceServer {
    pub fn new(config: ServiceConfig, issuance: IssuanceContext) -> anyhow::Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            issuance: Arc::new(issuance),
            shutdown_tx,
        })
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.issuance), self.config.max_body_bytes)
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("rsabs listening on {}", self.config.bind_addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(Self::shutdown_signal(self.shutdown_tx.subscribe()))
            .await?;

        info!("rsabs stopped");
        Ok(())
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    match sigterm {
                        Some(ref mut sigterm) => { sigterm.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown requested");
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Routes:
///
/// - `POST /` signs the blinded message in a JSON body, answering with the
///   signature as a `text/plain` hex numeral.
/// - `GET /public_key` serves the armored public key.
/// - `GET /health`
pub fn router(issuance: Arc<IssuanceContext>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(post_issue))
        .route("/public_key", get(get_public_key))
        .route("/health", get(get_health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { issuance })
}

pub async fn post_issue(State(state): State<AppState>, body: Bytes) -> Response {
    let issuance = Arc::clone(&state.issuance);
    match tokio::task::spawn_blocking(move || issuance.handle_json(&body)).await {
        Ok(Ok(signed)) => text(StatusCode::OK, signed.to_string()),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("signing task failed: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

pub async fn get_public_key(State(state): State<AppState>) -> Response {
    text(
        StatusCode::OK,
        state.issuance.public_key_export_string().to_string(),
    )
}

pub async fn get_health() -> &'static str {
    "ok"
}

fn error_response(e: &Error) -> Response {
    match e {
        Error::InvalidInput(_) => text(StatusCode::BAD_REQUEST, e.to_string()),
        Error::UnsupportedScheme(_) => text(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        _ => {
            error!("issuance failed: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

fn text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
