// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! HTTP endpoint for Prometheus scrapes.
//!
//! Every request to the metrics path runs a full poll on the blocking pool.
//! A failed poll answers 500 so Prometheus marks the scrape as failed; the
//! process keeps serving.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use super::{encode_text, GpuCollector};
use crate::slurm::CommandRunner;

/// Build the router serving `metrics_path` and `/health`
pub fn router<R: CommandRunner + 'static>(collector: Arc<GpuCollector<R>>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler::<R>))
        .route("/health", get(health_handler))
        .with_state(collector)
}

/// Bind `addr` and serve until Ctrl-C
pub async fn serve<R: CommandRunner + 'static>(
    collector: Arc<GpuCollector<R>>,
    addr: SocketAddr,
    metrics_path: &str,
) -> std::io::Result<()> {
    let app = router(collector, metrics_path);
    let listener = TcpListener::bind(addr).await?;

    info!("Serving GPU metrics on http://{}{}", listener.local_addr()?, metrics_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
///
/// The SIGTERM handler is installed when this is called, not when the future
/// is first polled, so a stop request arriving during startup is not lost.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate());

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match terminate {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
        }
    }
}

async fn metrics_handler<R: CommandRunner + 'static>(State(collector): State<Arc<GpuCollector<R>>>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        collector
            .try_collect()
            .and_then(|families| encode_text(&families))
    })
    .await;

    match result {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            warn!("GPU poll failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)).into_response()
        }
        Err(e) => {
            warn!("GPU poll task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "poll task failed\n").into_response()
        }
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}
