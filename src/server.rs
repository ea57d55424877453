use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::Config;
use crate::handlers::dispatch;
use crate::middleware::allow_any_origin_on_json;
use crate::state::AppState;

// build the router; every path is handled by the method dispatcher
pub fn build_router(state: Arc<AppState>) -> Router {
    tracing::debug!(
        "Building router with max upload size: {} bytes",
        state.config.max_upload_size
    );

    Router::new()
        .fallback(dispatch)
        .layer(axum::middleware::from_fn(allow_any_origin_on_json))
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// accept and serve connections until `shutdown` is cancelled
///
/// `boss_threads` acceptor tasks share the listener; each accepted connection
/// is served on its own task.
pub async fn run(listener: TcpListener, app: Router, config: &Config, shutdown: CancellationToken) {
    let listener = Arc::new(listener);
    let header_timeout = Duration::from_secs(config.header_read_timeout_secs);

    let acceptors: Vec<_> = (0..config.boss_threads)
        .map(|id| {
            tokio::spawn(accept_loop(
                id,
                Arc::clone(&listener),
                app.clone(),
                header_timeout,
                shutdown.clone(),
            ))
        })
        .collect();

    tracing::info!("Server running and ready to accept connections");
    for acceptor in acceptors {
        if let Err(e) = acceptor.await {
            tracing::error!("Acceptor task failed: {}", e);
        }
    }
}

async fn accept_loop(
    id: usize,
    listener: Arc<TcpListener>,
    app: Router,
    header_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::trace!(acceptor = id, "Accepted connection from {}", peer);
                    tokio::spawn(serve_connection(
                        stream,
                        peer,
                        app.clone(),
                        header_timeout,
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    // usually fd exhaustion, back off briefly
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            () = shutdown.cancelled() => {
                tracing::debug!(acceptor = id, "Acceptor stopped");
                return;
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    header_timeout: Duration,
    shutdown: CancellationToken,
) {
    let span = tracing::debug_span!("connection", %peer);

    async move {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(header_timeout)
            .keep_alive(true);

        let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
        tokio::pin!(conn);

        let mut draining = false;
        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!("Connection error: {}", e);
                    }
                    break;
                }
                () = shutdown.cancelled(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
        tracing::trace!("Connection closed");
    }
    .instrument(span)
    .await;
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("filedrop starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 FILE SERVER: http://{}:{}", config.host, config.port);
    tracing::info!(
        "📁 Serving files from: {:?}",
        config
            .path_parent
            .canonicalize()
            .unwrap_or(config.path_parent.clone())
    );
    tracing::info!("📤 Uploads land in: {:?} ({}{}/...)", config.upload_dir(), config.url_parent, config.path_dir);
    tracing::info!(
        "🧵 {} acceptor(s), {} worker threads, {} blocking threads",
        config.boss_threads,
        config.worker_threads,
        config.blocking_threads
    );
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
