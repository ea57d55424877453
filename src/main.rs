use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use filedrop::config::Config;
use filedrop::state::AppState;
use filedrop::server::{build_router, print_startup_banner, run};
use filedrop::utils::shutdown_signal;

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // load configuration from environment variables
    let config = Config::from_env();

    // worker threads serve connections, the blocking pool does image work
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .max_blocking_threads(config.blocking_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();

        // uploads are renamed into this directory, it has to exist up front
        let upload_dir = config.upload_dir();
        if !upload_dir.exists() {
            std::fs::create_dir_all(&upload_dir).expect("Failed to create upload directory");
            tracing::info!("Created upload directory at: {:?}", upload_dir);
        }

        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port,
        ));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind file server");
        tracing::debug!("Listener bound to {}", addr);

        let state = Arc::new(AppState::new(config.clone()));
        let app = build_router(state);

        print_startup_banner(&config);

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            trigger.cancel();
        });

        run(listener, app, &config, shutdown).await;
        tracing::info!("File server stopped");
    });
}
