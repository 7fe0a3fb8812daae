#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use emz_sku_tonic_core::proto::{FILE_DESCRIPTOR_SET, sku_allocator_server::SkuAllocatorServer};
use server::config::{CliArgs, ServerConfig};
use server::grpc::handler::SkuService;
use server::state::{AppState, connect};
use server::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;
    let result = run(&config).await;
    providers.shutdown();
    result
}

async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let backend = connect(&config.store).await?;
    let state = AppState::new(backend, config);
    log_startup_info(config, &state);

    let shutdown = CancellationToken::new();
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<SkuAllocatorServer<SkuService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let grpc = Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_sku_service(SkuService::new(
            state.clone(),
            shutdown.clone(),
        )))
        .serve_with_shutdown(config.grpc_addr, shutdown.clone().cancelled_owned());

    let listener = TcpListener::bind(config.http_addr).await?;
    let http = axum::serve(listener, server::http::router(state.clone()))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    tokio::spawn(shutdown_signal(shutdown.clone(), health_reporter));

    // Either listener failing takes the other one down with it.
    let (grpc, http) = tokio::join!(
        async {
            let result = grpc.await;
            shutdown.cancel();
            result
        },
        async {
            let result = http.await;
            shutdown.cancel();
            result
        },
    );
    grpc?;
    http?;

    tracing::info!(
        allocated = state.stats().allocated(),
        failed = state.stats().failed(),
        "Service shut down successfully"
    );
    Ok(())
}

fn log_startup_info(config: &ServerConfig, state: &AppState) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting SKU service (HTTP {}, gRPC {}) with full config: {:#?}",
            config.http_addr,
            config.grpc_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting SKU service (HTTP {}, gRPC {}) on the {} store",
            config.http_addr,
            config.grpc_addr,
            state.backend().name()
        );
    }
}

fn build_sku_service(service: SkuService) -> SkuAllocatorServer<SkuService> {
    SkuAllocatorServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Waits for Ctrl+C or SIGTERM (or for a listener to fail), marks the gRPC
/// service as not serving, and cancels `shutdown` so both listeners drain.
async fn shutdown_signal(shutdown: CancellationToken, health_reporter: HealthReporter) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<SkuAllocatorServer<SkuService>>()
        .await;

    // 2. Stop accepting work and drain both listeners
    shutdown.cancel();
}
