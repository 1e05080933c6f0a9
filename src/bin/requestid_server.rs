//! requestid-server: gRPC health server with request ID propagation
//!
//! Serves `grpc.health.v1.Health` behind the request ID layer. Useful for
//! checking a deployment's metadata handling end to end:
//!
//! ```text
//! grpcurl -plaintext -H 'requestid: abc' localhost:50051 grpc.health.v1.Health/Check
//! ```
//!
//! ## Configuration
//! - server.host / server.port: bind address (default 0.0.0.0:50051)
//! - request_id.name: metadata key (default "requestId")
//! - request_id.target: context field, or false
//! - request_id.generator: "uuid_v4" or "uuid_v7"

use std::net::SocketAddr;

use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tonic_health::ServingStatus;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use grpc_requestid::config::Config;
use grpc_requestid::utils::bootstrap::{init_tracing, parse_config_path};
use grpc_requestid::RequestIdLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let request_id = config.request_id.build().map_err(|e| {
        error!("Invalid request id configuration: {}", e);
        e
    })?;

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_service_status("", ServingStatus::Serving)
        .await;

    let addr: SocketAddr = config.server.addr().parse()?;
    info!(
        address = %addr,
        key = %request_id.key(),
        target = ?request_id.target(),
        "requestid-server listening"
    );

    Server::builder()
        .layer(TraceLayer::new_for_grpc())
        .layer(RequestIdLayer::new(request_id).with_response_echo())
        .add_service(health_service)
        .serve_with_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
