//! Server internals: configuration, shared state, the HTTP and gRPC
//! surfaces, and telemetry.

pub mod config;
pub mod grpc;
pub mod http;
pub mod state;
pub mod telemetry;
