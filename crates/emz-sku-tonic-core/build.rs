//! Generates the gRPC client and server bindings for `proto/emz_sku.proto`
//! and writes the encoded file descriptor set used by the reflection
//! service.
//!
//! The generated code is included via:
//!
//! ```rust,ignore
//! pub mod proto {
//!     tonic::include_proto!("emz.sku.v1");
//! }
//! ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("emz_sku_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/emz_sku.proto"], &["proto"])
        .unwrap();
}
