#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access `emz_sku` via
// `emz_sku_tonic_core::emz_sku`
pub use emz_sku;

pub mod proto {
    tonic::include_proto!("emz.sku.v1");

    /// Encoded descriptor set for `tonic-reflection`.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("emz_sku_descriptor");
}
