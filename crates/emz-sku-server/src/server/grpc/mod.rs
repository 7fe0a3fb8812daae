//! gRPC surface: the `emz.sku.v1.SkuAllocator` service.

pub mod handler;
