//! gRPC service implementation for item number allocation.
//!
//! [`SkuService`] implements the [`SkuAllocator`] service defined in
//! `emz_sku.proto`. Both RPCs are unary; allocation goes through
//! [`AppState::allocate`] so HTTP and gRPC share the same allocator, timeout
//! and metrics.

use emz_sku_tonic_core::{
    Error,
    proto::{
        AllocateItemNumberRequest, AllocateItemNumberResponse, DeriveCodesRequest,
        DeriveCodesResponse, sku_allocator_server::SkuAllocator,
    },
};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use crate::server::state::AppState;

#[derive(Clone)]
pub struct SkuService {
    state: AppState,
    shutdown: CancellationToken,
}

impl SkuService {
    /// Requests arriving after `shutdown` is cancelled are rejected with
    /// `UNAVAILABLE`.
    pub const fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl SkuAllocator for SkuService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn derive_codes(
        &self,
        req: Request<DeriveCodesRequest>,
    ) -> Result<Response<DeriveCodesResponse>, Status> {
        self.ensure_running()?;
        let DeriveCodesRequest { brand, model } = req.into_inner();
        let prefix = self.state.allocator().derive(&brand, &model);
        Ok(Response::new(prefix.into()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn allocate_item_number(
        &self,
        req: Request<AllocateItemNumberRequest>,
    ) -> Result<Response<AllocateItemNumberResponse>, Status> {
        self.ensure_running()?;
        let AllocateItemNumberRequest { brand, model } = req.into_inner();
        let allocation = self
            .state
            .allocate(&brand, &model)
            .await
            .map_err(Error::from)?;
        Ok(Response::new(allocation.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::{ServerConfig, StoreConfig};
    use emz_sku::{RuleSet, backend::MemoryBackend};
    use tonic::Code;

    fn service() -> SkuService {
        let config = ServerConfig {
            http_addr: "127.0.0.1:8080".parse().unwrap(),
            grpc_addr: "127.0.0.1:50051".parse().unwrap(),
            store: StoreConfig::Memory,
            allocate_timeout: None,
            rules: RuleSet::builtin(),
        };
        SkuService::new(
            AppState::new(MemoryBackend::new().into(), &config),
            CancellationToken::new(),
        )
    }

    fn allocate_request(brand: &str, model: &str) -> Request<AllocateItemNumberRequest> {
        Request::new(AllocateItemNumberRequest {
            brand: brand.to_string(),
            model: model.to_string(),
        })
    }

    #[tokio::test]
    async fn derives_codes() {
        let response = service()
            .derive_codes(Request::new(DeriveCodesRequest {
                brand: "Hermès".into(),
                model: "Kelly 28".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.brand_code, "HR");
        assert_eq!(response.model_code, "KLY");
        assert_eq!(response.prefix, "HR-KLY");
    }

    #[tokio::test]
    async fn allocates_item_numbers() {
        let service = service();
        let first = service
            .allocate_item_number(allocate_request("Fendi", "Baguette"))
            .await
            .unwrap()
            .into_inner();
        let second = service
            .allocate_item_number(allocate_request("Fendi", "Baguette"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.item_number, "FD-BGT-EMZ-001");
        assert_eq!(second.item_number, "FD-BGT-EMZ-002");
        assert_eq!(second.sequence, 2);
    }

    #[tokio::test]
    async fn blank_model_is_invalid_argument() {
        let status = service()
            .allocate_item_number(allocate_request("Fendi", "  "))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_requests_after_shutdown() {
        let service = service();
        service.shutdown.cancel();
        let status = service
            .allocate_item_number(allocate_request("Fendi", "Baguette"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }
}
