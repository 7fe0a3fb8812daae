//! Conversions from core types into protobuf messages.

use emz_sku::{Allocation, Prefix};

use crate::proto::{AllocateItemNumberResponse, DeriveCodesResponse};

impl From<Prefix> for DeriveCodesResponse {
    fn from(prefix: Prefix) -> Self {
        Self {
            brand_code: prefix.brand_code().to_string(),
            model_code: prefix.model_code().to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl From<Allocation> for AllocateItemNumberResponse {
    fn from(allocation: Allocation) -> Self {
        Self {
            item_number: allocation.item_number.to_string(),
            brand_code: allocation.brand_code,
            model_code: allocation.model_code,
            sequence: allocation.sequence,
        }
    }
}
