use axum::{
    Json,
    extract::{Path, Query, State},
};
use emz_sku::{
    Allocation, Item, ItemDetails, Prefix, SequenceCounter, SequenceStore,
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, Result};
use crate::server::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct CodesQuery {
    #[serde(default)]
    brand: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodesResponse {
    brand_code: String,
    model_code: String,
    prefix: Prefix,
}

/// Previews the codes for a brand/model pair. Never allocates.
pub async fn derive_codes(
    State(state): State<AppState>,
    Query(query): Query<CodesQuery>,
) -> Json<CodesResponse> {
    let prefix = state.allocator().derive(&query.brand, &query.model);
    Json(CodesResponse {
        brand_code: prefix.brand_code().to_string(),
        model_code: prefix.model_code().to_string(),
        prefix,
    })
}

/// Missing fields deserialize as empty and are rejected by the allocator as
/// a validation error.
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    #[serde(default)]
    brand: String,
    #[serde(default)]
    model: String,
}

pub async fn allocate(
    State(state): State<AppState>,
    Json(request): Json<AllocateRequest>,
) -> Result<Json<Allocation>> {
    Ok(Json(state.allocate(&request.brand, &request.model).await?))
}

pub async fn list_counters(State(state): State<AppState>) -> Result<Json<Vec<SequenceCounter>>> {
    Ok(Json(state.backend().counters().await?))
}

pub async fn get_counter(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Result<Json<SequenceCounter>> {
    let prefix: Prefix = prefix.parse()?;
    match state.backend().current(&prefix).await? {
        Some(last_value) => Ok(Json(SequenceCounter { prefix, last_value })),
        None => Err(ApiError::CounterNotFound {
            prefix: prefix.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    floor: u64,
}

/// Raises a counter so it never re-issues numbers assigned elsewhere.
pub async fn advance_counter(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<SequenceCounter>> {
    let prefix: Prefix = prefix.parse()?;
    let last_value = state.backend().advance_to(&prefix, request.floor).await?;
    tracing::info!(%prefix, floor = request.floor, last_value, "advanced counter");
    Ok(Json(SequenceCounter { prefix, last_value }))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Item>> {
    Ok(Json(state.intake.get(&id).await?))
}

/// Saves an item. The first save assigns and locks its item number.
pub async fn save_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(details): Json<ItemDetails>,
) -> Result<Json<Item>> {
    Ok(Json(state.intake.save(&id, details).await?))
}

/// Explicitly issues a new item number for an item.
pub async fn reset_item_number(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>> {
    let item = state.intake.reassign(&id).await?;
    tracing::info!(%id, item_number = ?item.item_number, "reassigned item number");
    Ok(Json(item))
}
