//! API Routes
//!
//! HTTP endpoint definitions. Every handler is a thin adapter: it pulls the
//! [`AuthContext`] out of the request and calls the ledger or the reference
//! cache.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{AuthContext, RentalRecord, SaleRecord};
use crate::error::AppError;
use crate::handlers::{InventoryLedger, RentalSettlement};
use crate::ledger::LedgerStore;
use crate::reference::{Make, Model, ReferenceCache};

use super::extract::{ApiJson, ApiPath};

/// Shared state for all API routes
pub struct AppState<S: LedgerStore> {
    pub ledger: Arc<InventoryLedger<S>>,
    pub reference: Arc<ReferenceCache>,
}

impl<S: LedgerStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            reference: self.reference.clone(),
        }
    }
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(ledger: InventoryLedger<S>, reference: ReferenceCache) -> Self {
        Self {
            ledger: Arc::new(ledger),
            reference: Arc::new(reference),
        }
    }
}

// =========================================================================
// Request types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RentRequest {
    pub start_date: String,
    pub end_date: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        // Ledger
        .route("/items/:item_id/purchase", post(purchase::<S>))
        .route("/items/:item_id/rentals", post(rent::<S>))
        .route("/rentals/:rental_id/complete", post(complete_rental::<S>))
        // Reference data
        .route("/reference/makes", get(list_makes::<S>))
        .route("/reference/makes/:brand_id/models", get(list_models::<S>))
}

// =========================================================================
// POST /items/:item_id/purchase
// =========================================================================

async fn purchase<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<AuthContext>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<SaleRecord>), AppError> {
    let sale = state.ledger.purchase(&context, item_id).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

// =========================================================================
// POST /items/:item_id/rentals
// =========================================================================

async fn rent<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<AuthContext>,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RentRequest>,
) -> Result<(StatusCode, Json<RentalRecord>), AppError> {
    let rental = state
        .ledger
        .rent(&context, item_id, &request.start_date, &request.end_date)
        .await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

// =========================================================================
// POST /rentals/:rental_id/complete
// =========================================================================

async fn complete_rental<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<AuthContext>,
    ApiPath(rental_id): ApiPath<Uuid>,
) -> Result<Json<RentalSettlement>, AppError> {
    let settlement = state.ledger.complete_rental(&context, rental_id).await?;
    Ok(Json(settlement))
}

// =========================================================================
// GET /reference/makes
// =========================================================================

async fn list_makes<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<Vec<Make>>, AppError> {
    let makes = state.reference.get_makes(&context).await?;
    Ok(Json(makes))
}

// =========================================================================
// GET /reference/makes/:brand_id/models
// =========================================================================

async fn list_models<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<AuthContext>,
    ApiPath(brand_id): ApiPath<String>,
) -> Result<Json<Vec<Model>>, AppError> {
    let models = state
        .reference
        .get_models_for_make(&context, &brand_id)
        .await?;
    Ok(Json(models))
}
