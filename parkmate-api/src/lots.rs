use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use parkmate_shared::{PaymentMethod, Slot, VehicleType};
use parkmate_slots::{BookingChoice, BookingOutcome, LotSnapshot};
use serde::{Deserialize, Serialize};

use crate::dialog::RequestConfirm;
use crate::error::AppError;
use crate::state::AppState;

const MAX_LOT_ID_LEN: usize = 64;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub slot_id: u32,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub applied: bool,
    pub selected: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRequest {
    pub vehicle_type: Option<VehicleType>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Booked,
    Declined,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub status: BookingStatus,
    pub slot: Option<Slot>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotConfigBody {
    pub total_slots: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/lots/{lot_id}/slots", get(get_slots))
        .route("/v1/lots/{lot_id}/select", post(select_slot))
        .route("/v1/lots/{lot_id}/choice", put(update_choice))
        .route("/v1/lots/{lot_id}/book", post(book_slot))
        .route("/v1/lots/{lot_id}/slots/{slot_id}/release", post(release_slot))
        .route("/v1/lots/{lot_id}/reset", post(reset_lot))
        .route("/v1/lots/{lot_id}/config", get(get_config).put(update_config))
}

fn validate_lot_id(lot_id: &str) -> Result<(), AppError> {
    let well_formed = !lot_id.is_empty()
        && lot_id.len() <= MAX_LOT_ID_LEN
        && lot_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!("Invalid lot id: {}", lot_id)))
    }
}

/// GET /v1/lots/{lot_id}/slots
async fn get_slots(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
) -> Result<Json<LotSnapshot>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;
    Ok(Json(sim.snapshot().await))
}

/// POST /v1/lots/{lot_id}/select
async fn select_slot(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;
    let applied = sim.select(req.slot_id).await;
    Ok(Json(SelectResponse {
        applied,
        selected: sim.selected().await,
    }))
}

/// PUT /v1/lots/{lot_id}/choice
async fn update_choice(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(req): Json<ChoiceRequest>,
) -> Result<Json<BookingChoice>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;
    if let Some(vehicle_type) = req.vehicle_type {
        sim.set_vehicle_type(vehicle_type).await;
    }
    if let Some(payment_method) = req.payment_method {
        sim.set_payment_method(payment_method).await;
    }
    Ok(Json(sim.choice().await))
}

/// POST /v1/lots/{lot_id}/book
/// The `confirm` flag answers the booking prompt
async fn book_slot(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<BookResponse>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;

    let response = match RequestConfirm::answer(req.confirm, sim.book()).await? {
        BookingOutcome::Booked(slot) => BookResponse {
            status: BookingStatus::Booked,
            slot: Some(slot),
        },
        BookingOutcome::Declined => BookResponse {
            status: BookingStatus::Declined,
            slot: None,
        },
    };
    Ok(Json(response))
}

/// POST /v1/lots/{lot_id}/slots/{slot_id}/release
async fn release_slot(
    State(state): State<AppState>,
    Path((lot_id, slot_id)): Path<(String, u32)>,
) -> Result<Json<ReleaseResponse>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;
    let released = sim.release(slot_id).await?;
    Ok(Json(ReleaseResponse { released }))
}

/// POST /v1/lots/{lot_id}/reset
async fn reset_lot(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ResetResponse>, AppError> {
    validate_lot_id(&lot_id)?;
    let sim = state.simulator(&lot_id).await;
    let reset = RequestConfirm::answer(req.confirm, sim.reset_all()).await;
    Ok(Json(ResetResponse { reset }))
}

/// GET /v1/lots/{lot_id}/config
async fn get_config(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
) -> Result<Json<LotConfigBody>, AppError> {
    validate_lot_id(&lot_id)?;
    let total_slots = state.lots.slot_count(&lot_id).await;
    Ok(Json(LotConfigBody { total_slots }))
}

/// PUT /v1/lots/{lot_id}/config
/// Open simulators for the lot reload once the change signal reaches them
async fn update_config(
    State(state): State<AppState>,
    Path(lot_id): Path<String>,
    Json(body): Json<LotConfigBody>,
) -> Result<Json<LotConfigBody>, AppError> {
    validate_lot_id(&lot_id)?;
    state.lots.save_slot_count(&lot_id, body.total_slots).await?;
    Ok(Json(body))
}
