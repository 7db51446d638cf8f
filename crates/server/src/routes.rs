//! HTTP surface for the rental lifecycle engine.
//!
//! Member endpoints (acting account from the `x-actor-id` header):
//! - `POST /api/v1/rentals`                      — request a booking
//! - `GET  /api/v1/rentals`                      — own rentals (`?role=renter|owner&status=`)
//! - `GET  /api/v1/rentals/availability`         — calendar probe (`?vehicle_id=&start=&end=`)
//! - `GET  /api/v1/rentals/{id}`                 — detail with evidence and dispute
//! - `POST /api/v1/rentals/{id}/status`          — drive the lifecycle
//! - `POST /api/v1/rentals/{id}/evidence`        — attach handover records
//! - `POST /api/v1/rentals/{id}/disputes`        — open a dispute
//!
//! Support endpoints (staff role required):
//! - `GET   /api/v1/admin/rentals`               — paginated listing (`?status=&disputed=&page=&per_page=`)
//! - `GET   /api/v1/admin/rentals/{id}`          — unscoped detail
//! - `POST  /api/v1/admin/rentals/{id}/status`   — status override
//! - `PATCH /api/v1/admin/disputes/{id}`         — record a review decision

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wheelbase_booking::{
    AdminService, BookingService, CreateRentalRequest, NewEvidence, RentalDetail,
    SideEffectDispatcher,
};
use wheelbase_core::availability::BookingWindow;
use wheelbase_core::domain::account::{AccountRecord, RentalParty, UserId};
use wheelbase_core::domain::dispute::{Dispute, DisputeId, DisputeStatus};
use wheelbase_core::domain::evidence::{Evidence, EvidenceKind};
use wheelbase_core::domain::rental::{Rental, RentalId, RentalStatus};
use wheelbase_core::domain::vehicle::VehicleId;
use wheelbase_core::errors::EngineError;
use wheelbase_db::stores::{AccountDirectory, RentalFilter};

#[derive(Clone)]
pub struct AppState {
    booking: Arc<BookingService>,
    admin: Arc<AdminService>,
    dispatcher: SideEffectDispatcher,
    accounts: Arc<dyn AccountDirectory>,
}

impl AppState {
    pub fn new(
        booking: Arc<BookingService>,
        admin: Arc<AdminService>,
        dispatcher: SideEffectDispatcher,
        accounts: Arc<dyn AccountDirectory>,
    ) -> Self {
        Self { booking, admin, dispatcher, accounts }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRentalBody {
    pub vehicle_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub insurance_fee: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub delivery_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: RentalStatus,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceItemBody {
    pub kind: EvidenceKind,
    pub url: String,
    pub note: Option<String>,
    pub order: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EvidenceBody {
    pub items: Vec<EvidenceItemBody>,
}

#[derive(Debug, Deserialize)]
pub struct DisputeBody {
    pub reason: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DisputeReviewBody {
    pub status: DisputeStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub vehicle_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub disputed: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RentalDetailResponse {
    pub rental: Rental,
    pub evidence: Vec<Evidence>,
    pub dispute: Option<Dispute>,
}

impl From<RentalDetail> for RentalDetailResponse {
    fn from(detail: RentalDetail) -> Self {
        Self { rental: detail.rental, evidence: detail.evidence, dispute: detail.dispute }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub vehicle_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct AdminRentalPageResponse {
    pub rentals: Vec<Rental>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/rentals", post(create_rental).get(list_rentals))
        .route("/api/v1/rentals/availability", get(check_availability))
        .route("/api/v1/rentals/{id}", get(rental_detail))
        .route("/api/v1/rentals/{id}/status", post(update_status))
        .route("/api/v1/rentals/{id}/evidence", post(upload_evidence))
        .route("/api/v1/rentals/{id}/disputes", post(open_dispute))
        .route("/api/v1/admin/rentals", get(admin_list_rentals))
        .route("/api/v1/admin/rentals/{id}", get(admin_rental_detail))
        .route("/api/v1/admin/rentals/{id}/status", post(admin_update_status))
        .route("/api/v1/admin/disputes/{id}", patch(admin_update_dispute))
        .with_state(state)
}

fn engine_error(error: EngineError) -> (StatusCode, Json<ErrorBody>) {
    let status = StatusCode::from_u16(error.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody { error: error.code(), message: error.to_string() }))
}

/// Resolves the acting account from `x-actor-id`. Every `/api/v1` route goes
/// through here; role and party checks further in work on the resolved
/// record, never on raw header values.
async fn resolve_actor(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccountRecord, (StatusCode, Json<ErrorBody>)> {
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            engine_error(EngineError::Validation("x-actor-id header is required".to_string()))
        })?;

    let account = state
        .accounts
        .find(&UserId(actor_id.to_string()))
        .await
        .map_err(|error| engine_error(error.into()))?
        .ok_or_else(|| engine_error(EngineError::forbidden("unknown actor")))?;
    if !account.is_active {
        return Err(engine_error(EngineError::forbidden("the acting account is inactive")));
    }
    Ok(account)
}

// ---------------------------------------------------------------------------
// Member handlers
// ---------------------------------------------------------------------------

async fn create_rental(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRentalBody>,
) -> Result<(StatusCode, Json<Rental>), (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;

    let request = CreateRentalRequest {
        vehicle_id: VehicleId(body.vehicle_id),
        start_date: body.start_date,
        end_date: body.end_date,
        delivery_fee: body.delivery_fee,
        insurance_fee: body.insurance_fee,
        discount_amount: body.discount_amount,
        delivery_address: body.delivery_address,
    };
    let (rental, events) =
        state.booking.create_rental(&actor, request).await.map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;

    Ok((StatusCode::CREATED, Json(rental)))
}

async fn list_rentals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Rental>>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;

    let role = match query.role.as_deref() {
        None => RentalParty::Renter,
        Some(raw) => RentalParty::parse(raw).ok_or_else(|| {
            engine_error(EngineError::Validation("role must be `renter` or `owner`".to_string()))
        })?,
    };
    let status = parse_status_filter(query.status.as_deref())?;

    let rentals = state.booking.list_rentals(&actor, role, status).await.map_err(engine_error)?;
    Ok(Json(rentals))
}

async fn rental_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RentalDetailResponse>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let detail = state
        .booking
        .rental_detail(&actor, &RentalId(id))
        .await
        .map_err(engine_error)?;
    Ok(Json(detail.into()))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Rental>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let (rental, events) = state
        .booking
        .update_status(&actor, &RentalId(id), body.status, body.cancel_reason)
        .await
        .map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;
    Ok(Json(rental))
}

async fn upload_evidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<EvidenceBody>,
) -> Result<(StatusCode, Json<Vec<Evidence>>), (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;

    let items = body
        .items
        .into_iter()
        .map(|item| NewEvidence {
            kind: item.kind,
            url: item.url,
            note: item.note,
            order: item.order,
        })
        .collect();
    let (records, events) = state
        .booking
        .upload_evidence(&actor, &RentalId(id), items)
        .await
        .map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;

    Ok((StatusCode::CREATED, Json(records)))
}

async fn open_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DisputeBody>,
) -> Result<(StatusCode, Json<Dispute>), (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let (dispute, events) = state
        .booking
        .create_dispute(&actor, &RentalId(id), body.reason, body.description)
        .await
        .map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;
    Ok((StatusCode::CREATED, Json(dispute)))
}

async fn check_availability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, (StatusCode, Json<ErrorBody>)> {
    resolve_actor(&state, &headers).await?;

    let window = BookingWindow::new(query.start, query.end)
        .map_err(|error| engine_error(error.into()))?;
    let vehicle_id = VehicleId(query.vehicle_id);
    let available =
        state.booking.is_available(&vehicle_id, &window, None).await.map_err(engine_error)?;

    Ok(Json(AvailabilityResponse {
        vehicle_id: vehicle_id.0,
        start_date: window.start_date(),
        end_date: window.end_date(),
        available,
    }))
}

// ---------------------------------------------------------------------------
// Support handlers
// ---------------------------------------------------------------------------

async fn admin_list_rentals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<AdminRentalPageResponse>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;

    let status = parse_status_filter(query.status.as_deref())?;
    let filter = RentalFilter::new(
        status,
        query.disputed.unwrap_or(false),
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(RentalFilter::DEFAULT_PER_PAGE),
    );
    let page = state.admin.list_rentals(&actor, filter).await.map_err(engine_error)?;

    Ok(Json(AdminRentalPageResponse {
        rentals: page.rentals,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

async fn admin_rental_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RentalDetailResponse>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let detail =
        state.admin.rental_detail(&actor, &RentalId(id)).await.map_err(engine_error)?;
    Ok(Json(detail.into()))
}

async fn admin_update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Rental>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let (rental, events) = state
        .admin
        .update_rental_status(&actor, &RentalId(id), body.status, body.cancel_reason)
        .await
        .map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;
    Ok(Json(rental))
}

async fn admin_update_dispute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DisputeReviewBody>,
) -> Result<Json<Dispute>, (StatusCode, Json<ErrorBody>)> {
    let actor = resolve_actor(&state, &headers).await?;
    let (dispute, events) = state
        .admin
        .update_dispute(&actor, &DisputeId(id), body.status, body.admin_notes)
        .await
        .map_err(engine_error)?;
    state.dispatcher.dispatch(events).await;
    Ok(Json(dispute))
}

fn parse_status_filter(
    raw: Option<&str>,
) -> Result<Option<RentalStatus>, (StatusCode, Json<ErrorBody>)> {
    match raw {
        None => Ok(None),
        Some(value) => RentalStatus::parse(value).map(Some).ok_or_else(|| {
            engine_error(EngineError::Validation(format!("unknown rental status `{value}`")))
        }),
    }
}
