// src/routes/appointment_routes.rs
//
// Presentation glue over the scheduling engine: handlers build a Principal,
// delegate to the LifecycleController or the store's query layer, and
// translate engine errors into API responses.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    engine::lifecycle::ScheduleRequest,
    engine::store::{self, Appointment, AppointmentFilter},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Role},
};

fn is_owner(auth: &AuthContext) -> bool {
    auth.role == Role::Owner
}
fn is_admin(auth: &AuthContext) -> bool {
    auth.role == Role::Admin
}
fn is_vet(auth: &AuthContext) -> bool {
    auth.role == Role::Veterinarian
}

async fn resolve_vet_id_by_user_id(state: &AppState, user_id: Uuid) -> Result<Uuid, ApiError> {
    let vet_id = store::vet_id_for_user(&state.db, user_id).await?;

    let Some(vet_id) = vet_id else {
        return Err(ApiError::BadRequest(
            "NO_VET_PROFILE",
            "Veterinarian account has no vet profile".into(),
        ));
    };
    Ok(vet_id)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   POST /appointments (schedule)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appt = state.engine.schedule(&auth.principal(), req).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   POST /appointments/{id}/cancel
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appt = state.engine.cancel(&auth.principal(), appointment_id).await?;
    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appt = store::fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "appointment not found".into()))?;

    // Owners see their own bookings, vets their own schedule, admins any.
    if is_owner(&auth) && appt.owner_user_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Owner can only view their own appointments".into(),
        ));
    }
    if is_vet(&auth) {
        let my_vet = resolve_vet_id_by_user_id(&state, auth.user_id).await?;
        if appt.vet_id != my_vet {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Veterinarian can only view their own appointments".into(),
            ));
        }
    }

    Ok(Json(ApiOk { data: appt }))
}

/* ============================================================
   GET /appointments (filtered list)
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(mut filter): Query<AppointmentFilter>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if to <= from {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "to must be after from".into(),
            ));
        }
    }

    // Scope the filter to the caller's role before it reaches the store.
    if is_owner(&auth) {
        filter.owner_user_id = Some(auth.user_id);
    } else if is_vet(&auth) {
        let my_vet = resolve_vet_id_by_user_id(&state, auth.user_id).await?;
        filter.vet_id = Some(my_vet);
    } else if !is_admin(&auth) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You do not have permission to list appointments".into(),
        ));
    }

    let items = store::list_appointments(&state.db, &filter).await?;
    Ok(Json(ApiOk { data: items }))
}
