// src/routes/medical_record_routes.rs
//
// Medical-record filing flow. Filing a record against an appointment is the
// one and only caller of the engine's complete() transition.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    engine::store::{self, Appointment, VisitPurpose},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, MedicalRecordRow, Role},
};

fn ensure_vet(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == Role::Veterinarian {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only veterinarians can file medical records".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/medical_records", post(create_medical_record))
        .route("/pets/{pet_id}/medical_records", get(list_pet_medical_records))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   POST /medical_records
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateMedicalRecordRequest {
    pub pet_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub record_date: DateTime<Utc>,
    pub visit_type: VisitPurpose,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct MedicalRecordCreated {
    pub record: MedicalRecordRow,
    pub appointment: Option<Appointment>,
}

pub async fn create_medical_record(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateMedicalRecordRequest>,
) -> Result<Json<ApiOk<MedicalRecordCreated>>, ApiError> {
    ensure_vet(&auth)?;

    let vet_id = store::vet_id_for_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest(
                "NO_VET_PROFILE",
                "Veterinarian account has no vet profile".into(),
            )
        })?;

    let record: MedicalRecordRow = sqlx::query_as::<_, MedicalRecordRow>(
        r#"
        INSERT INTO medical_record
            (pet_id, vet_id, appointment_id, record_date, visit_type, diagnosis, treatment, notes, follow_up_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            record_id, pet_id, vet_id, appointment_id, record_date, visit_type,
            diagnosis, treatment, notes, follow_up_date, created_at
        "#,
    )
    .bind(req.pet_id)
    .bind(vet_id)
    .bind(req.appointment_id)
    .bind(req.record_date)
    .bind(req.visit_type)
    .bind(req.diagnosis.as_deref())
    .bind(req.treatment.as_deref())
    .bind(req.notes.as_deref())
    .bind(req.follow_up_date)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("RECORD_CREATE_FAILED", format!("{e}")))?;

    // The filed record stands on its own; a refused completion surfaces as
    // an error without retracting it.
    let appointment = match req.appointment_id {
        Some(appointment_id) => Some(
            state
                .engine
                .complete(
                    &auth.principal(),
                    appointment_id,
                    req.follow_up_date,
                    req.diagnosis.as_deref(),
                )
                .await?,
        ),
        None => None,
    };

    Ok(Json(ApiOk {
        data: MedicalRecordCreated { record, appointment },
    }))
}

/* ============================================================
   GET /pets/{pet_id}/medical_records
   ============================================================ */

pub async fn list_pet_medical_records(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(pet_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<MedicalRecordRow>>>, ApiError> {
    if auth.role == Role::Owner {
        let owner = store::owner_of(&state.db, pet_id).await?;
        if owner != Some(auth.user_id) {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Owner can only view records for their own pets".into(),
            ));
        }
    }

    let rows: Vec<MedicalRecordRow> = sqlx::query_as::<_, MedicalRecordRow>(
        r#"
        SELECT
            record_id, pet_id, vet_id, appointment_id, record_date, visit_type,
            diagnosis, treatment, notes, follow_up_date, created_at
        FROM medical_record
        WHERE pet_id = $1
        ORDER BY record_date DESC
        "#,
    )
    .bind(pet_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk { data: rows }))
}
