// src/routes/pet_routes.rs
//
// Minimal Pet/Owner Registry surface. The engine only ever reads this
// registry (ownership checks); all mutation happens here, owner-scoped.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, PetRow, Role},
};

fn ensure_owner(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == Role::Owner {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only pet owners can manage pets".into(),
        ))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets", post(create_pet).get(list_pets))
        .route("/pets/{pet_id}", get(get_pet))
}

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* ============================================================
   POST /pets
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreatePetRequest {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_pet(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePetRequest>,
) -> Result<Json<ApiOk<PetRow>>, ApiError> {
    ensure_owner(&auth)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "name is required".into()));
    }
    if req.species.trim().is_empty() {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "species is required".into()));
    }

    let row: PetRow = sqlx::query_as::<_, PetRow>(
        r#"
        INSERT INTO pet (owner_user_id, name, species, breed, date_of_birth, gender, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING
            pet_id, owner_user_id, name, species, breed, date_of_birth,
            gender, notes, created_at, updated_at
        "#,
    )
    .bind(auth.user_id)
    .bind(name)
    .bind(req.species.trim())
    .bind(req.breed.as_deref())
    .bind(req.date_of_birth)
    .bind(req.gender.as_deref())
    .bind(req.notes.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("PET_CREATE_FAILED", format!("{e}")))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   GET /pets
   ============================================================ */

pub async fn list_pets(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PetRow>>>, ApiError> {
    let rows: Vec<PetRow> = match auth.role {
        Role::Owner => sqlx::query_as::<_, PetRow>(
            r#"
            SELECT
                pet_id, owner_user_id, name, species, breed, date_of_birth,
                gender, notes, created_at, updated_at
            FROM pet
            WHERE owner_user_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(auth.user_id)
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?,

        Role::Admin => sqlx::query_as::<_, PetRow>(
            r#"
            SELECT
                pet_id, owner_user_id, name, species, breed, date_of_birth,
                gender, notes, created_at, updated_at
            FROM pet
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?,

        Role::Veterinarian => {
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Veterinarians look up pets through their appointments".into(),
            ));
        }
    };

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /pets/{id}
   ============================================================ */

pub async fn get_pet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(pet_id): Path<Uuid>,
) -> Result<Json<ApiOk<PetRow>>, ApiError> {
    let row: Option<PetRow> = sqlx::query_as::<_, PetRow>(
        r#"
        SELECT
            pet_id, owner_user_id, name, species, breed, date_of_birth,
            gender, notes, created_at, updated_at
        FROM pet
        WHERE pet_id = $1
        "#,
    )
    .bind(pet_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let Some(row) = row else {
        return Err(ApiError::NotFound("NOT_FOUND", "pet not found".into()));
    };

    if auth.role == Role::Owner && row.owner_user_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Owner can only view their own pets".into(),
        ));
    }

    Ok(Json(ApiOk { data: row }))
}
