use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::engine::error::EngineError;
use crate::engine::store::AppointmentStatus;

/// True iff no Scheduled appointment exists for this vet at the identical
/// instant. Cancelled and completed appointments free the slot immediately.
///
/// Callers inside a booking transaction must run this on the transaction's
/// connection; the partial unique index on (vet_id, scheduled_at) is the
/// backstop for writers that race past this read.
pub async fn is_slot_free(
    ex: impl PgExecutor<'_>,
    vet_id: Uuid,
    instant: DateTime<Utc>,
) -> Result<bool, EngineError> {
    let taken: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT 1
        FROM appointment
        WHERE vet_id = $1
          AND scheduled_at = $2
          AND status = $3
        LIMIT 1
        "#,
    )
    .bind(vet_id)
    .bind(instant)
    .bind(AppointmentStatus::Scheduled)
    .fetch_optional(ex)
    .await?;

    Ok(taken.is_none())
}

/// Recognize the unique-index violation raised when two writers pass the
/// is_slot_free read concurrently and both try to insert.
pub fn is_slot_taken_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.constraint() == Some("appointment_vet_slot_key"),
        _ => false,
    }
}
