// Consolidated Appointment Store access layer. Every query against the
// appointment, reminder and message tables lives here so the handlers and
// the lifecycle controller share one set of column lists and filters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, QueryBuilder};
use uuid::Uuid;

use crate::engine::conflict;
use crate::engine::error::EngineError;

/* ============================================================
   Row models
   ============================================================ */

/// appointment.status (smallint):
/// 0 scheduled, 1 completed, 2 cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Completed = 1,
    Cancelled = 2,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Completed and Cancelled admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

/// appointment.purpose (smallint). Labels match the booking form options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum VisitPurpose {
    Checkup = 0,
    Vaccination = 1,
    Illness = 2,
    Surgery = 3,
    Dental = 4,
    Grooming = 5,
    Other = 6,
}

impl VisitPurpose {
    pub fn label(self) -> &'static str {
        match self {
            VisitPurpose::Checkup => "Regular Checkup",
            VisitPurpose::Vaccination => "Vaccination",
            VisitPurpose::Illness => "Illness/Injury",
            VisitPurpose::Surgery => "Surgery",
            VisitPurpose::Dental => "Dental",
            VisitPurpose::Grooming => "Grooming",
            VisitPurpose::Other => "Other",
        }
    }
}

/// reminder.reminder_type (smallint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum ReminderType {
    Appointment = 0,
    Checkup = 1,
    Vaccination = 2,
    Medication = 3,
}

/// reminder.status (smallint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum ReminderStatus {
    Pending = 0,
    Done = 1,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub pet_id: Uuid,
    pub vet_id: Uuid,
    pub owner_user_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub purpose: VisitPurpose,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReminderRow {
    pub reminder_id: Uuid,
    pub pet_id: Uuid,
    pub user_id: Uuid,
    pub reminder_type: ReminderType,
    pub due_date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageRow {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id,
    pet_id,
    vet_id,
    owner_user_id,
    scheduled_at,
    purpose,
    notes,
    status,
    created_at,
    updated_at
"#;

/* ============================================================
   Appointment reads
   ============================================================ */

pub async fn fetch_appointment(
    ex: impl PgExecutor<'_>,
    appointment_id: Uuid,
) -> Result<Option<Appointment>, EngineError> {
    let appt = sqlx::query_as::<_, Appointment>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE appointment_id = $1
        "#
    ))
    .bind(appointment_id)
    .fetch_optional(ex)
    .await?;

    Ok(appt)
}

/// Row-locked read used by the lifecycle controller so concurrent
/// transitions on the same appointment serialize.
pub async fn lock_appointment(
    ex: impl PgExecutor<'_>,
    appointment_id: Uuid,
) -> Result<Option<Appointment>, EngineError> {
    let appt = sqlx::query_as::<_, Appointment>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE appointment_id = $1
        FOR UPDATE
        "#
    ))
    .bind(appointment_id)
    .fetch_optional(ex)
    .await?;

    Ok(appt)
}

/// List filter with explicit parameters. Handlers scope it by role before
/// calling; the store applies exactly what it is given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub vet_id: Option<Uuid>,
    pub owner_user_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_appointments(
    ex: impl PgExecutor<'_>,
    filter: &AppointmentFilter,
) -> Result<Vec<Appointment>, EngineError> {
    let limit = filter.limit.unwrap_or(50).clamp(1, 200);
    let offset = filter.offset.unwrap_or(0).max(0);

    let mut qb = QueryBuilder::new(format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE true"
    ));
    if let Some(vet_id) = filter.vet_id {
        qb.push(" AND vet_id = ").push_bind(vet_id);
    }
    if let Some(owner_user_id) = filter.owner_user_id {
        qb.push(" AND owner_user_id = ").push_bind(owner_user_id);
    }
    if let Some(pet_id) = filter.pet_id {
        qb.push(" AND pet_id = ").push_bind(pet_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        qb.push(" AND scheduled_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND scheduled_at < ").push_bind(to);
    }
    qb.push(" ORDER BY scheduled_at ASC");
    qb.push(" LIMIT ").push_bind(limit);
    qb.push(" OFFSET ").push_bind(offset);

    let rows = qb
        .build_query_as::<Appointment>()
        .fetch_all(ex)
        .await?;

    Ok(rows)
}

/* ============================================================
   Appointment writes (transaction scope only)
   ============================================================ */

pub async fn insert_scheduled(
    ex: impl PgExecutor<'_>,
    pet_id: Uuid,
    vet_id: Uuid,
    owner_user_id: Uuid,
    scheduled_at: DateTime<Utc>,
    purpose: VisitPurpose,
    notes: Option<&str>,
) -> Result<Appointment, EngineError> {
    let appt = sqlx::query_as::<_, Appointment>(&format!(
        r#"
        INSERT INTO appointment (pet_id, vet_id, owner_user_id, scheduled_at, purpose, notes, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(pet_id)
    .bind(vet_id)
    .bind(owner_user_id)
    .bind(scheduled_at)
    .bind(purpose)
    .bind(notes)
    .bind(AppointmentStatus::Scheduled)
    .fetch_one(ex)
    .await
    .map_err(|e| {
        if conflict::is_slot_taken_violation(&e) {
            EngineError::SlotUnavailable
        } else {
            EngineError::Store(e)
        }
    })?;

    Ok(appt)
}

pub async fn set_status(
    ex: impl PgExecutor<'_>,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, EngineError> {
    let appt = sqlx::query_as::<_, Appointment>(&format!(
        r#"
        UPDATE appointment
        SET status = $2, updated_at = now()
        WHERE appointment_id = $1
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(appointment_id)
    .bind(status)
    .fetch_one(ex)
    .await?;

    Ok(appt)
}

/* ============================================================
   Pet/Owner Registry and vet links (read-only)
   ============================================================ */

/// The single registry read the engine is allowed (ownership checks).
pub async fn owner_of(
    ex: impl PgExecutor<'_>,
    pet_id: Uuid,
) -> Result<Option<Uuid>, EngineError> {
    let owner: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT owner_user_id
        FROM pet
        WHERE pet_id = $1
        "#,
    )
    .bind(pet_id)
    .fetch_optional(ex)
    .await?;

    Ok(owner)
}

pub async fn pet_name(
    ex: impl PgExecutor<'_>,
    pet_id: Uuid,
) -> Result<Option<String>, EngineError> {
    let name: Option<String> = sqlx::query_scalar(
        r#"
        SELECT name
        FROM pet
        WHERE pet_id = $1
        "#,
    )
    .bind(pet_id)
    .fetch_optional(ex)
    .await?;

    Ok(name)
}

/// Notifications address users, appointments address vet profiles.
pub async fn vet_user_id(
    ex: impl PgExecutor<'_>,
    vet_id: Uuid,
) -> Result<Option<Uuid>, EngineError> {
    let user_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM vet_profile
        WHERE vet_id = $1
        "#,
    )
    .bind(vet_id)
    .fetch_optional(ex)
    .await?;

    Ok(user_id)
}

pub async fn vet_id_for_user(
    ex: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Option<Uuid>, EngineError> {
    let vet_id: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT vet_id
        FROM vet_profile
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(ex)
    .await?;

    Ok(vet_id)
}

/* ============================================================
   Reminders and messages
   ============================================================ */

pub async fn insert_reminder(
    ex: impl PgExecutor<'_>,
    pet_id: Uuid,
    user_id: Uuid,
    reminder_type: ReminderType,
    due_date: NaiveDate,
    title: &str,
    description: &str,
) -> Result<ReminderRow, EngineError> {
    let row = sqlx::query_as::<_, ReminderRow>(
        r#"
        INSERT INTO reminder (pet_id, user_id, reminder_type, due_date, title, description, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING reminder_id, pet_id, user_id, reminder_type, due_date, title, description, status, created_at
        "#,
    )
    .bind(pet_id)
    .bind(user_id)
    .bind(reminder_type)
    .bind(due_date)
    .bind(title)
    .bind(description)
    .bind(ReminderStatus::Pending)
    .fetch_one(ex)
    .await?;

    Ok(row)
}

pub async fn insert_message(
    ex: impl PgExecutor<'_>,
    sender_id: Uuid,
    receiver_id: Uuid,
    subject: &str,
    body: &str,
) -> Result<MessageRow, EngineError> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO message (sender_id, receiver_id, subject, body)
        VALUES ($1, $2, $3, $4)
        RETURNING message_id, sender_id, receiver_id, subject, body, sent_at, is_read
        "#,
    )
    .bind(sender_id)
    .bind(receiver_id)
    .bind(subject)
    .bind(body)
    .fetch_one(ex)
    .await?;

    Ok(row)
}

/// Owner-facing to-do list, newest due date first.
pub async fn list_reminders_for_user(
    ex: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Vec<ReminderRow>, EngineError> {
    let rows = sqlx::query_as::<_, ReminderRow>(
        r#"
        SELECT reminder_id, pet_id, user_id, reminder_type, due_date, title, description, status, created_at
        FROM reminder
        WHERE user_id = $1
        ORDER BY due_date DESC, created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(ex)
    .await?;

    Ok(rows)
}

/// Inbox listing, newest first.
pub async fn list_messages_for_user(
    ex: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Vec<MessageRow>, EngineError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT message_id, sender_id, receiver_id, subject, body, sent_at, is_read
        FROM message
        WHERE receiver_id = $1
        ORDER BY sent_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(ex)
    .await?;

    Ok(rows)
}

/// Explicit owner acknowledgment; returns false when the reminder does not
/// exist or belongs to someone else.
pub async fn ack_reminder(
    ex: impl PgExecutor<'_>,
    reminder_id: Uuid,
    user_id: Uuid,
) -> Result<bool, EngineError> {
    let res = sqlx::query(
        r#"
        UPDATE reminder
        SET status = $3
        WHERE reminder_id = $1
          AND user_id = $2
        "#,
    )
    .bind(reminder_id)
    .bind(user_id)
    .bind(ReminderStatus::Done)
    .execute(ex)
    .await?;

    Ok(res.rows_affected() > 0)
}

pub async fn set_message_read(
    ex: impl PgExecutor<'_>,
    message_id: Uuid,
    receiver_id: Uuid,
    is_read: bool,
) -> Result<bool, EngineError> {
    let res = sqlx::query(
        r#"
        UPDATE message
        SET is_read = $3
        WHERE message_id = $1
          AND receiver_id = $2
        "#,
    )
    .bind(message_id)
    .bind(receiver_id)
    .bind(is_read)
    .execute(ex)
    .await?;

    Ok(res.rows_affected() > 0)
}
