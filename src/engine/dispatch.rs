// Side-Effect Dispatcher: derived Reminder and Message rows written once per
// committed lifecycle transition. Hooks run on the lifecycle controller's
// transaction connection, so a failed write aborts the whole operation and
// nothing partial ever commits.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::engine::error::EngineError;
use crate::engine::store::{self, Appointment, ReminderType};
use crate::models::Role;

/// Invoked exactly once per committed lifecycle transition. All effects are
/// additive-only: no hook deletes or updates prior reminders/messages.
#[async_trait]
pub trait SideEffectHooks: Send + Sync {
    async fn on_scheduled(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
    ) -> Result<(), EngineError>;

    async fn on_cancelled(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
        cancelled_by: Role,
    ) -> Result<(), EngineError>;

    async fn on_follow_up(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
        follow_up_date: NaiveDate,
        diagnosis: Option<&str>,
    ) -> Result<(), EngineError>;
}

/// Production dispatcher: writes reminder and message rows.
pub struct DbDispatcher;

fn side_effect(e: EngineError) -> EngineError {
    match e {
        EngineError::Store(e) => EngineError::SideEffect(e.to_string()),
        other => other,
    }
}

async fn pet_name_or_fail(conn: &mut PgConnection, appt: &Appointment) -> Result<String, EngineError> {
    store::pet_name(&mut *conn, appt.pet_id)
        .await
        .map_err(side_effect)?
        .ok_or_else(|| EngineError::SideEffect("pet row missing for appointment".into()))
}

async fn vet_user_or_fail(conn: &mut PgConnection, appt: &Appointment) -> Result<uuid::Uuid, EngineError> {
    store::vet_user_id(&mut *conn, appt.vet_id)
        .await
        .map_err(side_effect)?
        .ok_or_else(|| EngineError::SideEffect("vet profile missing for appointment".into()))
}

#[async_trait]
impl SideEffectHooks for DbDispatcher {
    async fn on_scheduled(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
    ) -> Result<(), EngineError> {
        let pet = pet_name_or_fail(conn, appt).await?;
        let vet_user = vet_user_or_fail(conn, appt).await?;

        let title = format!("Appointment: {}", appt.purpose.label());
        let description = format!(
            "Appointment with vet at {}",
            appt.scheduled_at.format("%-I:%M %p")
        );
        store::insert_reminder(
            &mut *conn,
            appt.pet_id,
            appt.owner_user_id,
            ReminderType::Appointment,
            appt.scheduled_at.date_naive(),
            &title,
            &description,
        )
        .await
        .map_err(side_effect)?;

        let body = format!(
            "A new appointment has been scheduled for {pet} on {}.\n\nPurpose: {}\n\nNotes: {}",
            appt.scheduled_at.format("%B %-d, %Y at %-I:%M %p"),
            appt.purpose.label(),
            appt.notes.as_deref().unwrap_or(""),
        );
        store::insert_message(
            &mut *conn,
            appt.owner_user_id,
            vet_user,
            "New Appointment Scheduled",
            &body,
        )
        .await
        .map_err(side_effect)?;

        Ok(())
    }

    async fn on_cancelled(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
        cancelled_by: Role,
    ) -> Result<(), EngineError> {
        let vet_user = vet_user_or_fail(conn, appt).await?;
        let when = appt.scheduled_at.format("%B %-d, %Y at %-I:%M %p");

        // Notify the party that did not initiate the cancellation. The
        // booking reminder created at scheduling time is left as-is.
        let (sender, receiver, body) = if cancelled_by == Role::Owner {
            let pet = pet_name_or_fail(conn, appt).await?;
            (
                appt.owner_user_id,
                vet_user,
                format!(
                    "The appointment scheduled for {when} with {pet} has been cancelled by the pet owner."
                ),
            )
        } else {
            (
                vet_user,
                appt.owner_user_id,
                format!(
                    "Your appointment scheduled for {when} has been cancelled by the veterinarian. \
                     Please contact the clinic for more information or to reschedule."
                ),
            )
        };

        store::insert_message(&mut *conn, sender, receiver, "Appointment Cancelled", &body)
            .await
            .map_err(side_effect)?;

        Ok(())
    }

    async fn on_follow_up(
        &self,
        conn: &mut PgConnection,
        appt: &Appointment,
        follow_up_date: NaiveDate,
        diagnosis: Option<&str>,
    ) -> Result<(), EngineError> {
        let pet = pet_name_or_fail(conn, appt).await?;
        let vet_user = vet_user_or_fail(conn, appt).await?;
        let diagnosis = diagnosis.unwrap_or("");

        let title = format!("Follow-Up: {}", appt.purpose.label());
        let description = format!(
            "Follow-up for {pet}'s {} appointment. Diagnosis: {diagnosis}",
            appt.purpose.label(),
        );
        store::insert_reminder(
            &mut *conn,
            appt.pet_id,
            appt.owner_user_id,
            ReminderType::Checkup,
            follow_up_date,
            &title,
            &description,
        )
        .await
        .map_err(side_effect)?;

        let body = format!(
            "A follow-up appointment has been scheduled for {pet} on {}.\n\nReason: Follow-up for {}\nDiagnosis: {diagnosis}\n\nPlease contact the clinic to confirm this appointment time.",
            follow_up_date.format("%B %-d, %Y"),
            appt.purpose.label(),
        );
        store::insert_message(
            &mut *conn,
            vet_user,
            appt.owner_user_id,
            "Follow-Up Appointment Scheduled",
            &body,
        )
        .await
        .map_err(side_effect)?;

        Ok(())
    }
}
