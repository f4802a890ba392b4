// Lifecycle controller: the only writer of appointment state.
//
//         schedule()                cancel()
// (none) ---------> Scheduled -----------------> Cancelled (terminal)
//                       |
//                       | complete()
//                       v
//                   Completed (terminal)
//
// Each operation is one transaction: the conflict read, the row mutation and
// the dispatcher's reminder/message writes commit or roll back together.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::conflict;
use crate::engine::dispatch::{DbDispatcher, SideEffectHooks};
use crate::engine::error::EngineError;
use crate::engine::store::{self, Appointment, AppointmentStatus, VisitPurpose};
use crate::engine::Principal;
use crate::models::Role;

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub pet_id: Uuid,
    pub vet_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub purpose: VisitPurpose,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct LifecycleController {
    db: PgPool,
    hooks: Arc<dyn SideEffectHooks>,
}

impl LifecycleController {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            hooks: Arc::new(DbDispatcher),
        }
    }

    /// Book a visit. Owner-only; the pet must belong to the caller, the
    /// instant must be in the future and the vet's slot must be free.
    pub async fn schedule(
        &self,
        principal: &Principal,
        req: ScheduleRequest,
    ) -> Result<Appointment, EngineError> {
        if principal.role != Role::Owner {
            return Err(EngineError::Unauthorized(
                "only pet owners can schedule appointments".into(),
            ));
        }
        if req.scheduled_at <= Utc::now() {
            return Err(EngineError::InvalidRequest(
                "appointment date and time must be in the future".into(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let owner = store::owner_of(&mut *tx, req.pet_id).await?;
        if owner != Some(principal.user_id) {
            return Err(EngineError::Unauthorized(
                "pet is not registered to the requesting owner".into(),
            ));
        }

        if store::vet_user_id(&mut *tx, req.vet_id).await?.is_none() {
            return Err(EngineError::InvalidRequest("unknown veterinarian".into()));
        }

        // Read and insert share the transaction; the partial unique index
        // catches writers that race between the two.
        if !conflict::is_slot_free(&mut *tx, req.vet_id, req.scheduled_at).await? {
            return Err(EngineError::SlotUnavailable);
        }

        let appt = store::insert_scheduled(
            &mut *tx,
            req.pet_id,
            req.vet_id,
            principal.user_id,
            req.scheduled_at,
            req.purpose,
            req.notes.as_deref(),
        )
        .await?;

        self.hooks.on_scheduled(&mut *tx, &appt).await?;

        tx.commit().await?;
        tracing::info!(
            appointment_id = %appt.appointment_id,
            vet_id = %appt.vet_id,
            scheduled_at = %appt.scheduled_at,
            "appointment scheduled"
        );
        Ok(appt)
    }

    /// Cancel a scheduled visit. Allowed for the owning owner or the
    /// assigned vet's user; the counterparty gets notified. Cancelling an
    /// already-terminal appointment is an error, not a silent success.
    pub async fn cancel(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
    ) -> Result<Appointment, EngineError> {
        let mut tx = self.db.begin().await?;

        let appt = store::lock_appointment(&mut *tx, appointment_id)
            .await?
            .ok_or_else(|| EngineError::InvalidState("appointment not found".into()))?;

        if appt.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "appointment is {}, not Scheduled",
                appt.status.as_str()
            )));
        }

        let cancelled_by = match principal.role {
            Role::Owner if appt.owner_user_id == principal.user_id => Role::Owner,
            Role::Veterinarian => {
                let my_vet = store::vet_id_for_user(&mut *tx, principal.user_id).await?;
                if my_vet != Some(appt.vet_id) {
                    return Err(EngineError::Unauthorized(
                        "appointment is assigned to another veterinarian".into(),
                    ));
                }
                Role::Veterinarian
            }
            _ => {
                return Err(EngineError::Unauthorized(
                    "only the appointment's owner or veterinarian can cancel".into(),
                ));
            }
        };

        let appt = store::set_status(&mut *tx, appointment_id, AppointmentStatus::Cancelled).await?;

        self.hooks.on_cancelled(&mut *tx, &appt, cancelled_by).await?;

        tx.commit().await?;
        tracing::info!(
            appointment_id = %appt.appointment_id,
            cancelled_by = cancelled_by.as_str(),
            "appointment cancelled"
        );
        Ok(appt)
    }

    /// Complete a scheduled visit. Called by the medical-record filing flow,
    /// exactly once per appointment, with the filing vet as the caller. A
    /// follow-up date strictly after today produces a checkup reminder and
    /// an owner notification.
    pub async fn complete(
        &self,
        principal: &Principal,
        appointment_id: Uuid,
        follow_up_date: Option<NaiveDate>,
        diagnosis: Option<&str>,
    ) -> Result<Appointment, EngineError> {
        if principal.role != Role::Veterinarian {
            return Err(EngineError::Unauthorized(
                "only veterinarians can complete appointments".into(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let appt = store::lock_appointment(&mut *tx, appointment_id)
            .await?
            .ok_or_else(|| EngineError::InvalidState("appointment not found".into()))?;

        if appt.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "appointment is {}, not Scheduled",
                appt.status.as_str()
            )));
        }

        let my_vet = store::vet_id_for_user(&mut *tx, principal.user_id)
            .await?
            .ok_or_else(|| {
                EngineError::Unauthorized("no veterinarian profile for this account".into())
            })?;
        if my_vet != appt.vet_id {
            return Err(EngineError::Unauthorized(
                "appointment is assigned to another veterinarian".into(),
            ));
        }

        let appt = store::set_status(&mut *tx, appointment_id, AppointmentStatus::Completed).await?;

        if let Some(follow_up) = follow_up_date {
            if follow_up > Utc::now().date_naive() {
                self.hooks
                    .on_follow_up(&mut *tx, &appt, follow_up, diagnosis)
                    .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            appointment_id = %appt.appointment_id,
            follow_up = follow_up_date.is_some(),
            "appointment completed"
        );
        Ok(appt)
    }
}
