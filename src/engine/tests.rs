// Engine integration tests. Each #[sqlx::test] gets its own database with
// the migrations applied, so fixtures are seeded per test.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::engine::conflict;
use crate::engine::error::EngineError;
use crate::engine::lifecycle::{LifecycleController, ScheduleRequest};
use crate::engine::store::{
    self, AppointmentStatus, ReminderStatus, ReminderType, VisitPurpose,
};
use crate::engine::Principal;
use crate::models::Role;

/* ============================================================
   Fixtures
   ============================================================ */

async fn seed_user(pool: &PgPool, username: &str, role: Role) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO app_user (username, display_name, password_hash, role)
        VALUES ($1, $1, 'seeded', $2)
        RETURNING user_id
        "#,
    )
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("seed user")
}

/// Returns (user_id, vet_id).
async fn seed_vet(pool: &PgPool, username: &str) -> (Uuid, Uuid) {
    let user_id = seed_user(pool, username, Role::Veterinarian).await;
    let vet_id = sqlx::query_scalar(
        r#"
        INSERT INTO vet_profile (user_id, specialization)
        VALUES ($1, 'General Practice')
        RETURNING vet_id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("seed vet profile");
    (user_id, vet_id)
}

async fn seed_pet(pool: &PgPool, owner_user_id: Uuid, name: &str) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO pet (owner_user_id, name, species)
        VALUES ($1, $2, 'Dog')
        RETURNING pet_id
        "#,
    )
    .bind(owner_user_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("seed pet")
}

fn owner(user_id: Uuid) -> Principal {
    Principal {
        user_id,
        role: Role::Owner,
    }
}

fn vet(user_id: Uuid) -> Principal {
    Principal {
        user_id,
        role: Role::Veterinarian,
    }
}

fn slot() -> DateTime<Utc> {
    Utc::now() + Duration::days(30)
}

fn booking(pet_id: Uuid, vet_id: Uuid, at: DateTime<Utc>) -> ScheduleRequest {
    ScheduleRequest {
        pet_id,
        vet_id,
        scheduled_at: at,
        purpose: VisitPurpose::Checkup,
        notes: Some("annual visit".into()),
    }
}

async fn count_messages_to(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar(r#"SELECT count(*) FROM message WHERE receiver_id = $1"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count messages")
}

async fn count_reminders_for(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar(r#"SELECT count(*) FROM reminder WHERE user_id = $1"#)
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count reminders")
}

/* ============================================================
   schedule
   ============================================================ */

#[sqlx::test]
async fn schedule_books_free_slot_and_cascades(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;
    let at = slot();

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, at))
        .await
        .expect("schedule");

    assert_eq!(appt.status, AppointmentStatus::Scheduled);
    assert_eq!(appt.owner_user_id, owner_id);
    assert_eq!(appt.vet_id, vet_id);
    assert_eq!(appt.scheduled_at, at);

    // Exactly one reminder for the owner and one notification to the vet.
    assert_eq!(count_reminders_for(&pool, owner_id).await, 1);
    assert_eq!(count_messages_to(&pool, vet_user).await, 1);

    let reminders = store::list_reminders_for_user(&pool, owner_id).await.unwrap();
    assert_eq!(reminders[0].reminder_type, ReminderType::Appointment);
    assert_eq!(reminders[0].due_date, at.date_naive());
    assert_eq!(reminders[0].status, ReminderStatus::Pending);

    let inbox = store::list_messages_for_user(&pool, vet_user).await.unwrap();
    assert_eq!(inbox[0].subject, "New Appointment Scheduled");
    assert!(inbox[0].body.contains("Rex"));
    assert!(inbox[0].body.contains("Regular Checkup"));
}

#[sqlx::test]
async fn schedule_rejects_taken_slot(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_a = seed_pet(&pool, owner_id, "Rex").await;
    let pet_b = seed_pet(&pool, owner_id, "Milo").await;
    let at = slot();

    engine
        .schedule(&owner(owner_id), booking(pet_a, vet_id, at))
        .await
        .expect("first booking");

    let err = engine
        .schedule(&owner(owner_id), booking(pet_b, vet_id, at))
        .await
        .expect_err("second booking must fail");
    assert!(matches!(err, EngineError::SlotUnavailable));

    // A different instant for the same vet is fine.
    engine
        .schedule(&owner(owner_id), booking(pet_b, vet_id, at + Duration::hours(1)))
        .await
        .expect("other slot");
}

#[sqlx::test]
async fn concurrent_schedules_admit_exactly_one(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_a = seed_user(&pool, "alice", Role::Owner).await;
    let owner_b = seed_user(&pool, "bob", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_a = seed_pet(&pool, owner_a, "Rex").await;
    let pet_b = seed_pet(&pool, owner_b, "Milo").await;
    let at = slot();

    let ctx_a = owner(owner_a);
    let ctx_b = owner(owner_b);
    let (ra, rb) = tokio::join!(
        engine.schedule(&ctx_a, booking(pet_a, vet_id, at)),
        engine.schedule(&ctx_b, booking(pet_b, vet_id, at)),
    );

    // At most one wins; the loser sees SlotUnavailable from the unique index.
    assert!(ra.is_ok() != rb.is_ok(), "exactly one booking must win");
    let loser = if ra.is_ok() { rb } else { ra };
    assert!(matches!(loser.unwrap_err(), EngineError::SlotUnavailable));
}

#[sqlx::test]
async fn schedule_rejects_past_instant(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let err = engine
        .schedule(
            &owner(owner_id),
            booking(pet_id, vet_id, Utc::now() - Duration::hours(1)),
        )
        .await
        .expect_err("past booking must fail");
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[sqlx::test]
async fn schedule_enforces_pet_ownership(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_a = seed_user(&pool, "alice", Role::Owner).await;
    let owner_b = seed_user(&pool, "bob", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_of_a = seed_pet(&pool, owner_a, "Rex").await;

    let err = engine
        .schedule(&owner(owner_b), booking(pet_of_a, vet_id, slot()))
        .await
        .expect_err("foreign pet must be rejected");
    assert!(matches!(err, EngineError::Unauthorized(_)));

    // Role gate: a veterinarian cannot book on behalf of an owner.
    let (vet_user, _) = seed_vet(&pool, "dr_jones").await;
    let err = engine
        .schedule(&vet(vet_user), booking(pet_of_a, vet_id, slot()))
        .await
        .expect_err("non-owner role must be rejected");
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

/* ============================================================
   cancel
   ============================================================ */

#[sqlx::test]
async fn cancel_frees_the_slot(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;
    let at = slot();

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, at))
        .await
        .expect("schedule");

    assert!(!conflict::is_slot_free(&pool, vet_id, at).await.unwrap());

    let cancelled = engine
        .cancel(&owner(owner_id), appt.appointment_id)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    // Cancelled rows never count as conflicts.
    assert!(conflict::is_slot_free(&pool, vet_id, at).await.unwrap());
    engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, at))
        .await
        .expect("rebooking the freed slot");
}

#[sqlx::test]
async fn cancel_is_restricted_to_the_two_parties(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let stranger = seed_user(&pool, "mallory", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let (other_vet_user, _) = seed_vet(&pool, "dr_jones").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .expect("schedule");

    let err = engine
        .cancel(&owner(stranger), appt.appointment_id)
        .await
        .expect_err("foreign owner");
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .cancel(&vet(other_vet_user), appt.appointment_id)
        .await
        .expect_err("unassigned vet");
    assert!(matches!(err, EngineError::Unauthorized(_)));

    // Admins are not a party to the appointment.
    let admin = seed_user(&pool, "root", Role::Admin).await;
    let err = engine
        .cancel(
            &Principal {
                user_id: admin,
                role: Role::Admin,
            },
            appt.appointment_id,
        )
        .await
        .expect_err("admin");
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[sqlx::test]
async fn cancel_notifies_the_counterparty(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    // Owner cancels: the vet hears about it.
    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .unwrap();
    engine.cancel(&owner(owner_id), appt.appointment_id).await.unwrap();

    let vet_inbox = store::list_messages_for_user(&pool, vet_user).await.unwrap();
    assert_eq!(vet_inbox[0].subject, "Appointment Cancelled");
    assert!(vet_inbox[0].body.contains("cancelled by the pet owner"));

    // Vet cancels: the owner hears about it.
    let appt = engine
        .schedule(
            &owner(owner_id),
            booking(pet_id, vet_id, slot() + Duration::hours(2)),
        )
        .await
        .unwrap();
    let owner_msgs_before = count_messages_to(&pool, owner_id).await;
    engine.cancel(&vet(vet_user), appt.appointment_id).await.unwrap();

    assert_eq!(count_messages_to(&pool, owner_id).await, owner_msgs_before + 1);
    let owner_inbox = store::list_messages_for_user(&pool, owner_id).await.unwrap();
    assert!(owner_inbox[0].body.contains("cancelled by the veterinarian"));
}

#[sqlx::test]
async fn terminal_appointments_are_immutable(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .unwrap();
    engine.cancel(&owner(owner_id), appt.appointment_id).await.unwrap();

    // Repeated cancel is an error, not a silent success.
    let err = engine
        .cancel(&owner(owner_id), appt.appointment_id)
        .await
        .expect_err("second cancel");
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = engine
        .complete(&vet(vet_user), appt.appointment_id, None, None)
        .await
        .expect_err("complete after cancel");
    assert!(matches!(err, EngineError::InvalidState(_)));

    let current = store::fetch_appointment(&pool, appt.appointment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, AppointmentStatus::Cancelled);

    // And the same for completed appointments.
    let appt = engine
        .schedule(
            &owner(owner_id),
            booking(pet_id, vet_id, slot() + Duration::hours(3)),
        )
        .await
        .unwrap();
    engine
        .complete(&vet(vet_user), appt.appointment_id, None, None)
        .await
        .unwrap();
    let err = engine
        .cancel(&owner(owner_id), appt.appointment_id)
        .await
        .expect_err("cancel after completion");
    assert!(matches!(err, EngineError::InvalidState(_)));
}

/* ============================================================
   complete
   ============================================================ */

#[sqlx::test]
async fn complete_requires_the_assigned_vet(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (_, vet_id) = seed_vet(&pool, "dr_smith").await;
    let (other_vet_user, _) = seed_vet(&pool, "dr_jones").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .unwrap();

    let err = engine
        .complete(&vet(other_vet_user), appt.appointment_id, None, None)
        .await
        .expect_err("wrong vet");
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .complete(&owner(owner_id), appt.appointment_id, None, None)
        .await
        .expect_err("owner cannot complete");
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[sqlx::test]
async fn complete_with_future_follow_up_cascades(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .unwrap();
    let reminders_before = count_reminders_for(&pool, owner_id).await;
    let messages_before = count_messages_to(&pool, owner_id).await;

    let follow_up = Utc::now().date_naive() + Duration::days(14);
    let completed = engine
        .complete(
            &vet(vet_user),
            appt.appointment_id,
            Some(follow_up),
            Some("mild dermatitis"),
        )
        .await
        .expect("complete");
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_eq!(count_reminders_for(&pool, owner_id).await, reminders_before + 1);
    assert_eq!(count_messages_to(&pool, owner_id).await, messages_before + 1);

    let reminders = store::list_reminders_for_user(&pool, owner_id).await.unwrap();
    let checkup = reminders
        .iter()
        .find(|r| r.reminder_type == ReminderType::Checkup)
        .expect("follow-up reminder");
    assert_eq!(checkup.due_date, follow_up);
    assert!(checkup.description.as_deref().unwrap_or("").contains("mild dermatitis"));

    let inbox = store::list_messages_for_user(&pool, owner_id).await.unwrap();
    assert_eq!(inbox[0].subject, "Follow-Up Appointment Scheduled");
}

#[sqlx::test]
async fn complete_without_future_follow_up_skips_cascade(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;

    let appt = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, slot()))
        .await
        .unwrap();
    let reminders_before = count_reminders_for(&pool, owner_id).await;
    let messages_before = count_messages_to(&pool, owner_id).await;

    // A follow-up dated today is not strictly in the future.
    engine
        .complete(
            &vet(vet_user),
            appt.appointment_id,
            Some(Utc::now().date_naive()),
            None,
        )
        .await
        .expect("complete");

    assert_eq!(count_reminders_for(&pool, owner_id).await, reminders_before);
    assert_eq!(count_messages_to(&pool, owner_id).await, messages_before);
}

/* ============================================================
   End-to-end scenario
   ============================================================ */

#[sqlx::test]
async fn book_cancel_rebook_round_trip(pool: PgPool) {
    let engine = LifecycleController::new(pool.clone());
    let owner_id = seed_user(&pool, "alice", Role::Owner).await;
    let (vet_user, vet_id) = seed_vet(&pool, "dr_smith").await;
    let pet_id = seed_pet(&pool, owner_id, "Rex").await;
    let at = slot();

    // Owner books.
    let a1 = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, at))
        .await
        .expect("initial booking");
    assert_eq!(a1.status, AppointmentStatus::Scheduled);
    assert_eq!(count_reminders_for(&pool, owner_id).await, 1);
    assert_eq!(count_messages_to(&pool, vet_user).await, 1);

    // Vet cancels; the owner is notified.
    let cancelled = engine
        .cancel(&vet(vet_user), a1.appointment_id)
        .await
        .expect("vet cancel");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(count_messages_to(&pool, owner_id).await, 1);

    // The booking reminder created at scheduling time is left untouched.
    let reminders = store::list_reminders_for_user(&pool, owner_id).await.unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].status, ReminderStatus::Pending);
    assert_eq!(reminders[0].reminder_type, ReminderType::Appointment);

    // Cancellation freed the slot: rebooking the same vet and instant works.
    let a2 = engine
        .schedule(&owner(owner_id), booking(pet_id, vet_id, at))
        .await
        .expect("rebooking");
    assert_ne!(a2.appointment_id, a1.appointment_id);
    assert_eq!(a2.scheduled_at, a1.scheduled_at);
}

/* ============================================================
   Pure logic
   ============================================================ */

#[test]
fn terminal_statuses() {
    assert!(!AppointmentStatus::Scheduled.is_terminal());
    assert!(AppointmentStatus::Completed.is_terminal());
    assert!(AppointmentStatus::Cancelled.is_terminal());
}

#[test]
fn purpose_labels_match_booking_form() {
    assert_eq!(VisitPurpose::Checkup.label(), "Regular Checkup");
    assert_eq!(VisitPurpose::Illness.label(), "Illness/Injury");
    assert_eq!(VisitPurpose::Other.label(), "Other");
}

#[test]
fn non_database_errors_are_not_slot_conflicts() {
    assert!(!conflict::is_slot_taken_violation(&sqlx::Error::RowNotFound));
}
