//! End-to-end tests for the check-in service against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use checkin_kiosk::store::{
    RegistrationStore, Revision, StoreError, StoreFuture, StoreSnapshot, WriteBatch,
};
use checkin_kiosk::{
    AssignmentOutcome, AttendeeKey, Capacity, CheckinError, CheckinService, Config, GradeTier,
    InMemoryRegistrationStore, Participation, PriorityClass, Program, ProgramId,
    RegistrationStatus, ResolvePolicy,
};

fn service() -> (Arc<InMemoryRegistrationStore>, CheckinService) {
    let store = Arc::new(InMemoryRegistrationStore::new());
    let service = CheckinService::new(store.clone(), &Config::default());
    (store, service)
}

async fn seed_program(service: &CheckinService, title: &str, capacity: u32) -> ProgramId {
    let program = Program::new(
        ProgramId::new(),
        title.to_string(),
        Capacity::new(capacity),
        0,
    );
    let id = program.id;
    service.upsert_program(program).await.unwrap();
    id
}

fn key(name: &str) -> AttendeeKey {
    AttendeeKey::new(name, name)
}

fn walk_in(grade: GradeTier) -> PriorityClass {
    PriorityClass::WalkIn { grade }
}

#[tokio::test]
async fn full_scenario_assign_fallback_wait_cancel_resolve() {
    // Programs A (capacity 1) and B (capacity 2)
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;
    let b = seed_program(&service, "B", 2).await;

    // X prefers [A, B] and gets A
    let x = service
        .submit_registration(
            key("x"),
            vec![a, b],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(x, AssignmentOutcome::Assigned { program_id, .. } if program_id == a));

    // Y prefers [A, B]; A is full, so Y gets B
    let y = service
        .submit_registration(
            key("y"),
            vec![a, b],
            Participation::Programs,
            walk_in(GradeTier::Grade2),
        )
        .await
        .unwrap();
    assert!(matches!(y, AssignmentOutcome::Assigned { program_id, .. } if program_id == b));

    // Z prefers only [A]; nothing feasible, waits
    let z = service
        .submit_registration(
            key("z"),
            vec![a],
            Participation::Programs,
            walk_in(GradeTier::Grade1),
        )
        .await
        .unwrap();
    assert!(matches!(z, AssignmentOutcome::Waiting { .. }));

    // X is cancelled; the freed seat goes to Z on the next sweep
    service
        .cancel_registration(x.registration_id())
        .await
        .unwrap();
    let report = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 1);
    assert_eq!(report.still_waiting_count, 0);

    let promoted = service.registration(z.registration_id()).await.unwrap();
    assert_eq!(promoted.status, RegistrationStatus::Assigned);
    assert_eq!(promoted.assigned_program_id, Some(a));
}

#[tokio::test]
async fn duplicate_preferences_are_rejected_before_any_write() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 3).await;

    let result = service
        .submit_registration(
            key("x"),
            vec![a, a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await;
    assert!(matches!(result, Err(CheckinError::InvalidPreference(_))));
    assert!(service.registrations().await.unwrap().is_empty());
}

#[tokio::test]
async fn second_submission_under_the_same_key_is_rejected() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 0).await;

    // First submission waits (no capacity)
    let first = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(first, AssignmentOutcome::Waiting { .. }));

    // Same key again while the first is still waiting
    let second = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await;
    assert!(matches!(
        second,
        Err(CheckinError::DuplicateRegistration { .. })
    ));
    assert_eq!(service.registrations().await.unwrap().len(), 1);
}

#[tokio::test]
async fn resolver_is_idempotent_without_capacity_changes() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;

    for name in ["x", "y", "z"] {
        service
            .submit_registration(
                key(name),
                vec![a],
                Participation::Programs,
                PriorityClass::Reserved,
            )
            .await
            .unwrap();
    }

    let first = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(first.assigned_count, 0); // seat already taken at submission
    assert_eq!(first.still_waiting_count, 2);

    let second = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(second.assigned_count, 0);
    assert_eq!(second.still_waiting_count, 2);
}

#[tokio::test]
async fn raising_capacity_lets_a_later_sweep_assign() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 0).await;

    service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();

    let before = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(before.assigned_count, 0);

    service
        .set_program_capacity(a, Capacity::new(1))
        .await
        .unwrap();
    let after = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(after.assigned_count, 1);
    assert_eq!(after.still_waiting_count, 0);
}

#[tokio::test]
async fn reserved_tier_wins_the_last_seat_in_a_sweep() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 0).await;

    // Walk-in submits first, reserved later; both wait (capacity 0)
    let walk_in_outcome = service
        .submit_registration(
            key("walkin"),
            vec![a],
            Participation::Programs,
            walk_in(GradeTier::Grade3),
        )
        .await
        .unwrap();
    let reserved_outcome = service
        .submit_registration(
            key("reserved"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();

    // One seat appears; the reserved registrant gets it under the policy
    service
        .set_program_capacity(a, Capacity::new(1))
        .await
        .unwrap();
    let report = service
        .resolve_waitlist(ResolvePolicy {
            prioritize_reserved: true,
            prioritize_grade: false,
        })
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 1);

    let reserved = service
        .registration(reserved_outcome.registration_id())
        .await
        .unwrap();
    assert_eq!(reserved.status, RegistrationStatus::Assigned);

    let deferred = service
        .registration(walk_in_outcome.registration_id())
        .await
        .unwrap();
    assert_eq!(deferred.status, RegistrationStatus::Waiting);
}

#[tokio::test]
async fn briefing_only_visitors_complete_without_a_seat() {
    let (_, service) = service();
    seed_program(&service, "A", 1).await;

    let outcome = service
        .submit_registration(
            key("visitor"),
            vec![],
            Participation::BriefingOnly,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, AssignmentOutcome::BriefingOnly { .. }));

    let record = service
        .registration(outcome.registration_id())
        .await
        .unwrap();
    assert_eq!(record.status, RegistrationStatus::Completed);
    assert_eq!(record.assigned_program_id, None);

    // A completed visitor still blocks resubmission under the same key
    let again = service
        .submit_registration(
            key("visitor"),
            vec![],
            Participation::BriefingOnly,
            PriorityClass::Reserved,
        )
        .await;
    assert!(matches!(
        again,
        Err(CheckinError::DuplicateRegistration { .. })
    ));
}

#[tokio::test]
async fn edit_moves_a_registrant_between_programs() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;
    let b = seed_program(&service, "B", 1).await;

    let outcome = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();

    let edited = service
        .edit_registration(outcome.registration_id(), vec![b])
        .await
        .unwrap();
    assert!(matches!(edited, AssignmentOutcome::Assigned { program_id, .. } if program_id == b));

    // The old seat is free again
    let snapshot = service.status_snapshot().await.unwrap();
    let row_a = snapshot.iter().find(|row| row.program_id == a).unwrap();
    assert_eq!(row_a.enrollment, 0);
}

#[tokio::test]
async fn check_in_keeps_the_seat_occupied() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;

    let outcome = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    service.check_in(outcome.registration_id()).await.unwrap();

    let record = service
        .registration(outcome.registration_id())
        .await
        .unwrap();
    assert_eq!(record.status, RegistrationStatus::Completed);
    assert_eq!(record.assigned_program_id, Some(a));

    let snapshot = service.status_snapshot().await.unwrap();
    assert_eq!(snapshot[0].enrollment, 1);
}

#[tokio::test]
async fn reopen_frees_the_seat_for_the_next_sweep() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;

    let holder = service
        .submit_registration(
            key("holder"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    let waiter = service
        .submit_registration(
            key("waiter"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(waiter, AssignmentOutcome::Waiting { .. }));

    service
        .reopen_registration(holder.registration_id())
        .await
        .unwrap();
    let reopened = service
        .registration(holder.registration_id())
        .await
        .unwrap();
    assert_eq!(reopened.status, RegistrationStatus::Waiting);
    assert_eq!(reopened.assigned_program_id, None);

    // Both now wait; submission order decides who gets the seat back
    let report = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 1);
    let holder_again = service
        .registration(holder.registration_id())
        .await
        .unwrap();
    assert_eq!(holder_again.status, RegistrationStatus::Assigned);
}

#[tokio::test]
async fn delete_destroys_the_record_and_unblocks_the_key() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 1).await;

    let outcome = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();

    service
        .delete_registration(outcome.registration_id())
        .await
        .unwrap();
    assert!(matches!(
        service.registration(outcome.registration_id()).await,
        Err(CheckinError::RegistrationNotFound(_))
    ));
    assert!(service.registrations().await.unwrap().is_empty());

    // The key is free again and the seat was released
    let again = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(again, AssignmentOutcome::Assigned { .. }));
}

#[tokio::test]
async fn deactivated_programs_reject_new_preferences_and_skip_sweeps() {
    let (_, service) = service();
    let a = seed_program(&service, "A", 0).await;
    let b = seed_program(&service, "B", 1).await;

    // Ranked while both were active; A has no capacity yet
    let outcome = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, AssignmentOutcome::Waiting { .. }));

    service.set_program_active(b, false).await.unwrap();

    // A closed program cannot be ranked any more
    let rejected = service
        .submit_registration(
            key("y"),
            vec![b],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await;
    assert!(matches!(rejected, Err(CheckinError::InvalidPreference(_))));

    // Capacity opens on A but the program is then closed: the stored
    // preference is skipped rather than assigned
    service.set_program_capacity(a, Capacity::new(1)).await.unwrap();
    service.set_program_active(a, false).await.unwrap();
    let report = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 0);
    assert_eq!(report.still_waiting_count, 1);

    // Reopening the program lets the next sweep place the registrant
    service.set_program_active(a, true).await.unwrap();
    let report = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 1);
}

#[tokio::test]
async fn unavailable_store_surfaces_a_transient_error_without_writes() {
    let (store, service) = service();
    let a = seed_program(&service, "A", 1).await;

    store.set_available(false);
    let result = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await;
    assert!(matches!(
        result,
        Err(CheckinError::Store(StoreError::Unavailable(_)))
    ));

    store.set_available(true);
    assert!(service.registrations().await.unwrap().is_empty());
    let retried = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(retried, AssignmentOutcome::Assigned { .. }));
}

#[tokio::test]
async fn concurrent_submissions_never_oversubscribe() {
    let (_, service) = service();
    let service = Arc::new(service);
    let a = seed_program(&service, "A", 1).await;
    let b = seed_program(&service, "B", 2).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .submit_registration(
                    key(&format!("attendee-{i}")),
                    vec![a, b],
                    Participation::Programs,
                    PriorityClass::Reserved,
                )
                .await
        }));
    }

    let mut assigned_a = 0;
    let mut assigned_b = 0;
    let mut waiting = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            AssignmentOutcome::Assigned { program_id, .. } if program_id == a => assigned_a += 1,
            AssignmentOutcome::Assigned { program_id, .. } if program_id == b => assigned_b += 1,
            AssignmentOutcome::Assigned { .. } => unreachable!("unknown program"),
            AssignmentOutcome::Waiting { .. } | AssignmentOutcome::AssignedToWaiting { .. } => {
                waiting += 1;
            }
            AssignmentOutcome::BriefingOnly { .. } => unreachable!("nobody opted out"),
        }
    }

    // Exactly one seat in A and two in B, never more
    assert_eq!(assigned_a, 1);
    assert_eq!(assigned_b, 2);
    assert_eq!(waiting, 5);

    let snapshot = service.status_snapshot().await.unwrap();
    for row in snapshot {
        assert!(row.enrollment <= row.capacity.value());
    }
}

/// Store wrapper that loses the first N commits to a simulated concurrent
/// writer, then behaves normally.
struct RacingStore {
    inner: InMemoryRegistrationStore,
    conflicts_left: AtomicU32,
}

impl RacingStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryRegistrationStore::new(),
            conflicts_left: AtomicU32::new(conflicts),
        }
    }
}

impl RegistrationStore for RacingStore {
    fn load_snapshot(&self) -> StoreFuture<'_, StoreSnapshot> {
        self.inner.load_snapshot()
    }

    fn commit(&self, expected: Revision, batch: WriteBatch) -> StoreFuture<'_, Revision> {
        let remaining = self
            .conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            Box::pin(async move {
                Err(StoreError::RevisionConflict {
                    expected,
                    actual: expected.next(),
                })
            })
        } else {
            self.inner.commit(expected, batch)
        }
    }
}

#[tokio::test]
async fn exhausted_capacity_races_defer_to_the_waitlist() {
    let config = Config {
        assign_retry_limit: 2,
        ..Config::default()
    };
    let store = Arc::new(RacingStore::new(0));
    let service = CheckinService::new(store.clone(), &config);
    let a = seed_program(&service, "A", 1).await;

    // Lose every commit attempt within the retry budget (3 tries), then let
    // the deferred waitlist placement through.
    store.conflicts_left.store(3, Ordering::SeqCst);
    let outcome = service
        .submit_registration(
            key("x"),
            vec![a],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, AssignmentOutcome::AssignedToWaiting { .. }));

    let record = service
        .registration(outcome.registration_id())
        .await
        .unwrap();
    assert_eq!(record.status, RegistrationStatus::Waiting);
    assert_eq!(record.assigned_program_id, None);

    // The deferred registrant is picked up by the next sweep
    let report = service
        .resolve_waitlist(ResolvePolicy::default())
        .await
        .unwrap();
    assert_eq!(report.assigned_count, 1);
}
