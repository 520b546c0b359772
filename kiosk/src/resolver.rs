//! Waitlist resolver.
//!
//! Batch-processes all waiting registrants under the same capacity
//! constraints as real-time assignment, ordered by a configurable priority
//! policy. The sweep is strictly sequential: every successful assignment
//! advances the running snapshot, so capacity consumed by an earlier
//! registrant in the sweep is visible to every later one. Parallelizing
//! across or within tiers would break that.
//!
//! Re-running the resolver is idempotent with respect to already-assigned
//! registrants (they are excluded from the snapshot), but a later run may
//! assign previously-unfeasible registrants if capacity was raised in
//! between - intended behavior, not a bug.

use crate::engine;
use crate::registry::EnrollmentSnapshot;
use crate::types::{
    CheckinState, PriorityClass, ProgramId, Registration, RegistrationId, ResolvePolicy,
};

/// The ordered decisions of one sweep, before any of them is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepPlan {
    /// `(registration, program)` pairs in sweep order
    pub assignments: Vec<(RegistrationId, ProgramId)>,
    /// Registrants with preferences that stayed unfeasible
    pub still_waiting: Vec<RegistrationId>,
}

/// Order the waiting registrants for a sweep under the given policy.
///
/// Tiering: when `prioritize_reserved` is set, reserved-origin registrants
/// form a tier ahead of walk-ins (walk-ins were deliberately deferred behind
/// reserved at submission time under this policy). Within the walk-in tier,
/// `prioritize_grade` sub-orders by grade rank, senior-most first. Everything
/// else preserves submission order - the sort is stable by sequence.
pub fn waitlist_order<'a, I>(registrations: I, policy: ResolvePolicy) -> Vec<&'a Registration>
where
    I: IntoIterator<Item = &'a Registration>,
{
    let mut waiting: Vec<&Registration> = registrations
        .into_iter()
        .filter(|r| r.is_waiting_for_assignment())
        .collect();

    waiting.sort_by_key(|r| sweep_key(r, policy));
    waiting
}

/// `(tier, grade rank, submission sequence)` - lower sorts first.
fn sweep_key(registration: &Registration, policy: ResolvePolicy) -> (u8, u8, u64) {
    let tier = u8::from(policy.prioritize_reserved && !registration.priority.is_reserved());
    let grade = match registration.priority {
        PriorityClass::Reserved => 0,
        PriorityClass::WalkIn { grade } => {
            if policy.prioritize_grade {
                grade.rank()
            } else {
                0
            }
        }
    };
    (tier, grade, registration.sequence)
}

/// Plan one full sweep over the given state.
///
/// Pure: reads the committed registration set, derives the enrollment
/// snapshot, and walks the ordered waitlist invoking the assignment engine
/// against the running snapshot. Nothing is committed here - the service
/// applies and persists each planned assignment in order.
#[must_use]
pub fn plan_sweep(state: &CheckinState, policy: ResolvePolicy) -> SweepPlan {
    let mut snapshot = EnrollmentSnapshot::from_state(state);
    let mut plan = SweepPlan::default();

    for registration in waitlist_order(state.registrations(), policy) {
        match engine::assign(&registration.preferences, &snapshot) {
            Some(program_id) => {
                snapshot.record_assignment(program_id);
                plan.assignments.push((registration.id, program_id));
            }
            None => plan.still_waiting.push(registration.id),
        }
    }

    tracing::debug!(
        assigned = plan.assignments.len(),
        still_waiting = plan.still_waiting.len(),
        ?policy,
        "sweep planned"
    );
    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        AttendeeKey, Capacity, GradeTier, Participation, Program, RegistrationStatus,
    };
    use chrono::Utc;

    fn program(title: &str, capacity: u32) -> Program {
        Program::new(
            ProgramId::new(),
            title.to_string(),
            Capacity::new(capacity),
            0,
        )
    }

    fn waiting(
        name: &str,
        preferences: Vec<ProgramId>,
        priority: PriorityClass,
        sequence: u64,
    ) -> Registration {
        Registration::new(
            RegistrationId::new(),
            AttendeeKey::new(name, name),
            preferences,
            Participation::Programs,
            priority,
            sequence,
            Utc::now(),
        )
    }

    fn state_with(programs: Vec<Program>, registrations: Vec<Registration>) -> CheckinState {
        CheckinState::from_records(programs, registrations)
    }

    #[test]
    fn sweep_preserves_submission_order_without_policy() {
        let a = program("A", 1);
        let first = waiting("first", vec![a.id], PriorityClass::Reserved, 0);
        let second = waiting(
            "second",
            vec![a.id],
            PriorityClass::WalkIn {
                grade: GradeTier::Grade3,
            },
            1,
        );
        let first_id = first.id;

        let state = state_with(vec![a], vec![second, first]);
        let plan = plan_sweep(&state, ResolvePolicy::default());

        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].0, first_id);
        assert_eq!(plan.still_waiting.len(), 1);
    }

    #[test]
    fn reserved_tier_beats_an_earlier_walk_in() {
        // Walk-in submitted first, reserved later; one seat. Under
        // prioritize_reserved the reserved registrant wins it.
        let a = program("A", 1);
        let walk_in = waiting(
            "walkin",
            vec![a.id],
            PriorityClass::WalkIn {
                grade: GradeTier::Grade3,
            },
            0,
        );
        let reserved = waiting("reserved", vec![a.id], PriorityClass::Reserved, 1);
        let reserved_id = reserved.id;
        let walk_in_id = walk_in.id;

        let state = state_with(vec![a], vec![walk_in, reserved]);
        let plan = plan_sweep(
            &state,
            ResolvePolicy {
                prioritize_reserved: true,
                prioritize_grade: false,
            },
        );

        assert_eq!(plan.assignments, vec![(reserved_id, state.programs().next().unwrap().id)]);
        assert_eq!(plan.still_waiting, vec![walk_in_id]);
    }

    #[test]
    fn grade_orders_the_walk_in_tier() {
        let a = program("A", 2);
        let junior = waiting(
            "junior",
            vec![a.id],
            PriorityClass::WalkIn {
                grade: GradeTier::Grade1,
            },
            0,
        );
        let senior = waiting(
            "senior",
            vec![a.id],
            PriorityClass::WalkIn {
                grade: GradeTier::Grade3,
            },
            1,
        );
        let senior_id = senior.id;
        let junior_id = junior.id;

        let state = state_with(vec![a], vec![junior, senior]);
        let plan = plan_sweep(
            &state,
            ResolvePolicy {
                prioritize_reserved: true,
                prioritize_grade: true,
            },
        );

        let order: Vec<RegistrationId> = plan.assignments.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![senior_id, junior_id]);
    }

    #[test]
    fn capacity_consumed_earlier_in_the_sweep_is_visible_later() {
        // One seat in A, plenty in B. The first registrant takes A; the
        // second, who also ranked A first, must fall through to B within
        // the same sweep.
        let a = program("A", 1);
        let b = program("B", 2);
        let first = waiting("first", vec![a.id, b.id], PriorityClass::Reserved, 0);
        let second = waiting("second", vec![a.id, b.id], PriorityClass::Reserved, 1);
        let (a_id, b_id) = (a.id, b.id);
        let (first_id, second_id) = (first.id, second.id);

        let state = state_with(vec![a, b], vec![first, second]);
        let plan = plan_sweep(&state, ResolvePolicy::default());

        assert_eq!(
            plan.assignments,
            vec![(first_id, a_id), (second_id, b_id)]
        );
        assert!(plan.still_waiting.is_empty());
    }

    #[test]
    fn already_assigned_registrants_are_excluded() {
        let a = program("A", 2);
        let mut settled = waiting("settled", vec![a.id], PriorityClass::Reserved, 0);
        settled.status = RegistrationStatus::Assigned;
        settled.assigned_program_id = Some(a.id);
        let pending = waiting("pending", vec![a.id], PriorityClass::Reserved, 1);
        let pending_id = pending.id;
        let a_id = a.id;

        let state = state_with(vec![a], vec![settled, pending]);
        let plan = plan_sweep(&state, ResolvePolicy::default());

        assert_eq!(plan.assignments, vec![(pending_id, a_id)]);
    }

    #[test]
    fn empty_preference_waiters_are_skipped() {
        let a = program("A", 5);
        let undecided = waiting("undecided", vec![], PriorityClass::Reserved, 0);

        let state = state_with(vec![a], vec![undecided]);
        let plan = plan_sweep(&state, ResolvePolicy::default());

        assert!(plan.assignments.is_empty());
        assert!(plan.still_waiting.is_empty());
    }
}
