//! Property tests for the core invariants: capacity is never exceeded, keys
//! stay unique, stored preferences stay well-formed, and a second sweep with
//! unchanged capacity assigns nobody.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use checkin_kiosk::{
    AttendeeKey, Capacity, CheckinService, Config, GradeTier, InMemoryRegistrationStore,
    Participation, PriorityClass, Program, ProgramId, ResolvePolicy,
};

#[derive(Clone, Debug)]
struct RegistrantSpec {
    preference_indices: Vec<usize>,
    reserved: bool,
    grade: u8,
    briefing_only: bool,
}

fn registrant_strategy(program_count: usize) -> impl Strategy<Value = RegistrantSpec> {
    let indices: Vec<usize> = (0..program_count).collect();
    (
        proptest::sample::subsequence(indices, 0..=program_count.min(3)),
        any::<bool>(),
        0u8..4,
        // Briefing-only visitors are the rarer case
        prop::bool::weighted(0.15),
    )
        .prop_map(
            |(preference_indices, reserved, grade, briefing_only)| RegistrantSpec {
                preference_indices,
                reserved,
                grade,
                briefing_only,
            },
        )
}

fn scenario_strategy()
-> impl Strategy<Value = (Vec<u32>, Vec<RegistrantSpec>, ResolvePolicy)> {
    (1usize..=4)
        .prop_flat_map(|program_count| {
            (
                proptest::collection::vec(0u32..=3, program_count),
                proptest::collection::vec(registrant_strategy(program_count), 1..=15),
                (any::<bool>(), any::<bool>()).prop_map(|(prioritize_reserved, prioritize_grade)| {
                    ResolvePolicy {
                        prioritize_reserved,
                        prioritize_grade,
                    }
                }),
            )
        })
}

fn grade_tier(grade: u8) -> GradeTier {
    match grade {
        0 => GradeTier::Grade3,
        1 => GradeTier::Grade2,
        2 => GradeTier::Grade1,
        _ => GradeTier::Other,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn invariants_hold_under_arbitrary_load(
        (capacities, registrants, policy) in scenario_strategy()
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let store = Arc::new(InMemoryRegistrationStore::new());
            let service = CheckinService::new(store, &Config::default());

            let mut program_ids = Vec::new();
            for (order, capacity) in capacities.iter().enumerate() {
                let program = Program::new(
                    ProgramId::new(),
                    format!("program-{order}"),
                    Capacity::new(*capacity),
                    i32::try_from(order).unwrap(),
                );
                program_ids.push(program.id);
                service.upsert_program(program).await.unwrap();
            }

            for (index, spec) in registrants.iter().enumerate() {
                let preferences: Vec<ProgramId> = spec
                    .preference_indices
                    .iter()
                    .map(|&i| program_ids[i])
                    .collect();
                let (participation, preferences) = if spec.briefing_only {
                    (Participation::BriefingOnly, Vec::new())
                } else {
                    (Participation::Programs, preferences)
                };
                let priority = if spec.reserved {
                    PriorityClass::Reserved
                } else {
                    PriorityClass::WalkIn {
                        grade: grade_tier(spec.grade),
                    }
                };

                service
                    .submit_registration(
                        AttendeeKey::new(&format!("attendee-{index}"), "ふりがな"),
                        preferences,
                        participation,
                        priority,
                    )
                    .await
                    .unwrap();
            }

            let first_sweep = service.resolve_waitlist(policy).await.unwrap();
            let second_sweep = service.resolve_waitlist(policy).await.unwrap();

            // Resolver idempotence: nothing changed between sweeps
            prop_assert_eq!(second_sweep.assigned_count, 0);
            prop_assert_eq!(
                second_sweep.still_waiting_count,
                first_sweep.still_waiting_count
            );

            // Capacity invariant, from the same derived view the engine uses
            let snapshot = service.status_snapshot().await.unwrap();
            for row in &snapshot {
                prop_assert!(
                    row.enrollment <= row.capacity.value(),
                    "program {} oversubscribed: {} > {}",
                    row.program_id,
                    row.enrollment,
                    row.capacity.value()
                );
            }

            // Per-record integrity
            let records = service.registrations().await.unwrap();
            let mut active_keys: HashMap<&str, usize> = HashMap::new();
            for record in &records {
                // Preference integrity
                prop_assert!(record.preferences.len() <= 3);
                let mut distinct = record.preferences.clone();
                distinct.sort();
                distinct.dedup();
                prop_assert_eq!(distinct.len(), record.preferences.len());

                // Assigned program must come from the preferences
                if let Some(program_id) = record.assigned_program_id {
                    prop_assert!(record.preferences.contains(&program_id));
                }

                if record.status.is_active() {
                    *active_keys.entry(record.attendee_key.as_str()).or_default() += 1;
                }
            }

            // No duplicate active registration per key
            for (attendee_key, count) in active_keys {
                prop_assert_eq!(count, 1, "key {} has {} active records", attendee_key, count);
            }

            Ok(())
        })?;
    }
}
