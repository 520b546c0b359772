//! Assignment engine.
//!
//! Given a registrant's ranked preferences and a consistent enrollment
//! snapshot, selects the best feasible program or declares the registrant
//! unassignable. Deterministic and O(N) in the number of preferences: the
//! walk is in rank order and ties are broken purely by rank, never by
//! program metadata.
//!
//! Priority class plays no part here. Real-time assignment at submission is
//! first-come-first-served against current capacity; fairness-by-priority is
//! applied only by the waitlist resolver's batch pass.

use std::collections::HashSet;

use crate::error::PreferenceError;
use crate::registry::EnrollmentSnapshot;
use crate::types::ProgramId;

/// Validate a ranked preference list: at most `max` entries, all distinct,
/// all known, all active.
///
/// An empty list is valid - it represents a registrant who has not picked
/// programs yet (the opted-out case never reaches the engine at all).
///
/// # Errors
///
/// Returns the first [`PreferenceError`] encountered walking the list in
/// rank order.
pub fn validate_preferences(
    preferences: &[ProgramId],
    snapshot: &EnrollmentSnapshot,
    max: usize,
) -> Result<(), PreferenceError> {
    if preferences.len() > max {
        return Err(PreferenceError::TooMany {
            given: preferences.len(),
            max,
        });
    }

    let mut seen = HashSet::with_capacity(preferences.len());
    for &program_id in preferences {
        if !seen.insert(program_id) {
            return Err(PreferenceError::Duplicate { program_id });
        }
        if !snapshot.is_known(program_id) {
            return Err(PreferenceError::Unknown { program_id });
        }
        if !snapshot.is_active(program_id) {
            return Err(PreferenceError::Inactive { program_id });
        }
    }

    Ok(())
}

/// Select the first preference, in rank order, with a free seat.
///
/// Returns `None` when no preference is feasible; the caller places the
/// registrant on the waitlist. Programs that have since been deactivated or
/// removed are skipped rather than treated as errors, so the resolver can
/// re-run stored preferences safely after catalog edits.
#[must_use]
pub fn assign(preferences: &[ProgramId], snapshot: &EnrollmentSnapshot) -> Option<ProgramId> {
    let selected = preferences
        .iter()
        .copied()
        .find(|&program_id| snapshot.has_room(program_id));

    match selected {
        Some(program_id) => {
            tracing::debug!(%program_id, "preference feasible, selecting");
        }
        None => {
            tracing::debug!(
                preference_count = preferences.len(),
                "no feasible preference, registrant stays waiting"
            );
        }
    }
    selected
}
