//! Registration lifecycle state machine.
//!
//! This module is the single owner of status transitions. Every status
//! change in the system - whether requested by the assignment engine, the
//! waitlist resolver, or an administrator - goes through the functions here,
//! which enforce the transition table and keep `assigned_program_id`
//! consistent with the status:
//!
//! ```text
//! Waiting ──▶ Assigned ──▶ Completed
//!    │            │
//!    │ (briefing  │ (admin reopen)
//!    │  only)     ▼
//!    └──────▶ Completed   Assigned ──▶ Waiting
//!
//! any state ──▶ Cancelled (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Participation, ProgramId, Registration, RegistrationStatus};

/// Violations of the registration state machine.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionError {
    /// The transition is not in the table
    #[error("cannot move a {from} registration to {to}")]
    Invalid {
        /// Current status
        from: RegistrationStatus,
        /// Requested status
        to: RegistrationStatus,
    },

    /// A seat was requested in a program the registrant never ranked
    #[error("program {program_id} is not among the registrant's preferences")]
    ProgramNotPreferred {
        /// The out-of-preference program
        program_id: ProgramId,
    },

    /// A waiting program-participation registrant cannot complete check-in
    /// without a confirmed seat
    #[error("registration is still waiting for a program assignment")]
    AwaitingAssignment,
}

/// Whether the transition table permits moving between two statuses.
///
/// Field-level consistency (preferences, participation) is enforced by the
/// semantic helpers below; this is the raw table.
#[must_use]
pub const fn can_transition(from: RegistrationStatus, to: RegistrationStatus) -> bool {
    use RegistrationStatus::{Assigned, Cancelled, Completed, Waiting};
    matches!(
        (from, to),
        (Waiting, Assigned)
            | (Waiting | Assigned, Completed)
            | (Assigned, Waiting)
            | (Waiting | Assigned | Completed, Cancelled)
    )
}

/// Check whether a seat in the given program may be confirmed.
///
/// The program must be one of the registrant's ranked preferences; the
/// engine guarantees this, the lifecycle re-checks it.
///
/// # Errors
///
/// Returns [`TransitionError::Invalid`] when the record is not waiting and
/// [`TransitionError::ProgramNotPreferred`] when the program was never
/// ranked.
pub fn check_assign(
    registration: &Registration,
    program_id: ProgramId,
) -> Result<(), TransitionError> {
    require(registration.status, RegistrationStatus::Assigned)?;
    if !registration.preferences.contains(&program_id) {
        return Err(TransitionError::ProgramNotPreferred { program_id });
    }
    Ok(())
}

/// Confirm a seat: `Waiting → Assigned`.
///
/// # Errors
///
/// Same conditions as [`check_assign`].
pub fn assign(
    registration: &mut Registration,
    program_id: ProgramId,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    check_assign(registration, program_id)?;
    registration.status = RegistrationStatus::Assigned;
    registration.assigned_program_id = Some(program_id);
    registration.updated_at = now;
    Ok(())
}

/// Check whether staff check-in may complete this registration.
///
/// # Errors
///
/// Returns [`TransitionError::AwaitingAssignment`] for a waiting registrant
/// who still expects a program seat, and [`TransitionError::Invalid`] for
/// terminal states.
pub fn check_complete(registration: &Registration) -> Result<(), TransitionError> {
    require(registration.status, RegistrationStatus::Completed)?;
    if registration.status == RegistrationStatus::Waiting
        && registration.participation == Participation::Programs
    {
        return Err(TransitionError::AwaitingAssignment);
    }
    Ok(())
}

/// Staff check-in: `Assigned → Completed`, or `Waiting → Completed` for the
/// briefing-only path (no program seat involved).
///
/// # Errors
///
/// Same conditions as [`check_complete`].
pub fn complete(
    registration: &mut Registration,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    check_complete(registration)?;
    registration.status = RegistrationStatus::Completed;
    registration.updated_at = now;
    Ok(())
}

/// Check whether the registration may be cancelled.
///
/// # Errors
///
/// Returns [`TransitionError::Invalid`] when the record is already
/// cancelled.
pub fn check_cancel(registration: &Registration) -> Result<(), TransitionError> {
    require(registration.status, RegistrationStatus::Cancelled)
}

/// Administrator withdrawal: any active state `→ Cancelled`.
///
/// Clears the assigned program so the freed seat is visible to the next
/// enrollment snapshot.
///
/// # Errors
///
/// Same conditions as [`check_cancel`].
pub fn cancel(registration: &mut Registration, now: DateTime<Utc>) -> Result<(), TransitionError> {
    check_cancel(registration)?;
    registration.status = RegistrationStatus::Cancelled;
    registration.assigned_program_id = None;
    registration.updated_at = now;
    Ok(())
}

/// Check whether an assigned registration may be sent back to the waitlist.
///
/// # Errors
///
/// Returns [`TransitionError::Invalid`] when the record is not assigned.
pub fn check_reopen(registration: &Registration) -> Result<(), TransitionError> {
    require(registration.status, RegistrationStatus::Waiting)
}

/// Administrator reopen: `Assigned → Waiting`, clearing the seat.
///
/// This is the only path back to `Waiting`; the assignment engine never
/// produces it.
///
/// # Errors
///
/// Same conditions as [`check_reopen`].
pub fn reopen(registration: &mut Registration, now: DateTime<Utc>) -> Result<(), TransitionError> {
    check_reopen(registration)?;
    registration.status = RegistrationStatus::Waiting;
    registration.assigned_program_id = None;
    registration.updated_at = now;
    Ok(())
}

fn require(from: RegistrationStatus, to: RegistrationStatus) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError::Invalid { from, to })
    }
}
