//! Error types for the check-in core.
//!
//! Every user-visible failure is one of the [`CheckinError`] kinds with
//! enough context for the surrounding UI to render a localized message; no
//! opaque internal error escapes the core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::TransitionError;
use crate::store::StoreError;
use crate::types::{AttendeeKey, ProgramId, RegistrationId};

/// Ways a ranked preference list can be malformed.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferenceError {
    /// More preferences than the configured maximum
    #[error("{given} preferences exceed the maximum of {max}")]
    TooMany {
        /// Number of preferences submitted
        given: usize,
        /// Configured maximum
        max: usize,
    },

    /// The same program listed twice
    #[error("program {program_id} appears more than once")]
    Duplicate {
        /// The repeated program
        program_id: ProgramId,
    },

    /// A program id that is not in the catalog
    #[error("unknown program {program_id}")]
    Unknown {
        /// The unknown id
        program_id: ProgramId,
    },

    /// A program that exists but is not open for selection
    #[error("program {program_id} is not active")]
    Inactive {
        /// The inactive program
        program_id: ProgramId,
    },
}

/// Reasons the registration reducer rejected a command.
///
/// Recorded on [`crate::types::CheckinState`] and drained by the service
/// shell, which maps each reason onto a [`CheckinError`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The ranked preferences failed validation
    InvalidPreference {
        /// What was wrong with them
        error: PreferenceError,
    },
    /// The attendee already has an active registration
    DuplicateRegistration {
        /// The offending key
        attendee_key: AttendeeKey,
    },
    /// The command referenced a registration that does not exist
    RegistrationNotFound {
        /// The missing id
        registration_id: RegistrationId,
    },
    /// The command referenced a program that does not exist
    ProgramNotFound {
        /// The missing id
        program_id: ProgramId,
    },
    /// The requested lifecycle transition is not permitted
    InvalidTransition {
        /// The violated transition rule
        error: TransitionError,
    },
}

/// Errors surfaced by the check-in service.
#[derive(Error, Debug)]
pub enum CheckinError {
    /// Malformed, duplicate, unknown, or inactive program preference
    #[error("invalid preference: {0}")]
    InvalidPreference(#[from] PreferenceError),

    /// The attendee already has a waiting, assigned, or completed
    /// registration; requires human resolution, never retried automatically
    #[error("attendee '{attendee_key}' already has an active registration")]
    DuplicateRegistration {
        /// The offending key
        attendee_key: AttendeeKey,
    },

    /// No registration with the given id
    #[error("registration {0} not found")]
    RegistrationNotFound(RegistrationId),

    /// No program with the given id
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),

    /// A lifecycle transition was requested that the state machine forbids
    #[error("lifecycle violation: {0}")]
    Transition(#[from] TransitionError),

    /// The backing store failed; the registration, if already created,
    /// remains waiting and nothing was partially applied
    #[error("registration store error: {0}")]
    Store(#[from] StoreError),
}

impl From<RejectionReason> for CheckinError {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::InvalidPreference { error } => Self::InvalidPreference(error),
            RejectionReason::DuplicateRegistration { attendee_key } => {
                Self::DuplicateRegistration { attendee_key }
            }
            RejectionReason::RegistrationNotFound { registration_id } => {
                Self::RegistrationNotFound(registration_id)
            }
            RejectionReason::ProgramNotFound { program_id } => Self::ProgramNotFound(program_id),
            RejectionReason::InvalidTransition { error } => Self::Transition(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_error_display_carries_context() {
        let error = PreferenceError::TooMany { given: 5, max: 3 };
        assert_eq!(format!("{error}"), "5 preferences exceed the maximum of 3");
    }

    #[test]
    fn rejection_maps_to_matching_error_kind() {
        let key = AttendeeKey::new("a", "b");
        let mapped: CheckinError = RejectionReason::DuplicateRegistration {
            attendee_key: key.clone(),
        }
        .into();
        assert!(matches!(
            mapped,
            CheckinError::DuplicateRegistration { attendee_key } if attendee_key == key
        ));
    }
}
