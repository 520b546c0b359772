//! Registration aggregate for the check-in system.
//!
//! Handles registrant submission, seat assignment, waitlist promotion, and
//! the administrator surface (check-in, cancel, reopen, edit, delete,
//! program catalog management).
//!
//! **Concurrency strategy**: commands validate against an enrollment
//! snapshot derived from the committed registration set inside the same
//! state, never against a cached counter. The service shell serializes
//! command execution and persists the emitted events with a
//! revision-checked commit, so two registrants who both observed "one seat
//! left" can never both be confirmed.

use std::sync::Arc;

use checkin_core::effect::Effect;
use checkin_core::environment::{Clock, IdGenerator};
use checkin_core::reducer::Reducer;
use checkin_core::{SmallVec, smallvec};
use serde::{Deserialize, Serialize};

use crate::engine;
use crate::error::RejectionReason;
use crate::guard;
use crate::lifecycle;
use crate::registry::EnrollmentSnapshot;
use crate::types::{
    AttendeeKey, Capacity, CheckinState, Participation, PriorityClass, Program, ProgramId,
    Registration, RegistrationEvent, RegistrationId, RegistrationStatus,
};

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the registration aggregate.
///
/// Command variants are validated against current state and emit
/// [`RegistrationEvent`]s; the `Event` variant replays a previously emitted
/// event without re-validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RegistrationAction {
    // Commands
    /// A registrant submits preferences at the kiosk
    SubmitRegistration {
        /// Deduplication key for the attendee
        attendee_key: AttendeeKey,
        /// Ranked program preferences (ignored for briefing-only)
        preferences: Vec<ProgramId>,
        /// Program participation flag
        participation: Participation,
        /// Reserved/walk-in classification
        priority: PriorityClass,
    },

    /// Run the assignment engine for one waiting registrant
    TryAssign {
        /// The waiting registration
        registration_id: RegistrationId,
    },

    /// Confirm a specific planned seat during a waitlist sweep
    AssignFromWaitlist {
        /// The waiting registration
        registration_id: RegistrationId,
        /// The planned program
        program_id: ProgramId,
    },

    /// An administrator replaces a registrant's ranked preferences
    EditRegistration {
        /// The registration to edit
        registration_id: RegistrationId,
        /// The new ranked preferences
        preferences: Vec<ProgramId>,
    },

    /// Staff processes the physical check-in
    CheckIn {
        /// The registration checking in
        registration_id: RegistrationId,
    },

    /// An administrator withdraws a registration
    CancelRegistration {
        /// The registration to cancel
        registration_id: RegistrationId,
    },

    /// An administrator sends an assigned registration back to the waitlist
    ReopenRegistration {
        /// The registration to reopen
        registration_id: RegistrationId,
    },

    /// An administrator destroys a registration record
    DeleteRegistration {
        /// The registration to delete
        registration_id: RegistrationId,
    },

    /// An administrator creates or replaces a program
    UpsertProgram {
        /// The full program record
        program: Program,
    },

    /// An administrator changes a program's capacity
    SetProgramCapacity {
        /// The program to edit
        program_id: ProgramId,
        /// The new capacity
        capacity: Capacity,
    },

    /// An administrator opens or closes a program for selection
    SetProgramActive {
        /// The program to edit
        program_id: ProgramId,
        /// The new active flag
        is_active: bool,
    },

    // Events (from the store / journal replay)
    /// Replay a previously emitted event
    Event(RegistrationEvent),
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the registration aggregate
#[derive(Clone)]
pub struct RegistrationEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Id minting for new registrations
    pub ids: Arc<dyn IdGenerator>,
    /// Maximum number of ranked preferences per registration
    pub max_preferences: usize,
}

impl RegistrationEnvironment {
    /// Creates a new `RegistrationEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>, max_preferences: usize) -> Self {
        Self {
            clock,
            ids,
            max_preferences,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the registration aggregate.
///
/// The reducer never applies a status change itself - it emits events whose
/// application goes through the [`crate::lifecycle`] transition functions,
/// keeping the state machine the single owner of transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationReducer;

impl RegistrationReducer {
    /// Creates a new `RegistrationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Apply an event to state and journal it for the service shell
    fn emit(state: &mut CheckinState, event: RegistrationEvent) {
        Self::apply_event(state, &event);
        state.record(event);
    }

    /// Applies an event to state.
    ///
    /// Status changes go through the lifecycle module; an event that fails
    /// its transition check is skipped with a warning rather than applied
    /// inconsistently (it can only arise from a corrupted journal).
    fn apply_event(state: &mut CheckinState, event: &RegistrationEvent) {
        match event {
            RegistrationEvent::RegistrationSubmitted { registration } => {
                state.put_registration(registration.clone());
            }

            RegistrationEvent::RegistrationAssigned {
                registration_id,
                program_id,
                assigned_at,
            } => {
                if let Some(registration) = state.registration_mut(registration_id) {
                    if let Err(error) = lifecycle::assign(registration, *program_id, *assigned_at)
                    {
                        tracing::warn!(%registration_id, %error, "skipping inconsistent assignment event");
                    }
                }
            }

            RegistrationEvent::RegistrationCompleted {
                registration_id,
                completed_at,
            } => {
                if let Some(registration) = state.registration_mut(registration_id) {
                    if let Err(error) = lifecycle::complete(registration, *completed_at) {
                        tracing::warn!(%registration_id, %error, "skipping inconsistent completion event");
                    }
                }
            }

            RegistrationEvent::RegistrationCancelled {
                registration_id,
                cancelled_at,
            } => {
                if let Some(registration) = state.registration_mut(registration_id) {
                    if let Err(error) = lifecycle::cancel(registration, *cancelled_at) {
                        tracing::warn!(%registration_id, %error, "skipping inconsistent cancellation event");
                    }
                }
            }

            RegistrationEvent::RegistrationReopened {
                registration_id,
                reopened_at,
            } => {
                if let Some(registration) = state.registration_mut(registration_id) {
                    if let Err(error) = lifecycle::reopen(registration, *reopened_at) {
                        tracing::warn!(%registration_id, %error, "skipping inconsistent reopen event");
                    }
                }
            }

            RegistrationEvent::PreferencesChanged {
                registration_id,
                preferences,
                changed_at,
            } => {
                if let Some(registration) = state.registration_mut(registration_id) {
                    registration.preferences = preferences.clone();
                    registration.updated_at = *changed_at;
                }
            }

            RegistrationEvent::RegistrationDeleted { registration_id } => {
                state.remove_registration(registration_id);
            }

            RegistrationEvent::ProgramUpserted { program } => {
                state.put_program(program.clone());
            }

            RegistrationEvent::ProgramCapacitySet {
                program_id,
                capacity,
            } => {
                if let Some(program) = state.program_mut(program_id) {
                    program.capacity = *capacity;
                }
            }

            RegistrationEvent::ProgramActiveSet {
                program_id,
                is_active,
            } => {
                if let Some(program) = state.program_mut(program_id) {
                    program.is_active = *is_active;
                }
            }
        }
    }

    /// Follow-up effect that runs the assignment engine for one registrant
    fn try_assign_effect(
        registration_id: RegistrationId,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        smallvec![Effect::future(async move {
            Some(RegistrationAction::TryAssign { registration_id })
        })]
    }

    fn handle_submit(
        state: &mut CheckinState,
        env: &RegistrationEnvironment,
        attendee_key: AttendeeKey,
        preferences: Vec<ProgramId>,
        participation: Participation,
        priority: PriorityClass,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        if guard::is_duplicate(state.registrations(), &attendee_key) {
            tracing::info!(%attendee_key, "duplicate registration rejected");
            state.reject(RejectionReason::DuplicateRegistration { attendee_key });
            return SmallVec::new();
        }

        let now = env.clock.now();
        let registration_id = RegistrationId::from_uuid(env.ids.next());

        match participation {
            Participation::BriefingOnly => {
                // Opted out of programs entirely: never enters the engine,
                // checked straight through.
                let registration = Registration::new(
                    registration_id,
                    attendee_key,
                    Vec::new(),
                    participation,
                    priority,
                    state.next_sequence(),
                    now,
                );
                Self::emit(state, RegistrationEvent::RegistrationSubmitted { registration });
                Self::emit(
                    state,
                    RegistrationEvent::RegistrationCompleted {
                        registration_id,
                        completed_at: now,
                    },
                );
                SmallVec::new()
            }
            Participation::Programs => {
                let snapshot = EnrollmentSnapshot::from_state(state);
                if let Err(error) =
                    engine::validate_preferences(&preferences, &snapshot, env.max_preferences)
                {
                    tracing::info!(%attendee_key, %error, "preference validation failed");
                    state.reject(RejectionReason::InvalidPreference { error });
                    return SmallVec::new();
                }

                let registration = Registration::new(
                    registration_id,
                    attendee_key,
                    preferences,
                    participation,
                    priority,
                    state.next_sequence(),
                    now,
                );
                Self::emit(state, RegistrationEvent::RegistrationSubmitted { registration });
                Self::try_assign_effect(registration_id)
            }
        }
    }

    fn handle_try_assign(
        state: &mut CheckinState,
        env: &RegistrationEnvironment,
        registration_id: RegistrationId,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        let Some(registration) = state.registration(&registration_id) else {
            state.reject(RejectionReason::RegistrationNotFound { registration_id });
            return SmallVec::new();
        };
        if !registration.is_waiting_for_assignment() {
            return SmallVec::new();
        }

        let snapshot = EnrollmentSnapshot::from_state(state);
        if let Some(program_id) = engine::assign(&registration.preferences, &snapshot) {
            Self::emit(
                state,
                RegistrationEvent::RegistrationAssigned {
                    registration_id,
                    program_id,
                    assigned_at: env.clock.now(),
                },
            );
        }
        SmallVec::new()
    }

    fn handle_assign_from_waitlist(
        state: &mut CheckinState,
        env: &RegistrationEnvironment,
        registration_id: RegistrationId,
        program_id: ProgramId,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        let Some(registration) = state.registration(&registration_id) else {
            state.reject(RejectionReason::RegistrationNotFound { registration_id });
            return SmallVec::new();
        };
        if let Err(error) = lifecycle::check_assign(registration, program_id) {
            state.reject(RejectionReason::InvalidTransition { error });
            return SmallVec::new();
        }

        // Re-check capacity against the current snapshot; the plan this
        // command came from may predate a catalog edit.
        let snapshot = EnrollmentSnapshot::from_state(state);
        if !snapshot.has_room(program_id) {
            tracing::warn!(%registration_id, %program_id, "planned seat no longer available");
            return SmallVec::new();
        }

        Self::emit(
            state,
            RegistrationEvent::RegistrationAssigned {
                registration_id,
                program_id,
                assigned_at: env.clock.now(),
            },
        );
        SmallVec::new()
    }

    fn handle_edit(
        state: &mut CheckinState,
        env: &RegistrationEnvironment,
        registration_id: RegistrationId,
        preferences: Vec<ProgramId>,
    ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
        let Some(registration) = state.registration(&registration_id) else {
            state.reject(RejectionReason::RegistrationNotFound { registration_id });
            return SmallVec::new();
        };
        let status = registration.status;
        let was_assigned = registration.assigned_program_id.is_some();

        let snapshot = EnrollmentSnapshot::from_state(state);
        if let Err(error) =
            engine::validate_preferences(&preferences, &snapshot, env.max_preferences)
        {
            state.reject(RejectionReason::InvalidPreference { error });
            return SmallVec::new();
        }

        // Only waiting records, or assigned records that can be reopened,
        // may have their choices edited
        let editable = status == RegistrationStatus::Waiting
            || lifecycle::can_transition(status, RegistrationStatus::Waiting);
        if !editable {
            state.reject(RejectionReason::InvalidTransition {
                error: lifecycle::TransitionError::Invalid {
                    from: status,
                    to: RegistrationStatus::Waiting,
                },
            });
            return SmallVec::new();
        }

        let now = env.clock.now();
        if was_assigned {
            Self::emit(
                state,
                RegistrationEvent::RegistrationReopened {
                    registration_id,
                    reopened_at: now,
                },
            );
        }
        Self::emit(
            state,
            RegistrationEvent::PreferencesChanged {
                registration_id,
                preferences,
                changed_at: now,
            },
        );
        Self::try_assign_effect(registration_id)
    }
}

impl Reducer for RegistrationReducer {
    type State = CheckinState;
    type Action = RegistrationAction;
    type Environment = RegistrationEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per administrator operation
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Registrant commands ==========
            RegistrationAction::SubmitRegistration {
                attendee_key,
                preferences,
                participation,
                priority,
            } => Self::handle_submit(state, env, attendee_key, preferences, participation, priority),

            RegistrationAction::TryAssign { registration_id } => {
                Self::handle_try_assign(state, env, registration_id)
            }

            RegistrationAction::AssignFromWaitlist {
                registration_id,
                program_id,
            } => Self::handle_assign_from_waitlist(state, env, registration_id, program_id),

            // ========== Administrator commands ==========
            RegistrationAction::EditRegistration {
                registration_id,
                preferences,
            } => Self::handle_edit(state, env, registration_id, preferences),

            RegistrationAction::CheckIn { registration_id } => {
                let Some(registration) = state.registration(&registration_id) else {
                    state.reject(RejectionReason::RegistrationNotFound { registration_id });
                    return SmallVec::new();
                };
                match lifecycle::check_complete(registration) {
                    Ok(()) => Self::emit(
                        state,
                        RegistrationEvent::RegistrationCompleted {
                            registration_id,
                            completed_at: env.clock.now(),
                        },
                    ),
                    Err(error) => state.reject(RejectionReason::InvalidTransition { error }),
                }
                SmallVec::new()
            }

            RegistrationAction::CancelRegistration { registration_id } => {
                let Some(registration) = state.registration(&registration_id) else {
                    state.reject(RejectionReason::RegistrationNotFound { registration_id });
                    return SmallVec::new();
                };
                match lifecycle::check_cancel(registration) {
                    Ok(()) => Self::emit(
                        state,
                        RegistrationEvent::RegistrationCancelled {
                            registration_id,
                            cancelled_at: env.clock.now(),
                        },
                    ),
                    Err(error) => state.reject(RejectionReason::InvalidTransition { error }),
                }
                SmallVec::new()
            }

            RegistrationAction::ReopenRegistration { registration_id } => {
                let Some(registration) = state.registration(&registration_id) else {
                    state.reject(RejectionReason::RegistrationNotFound { registration_id });
                    return SmallVec::new();
                };
                match lifecycle::check_reopen(registration) {
                    Ok(()) => Self::emit(
                        state,
                        RegistrationEvent::RegistrationReopened {
                            registration_id,
                            reopened_at: env.clock.now(),
                        },
                    ),
                    Err(error) => state.reject(RejectionReason::InvalidTransition { error }),
                }
                SmallVec::new()
            }

            RegistrationAction::DeleteRegistration { registration_id } => {
                if state.registration(&registration_id).is_none() {
                    state.reject(RejectionReason::RegistrationNotFound { registration_id });
                    return SmallVec::new();
                }
                Self::emit(
                    state,
                    RegistrationEvent::RegistrationDeleted { registration_id },
                );
                SmallVec::new()
            }

            RegistrationAction::UpsertProgram { program } => {
                Self::emit(state, RegistrationEvent::ProgramUpserted { program });
                SmallVec::new()
            }

            RegistrationAction::SetProgramCapacity {
                program_id,
                capacity,
            } => {
                let Some(program) = state.program(&program_id) else {
                    state.reject(RejectionReason::ProgramNotFound { program_id });
                    return SmallVec::new();
                };
                let snapshot = EnrollmentSnapshot::from_state(state);
                let enrollment = snapshot.enrollment_of(program_id);
                if capacity.value() < enrollment {
                    // Existing confirmed seats stand; the program simply
                    // accepts no further assignments until seats free up.
                    tracing::warn!(
                        %program_id,
                        title = %program.title,
                        %capacity,
                        enrollment,
                        "capacity set below current enrollment"
                    );
                }
                Self::emit(
                    state,
                    RegistrationEvent::ProgramCapacitySet {
                        program_id,
                        capacity,
                    },
                );
                SmallVec::new()
            }

            RegistrationAction::SetProgramActive {
                program_id,
                is_active,
            } => {
                if state.program(&program_id).is_none() {
                    state.reject(RejectionReason::ProgramNotFound { program_id });
                    return SmallVec::new();
                }
                Self::emit(
                    state,
                    RegistrationEvent::ProgramActiveSet {
                        program_id,
                        is_active,
                    },
                );
                SmallVec::new()
            }

            // ========== Events (journal replay) ==========
            RegistrationAction::Event(event) => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}
