//! Check-in service - the imperative shell around the registration aggregate.
//!
//! The service is the single-writer arbitration point required by the
//! capacity guarantee: every decision path acquires one writer lock, reads a
//! fresh snapshot from the store, runs the reducer, and persists the emitted
//! events with a revision-checked commit. A lost race (`RevisionConflict`
//! from a concurrent kiosk session) triggers re-read and re-decide; after a
//! bounded number of attempts the registrant is placed on the waitlist
//! instead of receiving the contested seat.
//!
//! The waitlist sweep runs end-to-end under the same writer lock and commits
//! each assignment separately, so a sweep interrupted by a crash resumes
//! naturally: already-committed assignments are excluded from the next
//! sweep's snapshot by construction.

use std::collections::HashSet;
use std::sync::Arc;

use checkin_core::effect::Effect;
use checkin_core::environment::{SystemClock, UuidGenerator};
use checkin_core::reducer::Reducer;
use checkin_core::SmallVec;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregates::{RegistrationAction, RegistrationEnvironment, RegistrationReducer};
use crate::config::Config;
use crate::error::CheckinError;
use crate::registry;
use crate::resolver;
use crate::store::{RegistrationStore, StoreError, WriteBatch, WriteOp};
use crate::types::{
    AssignmentOutcome, AttendeeKey, Capacity, CheckinState, Participation, PriorityClass, Program,
    ProgramId, ProgramStatus, Registration, RegistrationEvent, RegistrationId, RegistrationStatus,
    ResolutionReport, ResolvePolicy,
};

/// The check-in core's facade towards the surrounding application.
pub struct CheckinService {
    store: Arc<dyn RegistrationStore>,
    reducer: RegistrationReducer,
    env: RegistrationEnvironment,
    retry_limit: u32,
    default_policy: ResolvePolicy,
    write_lock: Mutex<()>,
}

impl CheckinService {
    /// Creates a service with production clock and id generation.
    #[must_use]
    pub fn new(store: Arc<dyn RegistrationStore>, config: &Config) -> Self {
        let env = RegistrationEnvironment::new(
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            config.max_preferences,
        );
        Self::with_environment(store, env, config)
    }

    /// Creates a service with an injected environment (deterministic tests).
    #[must_use]
    pub fn with_environment(
        store: Arc<dyn RegistrationStore>,
        env: RegistrationEnvironment,
        config: &Config,
    ) -> Self {
        Self {
            store,
            reducer: RegistrationReducer::new(),
            env,
            retry_limit: config.assign_retry_limit,
            default_policy: config.default_policy,
            write_lock: Mutex::new(()),
        }
    }

    /// The priority policy configured as the default for sweeps
    #[must_use]
    pub const fn default_policy(&self) -> ResolvePolicy {
        self.default_policy
    }

    // ========================================================================
    // Public surface
    // ========================================================================

    /// Register an attendee and attempt real-time assignment.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::DuplicateRegistration`] when the key already holds
    ///   an active registration (manual resolution, never auto-retried)
    /// - [`CheckinError::InvalidPreference`] when the ranked preferences are
    ///   malformed
    /// - [`CheckinError::Store`] when the store cannot make progress; the
    ///   registration is not created
    pub async fn submit_registration(
        &self,
        attendee_key: AttendeeKey,
        preferences: Vec<ProgramId>,
        participation: Participation,
        priority: PriorityClass,
    ) -> Result<AssignmentOutcome, CheckinError> {
        let _guard = self.write_lock.lock().await;
        let action = RegistrationAction::SubmitRegistration {
            attendee_key: attendee_key.clone(),
            preferences,
            participation,
            priority,
        };

        match self.execute(action.clone(), true).await {
            Ok((state, events)) => {
                let outcome = Self::submission_outcome(&state, &events)?;
                info!(%attendee_key, ?outcome, "registration submitted");
                Ok(outcome)
            }
            Err(CheckinError::Store(StoreError::RevisionConflict { .. })) => {
                // Retry budget exhausted on the contested seat: place the
                // registrant on the waitlist without an assignment.
                warn!(%attendee_key, "assignment retries exhausted, deferring to waitlist");
                let (_, events) = self.execute(action, false).await?;
                let registration_id = Self::submitted_id(&events).ok_or_else(|| {
                    CheckinError::Store(StoreError::Unavailable(
                        "registration record missing after deferred commit".to_string(),
                    ))
                })?;
                Ok(AssignmentOutcome::AssignedToWaiting { registration_id })
            }
            Err(error) => Err(error),
        }
    }

    /// Replace a registrant's ranked preferences and re-run assignment.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::RegistrationNotFound`] for an unknown id
    /// - [`CheckinError::InvalidPreference`] for malformed preferences
    /// - [`CheckinError::Transition`] when the record can no longer be
    ///   edited (completed or cancelled)
    /// - [`CheckinError::Store`] on store failure
    pub async fn edit_registration(
        &self,
        registration_id: RegistrationId,
        preferences: Vec<ProgramId>,
    ) -> Result<AssignmentOutcome, CheckinError> {
        let _guard = self.write_lock.lock().await;
        let action = RegistrationAction::EditRegistration {
            registration_id,
            preferences,
        };

        match self.execute(action.clone(), true).await {
            Ok((state, _)) => Self::edit_outcome(&state, registration_id),
            Err(CheckinError::Store(StoreError::RevisionConflict { .. })) => {
                warn!(%registration_id, "edit retries exhausted, deferring to waitlist");
                self.execute(action, false).await?;
                Ok(AssignmentOutcome::AssignedToWaiting { registration_id })
            }
            Err(error) => Err(error),
        }
    }

    /// Sweep the waitlist under the given priority policy.
    ///
    /// Each assignment is committed separately while the writer lock is
    /// held; an interrupted sweep loses at most the uncommitted remainder,
    /// which the next sweep picks up from its own snapshot.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::Store`] when the store cannot make progress or the
    ///   replan budget is exhausted
    pub async fn resolve_waitlist(
        &self,
        policy: ResolvePolicy,
    ) -> Result<ResolutionReport, CheckinError> {
        let _guard = self.write_lock.lock().await;
        let mut assigned_count = 0usize;
        let mut replans = 0u32;

        loop {
            let snapshot = self.store.load_snapshot().await?;
            let mut revision = snapshot.revision;
            let mut state =
                CheckinState::from_records(snapshot.programs, snapshot.registrations);
            let plan = resolver::plan_sweep(&state, policy);

            if plan.assignments.is_empty() {
                let report = ResolutionReport {
                    assigned_count,
                    still_waiting_count: plan.still_waiting.len(),
                };
                info!(
                    assigned = report.assigned_count,
                    still_waiting = report.still_waiting_count,
                    "waitlist sweep finished"
                );
                return Ok(report);
            }

            let mut conflicted = false;
            for (registration_id, program_id) in plan.assignments {
                let _ = self.reducer.reduce(
                    &mut state,
                    RegistrationAction::AssignFromWaitlist {
                        registration_id,
                        program_id,
                    },
                    &self.env,
                );
                if let Some(reason) = state.take_rejection() {
                    warn!(%registration_id, ?reason, "planned assignment refused, replanning");
                    conflicted = true;
                    break;
                }
                let events = state.take_journal();
                if events.is_empty() {
                    // The seat vanished under the plan (capacity re-check)
                    conflicted = true;
                    break;
                }

                let batch = Self::batch_from_events(&events, &state);
                match self.store.commit(revision, batch).await {
                    Ok(next) => {
                        debug!(%registration_id, %program_id, "waitlist assignment committed");
                        revision = next;
                        assigned_count += 1;
                    }
                    Err(StoreError::RevisionConflict { expected, actual }) => {
                        warn!(%expected, %actual, "sweep lost a race, replanning");
                        conflicted = true;
                        break;
                    }
                    Err(error) => return Err(error.into()),
                }
            }

            if !conflicted {
                let still_waiting_count = state
                    .registrations()
                    .filter(|r| r.is_waiting_for_assignment())
                    .count();
                let report = ResolutionReport {
                    assigned_count,
                    still_waiting_count,
                };
                info!(
                    assigned = report.assigned_count,
                    still_waiting = report.still_waiting_count,
                    "waitlist sweep finished"
                );
                return Ok(report);
            }

            replans += 1;
            if replans > self.retry_limit {
                return Err(CheckinError::Store(StoreError::Unavailable(
                    "waitlist sweep replan budget exhausted".to_string(),
                )));
            }
        }
    }

    /// Staff check-in for one registration.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::RegistrationNotFound`] / [`CheckinError::Transition`]
    /// - [`CheckinError::Store`] on store failure
    pub async fn check_in(&self, registration_id: RegistrationId) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::CheckIn { registration_id })
            .await
    }

    /// Withdraw a registration (administrator action).
    ///
    /// # Errors
    ///
    /// Same conditions as [`CheckinService::check_in`].
    pub async fn cancel_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::CancelRegistration { registration_id })
            .await
    }

    /// Send an assigned registration back to the waitlist (administrator
    /// action); the freed seat becomes visible to the next snapshot.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CheckinService::check_in`].
    pub async fn reopen_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::ReopenRegistration { registration_id })
            .await
    }

    /// Destroy a registration record; the only way a record ever disappears.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CheckinService::check_in`].
    pub async fn delete_registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::DeleteRegistration { registration_id })
            .await
    }

    /// Create or replace a program in the catalog.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::Store`] on store failure
    pub async fn upsert_program(&self, program: Program) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::UpsertProgram { program })
            .await
    }

    /// Change a program's capacity; takes effect on the next snapshot read.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::ProgramNotFound`] for an unknown id
    /// - [`CheckinError::Store`] on store failure
    pub async fn set_program_capacity(
        &self,
        program_id: ProgramId,
        capacity: Capacity,
    ) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::SetProgramCapacity {
            program_id,
            capacity,
        })
        .await
    }

    /// Open or close a program for selection.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CheckinService::set_program_capacity`].
    pub async fn set_program_active(
        &self,
        program_id: ProgramId,
        is_active: bool,
    ) -> Result<(), CheckinError> {
        self.run_admin(RegistrationAction::SetProgramActive {
            program_id,
            is_active,
        })
        .await
    }

    /// Per-program capacity and derived enrollment, sorted by display order.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::Store`] on store failure
    pub async fn status_snapshot(&self) -> Result<Vec<ProgramStatus>, CheckinError> {
        let snapshot = self.store.load_snapshot().await?;
        let state = CheckinState::from_records(snapshot.programs, snapshot.registrations);
        Ok(registry::status_rows(&state))
    }

    /// All registration records in submission order.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::Store`] on store failure
    pub async fn registrations(&self) -> Result<Vec<Registration>, CheckinError> {
        let snapshot = self.store.load_snapshot().await?;
        let mut records = snapshot.registrations;
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }

    /// Look up one registration record.
    ///
    /// # Errors
    ///
    /// - [`CheckinError::RegistrationNotFound`] for an unknown id
    /// - [`CheckinError::Store`] on store failure
    pub async fn registration(
        &self,
        registration_id: RegistrationId,
    ) -> Result<Registration, CheckinError> {
        let snapshot = self.store.load_snapshot().await?;
        snapshot
            .registrations
            .into_iter()
            .find(|r| r.id == registration_id)
            .ok_or(CheckinError::RegistrationNotFound(registration_id))
    }

    // ========================================================================
    // Write path internals
    // ========================================================================

    async fn run_admin(&self, action: RegistrationAction) -> Result<(), CheckinError> {
        let _guard = self.write_lock.lock().await;
        self.execute(action, true).await.map(|_| ())
    }

    /// Run one command against a fresh snapshot and commit the emitted
    /// events atomically, retrying the read-decide-commit cycle on lost
    /// races up to the configured budget.
    async fn execute(
        &self,
        action: RegistrationAction,
        run_follow_ups: bool,
    ) -> Result<(CheckinState, Vec<RegistrationEvent>), CheckinError> {
        let mut attempt = 0u32;
        loop {
            let snapshot = self.store.load_snapshot().await?;
            let mut state =
                CheckinState::from_records(snapshot.programs, snapshot.registrations);

            let effects = self.reducer.reduce(&mut state, action.clone(), &self.env);
            if run_follow_ups {
                self.run_effects(&mut state, effects).await;
            }

            if let Some(reason) = state.take_rejection() {
                return Err(reason.into());
            }

            let events = state.take_journal();
            let batch = Self::batch_from_events(&events, &state);
            if batch.is_empty() {
                return Ok((state, events));
            }

            match self.store.commit(snapshot.revision, batch).await {
                Ok(revision) => {
                    debug!(%revision, events = events.len(), "commit applied");
                    return Ok((state, events));
                }
                Err(StoreError::RevisionConflict { expected, actual }) => {
                    attempt += 1;
                    warn!(%expected, %actual, attempt, "capacity race lost, re-reading snapshot");
                    if attempt > self.retry_limit {
                        return Err(CheckinError::Store(StoreError::RevisionConflict {
                            expected,
                            actual,
                        }));
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Execute effect descriptions, feeding produced actions back into the
    /// reducer until the queue drains.
    async fn run_effects(
        &self,
        state: &mut CheckinState,
        effects: SmallVec<[Effect<RegistrationAction>; 4]>,
    ) {
        let mut queue: Vec<Effect<RegistrationAction>> = effects.into_iter().rev().collect();
        while let Some(effect) = queue.pop() {
            match effect {
                Effect::None => {}
                Effect::Parallel(inner) | Effect::Sequential(inner) => {
                    queue.extend(inner.into_iter().rev());
                }
                Effect::Future(future) => {
                    if let Some(action) = future.await {
                        let next = self.reducer.reduce(state, action, &self.env);
                        queue.extend(next.into_iter().rev());
                    }
                }
            }
        }
    }

    /// Translate journaled events into the document writes of one batch.
    ///
    /// Every touched record is written in its post-command form, so a batch
    /// is always a set of full upserts plus explicit deletes.
    fn batch_from_events(events: &[RegistrationEvent], state: &CheckinState) -> WriteBatch {
        let mut ops = Vec::new();
        let mut touched_registrations: Vec<RegistrationId> = Vec::new();
        let mut touched_programs: Vec<ProgramId> = Vec::new();
        let mut seen_registrations = HashSet::new();
        let mut seen_programs = HashSet::new();

        for event in events {
            match event {
                RegistrationEvent::RegistrationSubmitted { registration } => {
                    if seen_registrations.insert(registration.id) {
                        touched_registrations.push(registration.id);
                    }
                }
                RegistrationEvent::RegistrationAssigned {
                    registration_id, ..
                }
                | RegistrationEvent::RegistrationCompleted {
                    registration_id, ..
                }
                | RegistrationEvent::RegistrationCancelled {
                    registration_id, ..
                }
                | RegistrationEvent::RegistrationReopened {
                    registration_id, ..
                }
                | RegistrationEvent::PreferencesChanged {
                    registration_id, ..
                } => {
                    if seen_registrations.insert(*registration_id) {
                        touched_registrations.push(*registration_id);
                    }
                }
                RegistrationEvent::RegistrationDeleted { registration_id } => {
                    ops.push(WriteOp::DeleteRegistration(*registration_id));
                }
                RegistrationEvent::ProgramUpserted { program } => {
                    if seen_programs.insert(program.id) {
                        touched_programs.push(program.id);
                    }
                }
                RegistrationEvent::ProgramCapacitySet { program_id, .. }
                | RegistrationEvent::ProgramActiveSet { program_id, .. } => {
                    if seen_programs.insert(*program_id) {
                        touched_programs.push(*program_id);
                    }
                }
            }
        }

        for id in touched_registrations {
            if let Some(registration) = state.registration(&id) {
                ops.push(WriteOp::PutRegistration(registration.clone()));
            }
        }
        for id in touched_programs {
            if let Some(program) = state.program(&id) {
                ops.push(WriteOp::PutProgram(program.clone()));
            }
        }

        WriteBatch::new(ops)
    }

    // ========================================================================
    // Outcome derivation
    // ========================================================================

    fn submitted_id(events: &[RegistrationEvent]) -> Option<RegistrationId> {
        events.iter().find_map(|event| match event {
            RegistrationEvent::RegistrationSubmitted { registration } => Some(registration.id),
            _ => None,
        })
    }

    fn submission_outcome(
        state: &CheckinState,
        events: &[RegistrationEvent],
    ) -> Result<AssignmentOutcome, CheckinError> {
        let registration_id = Self::submitted_id(events).ok_or_else(|| {
            CheckinError::Store(StoreError::Unavailable(
                "submission produced no registration record".to_string(),
            ))
        })?;
        let Some(registration) = state.registration(&registration_id) else {
            return Err(CheckinError::RegistrationNotFound(registration_id));
        };
        Ok(Self::outcome_for(registration))
    }

    fn edit_outcome(
        state: &CheckinState,
        registration_id: RegistrationId,
    ) -> Result<AssignmentOutcome, CheckinError> {
        let Some(registration) = state.registration(&registration_id) else {
            return Err(CheckinError::RegistrationNotFound(registration_id));
        };
        Ok(Self::outcome_for(registration))
    }

    fn outcome_for(registration: &Registration) -> AssignmentOutcome {
        match (registration.status, registration.assigned_program_id) {
            (RegistrationStatus::Assigned | RegistrationStatus::Completed, Some(program_id)) => {
                AssignmentOutcome::Assigned {
                    registration_id: registration.id,
                    program_id,
                }
            }
            (RegistrationStatus::Completed, None) => AssignmentOutcome::BriefingOnly {
                registration_id: registration.id,
            },
            _ => AssignmentOutcome::Waiting {
                registration_id: registration.id,
            },
        }
    }
}
