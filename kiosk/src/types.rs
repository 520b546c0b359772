//! Domain types for the check-in kiosk core.
//!
//! This module contains all value objects, entities, and state types for the
//! registration system: the program catalog, registration records with ranked
//! preferences, the priority classification used by the waitlist resolver,
//! and the aggregate state the reducer operates on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::RejectionReason;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a program (a capacity-limited session).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramId(Uuid);

impl ProgramId {
    /// Creates a new random `ProgramId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ProgramId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProgramId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a registration record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    /// Creates a new random `RegistrationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RegistrationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Attendee Key
// ============================================================================

/// Normalized name/furigana composite identifying one attendee.
///
/// Two submissions by the same person must produce the same key regardless of
/// surrounding whitespace or letter case, so the key is built through
/// [`AttendeeKey::new`] which normalizes both parts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttendeeKey(String);

impl AttendeeKey {
    /// Build a key from an attendee's name and furigana (reading).
    ///
    /// Both parts are trimmed, inner whitespace is collapsed to single
    /// spaces, and the result is lowercased before being joined.
    #[must_use]
    pub fn new(name: &str, furigana: &str) -> Self {
        let normalize = |s: &str| {
            s.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        };
        Self(format!("{}|{}", normalize(name), normalize(furigana)))
    }

    /// Reconstruct a key from its stored composite form.
    #[must_use]
    pub const fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    /// The composite key as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttendeeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Capacity
// ============================================================================

/// Represents the seat capacity of a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(pub u32);

impl Capacity {
    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Priority Classification
// ============================================================================

/// School grade tier of a walk-in registrant.
///
/// The waitlist resolver orders the senior-most grade first, then younger
/// grades, then `Other` (guardians, siblings, external visitors).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeTier {
    /// Third-year students (senior-most)
    Grade3,
    /// Second-year students
    Grade2,
    /// First-year students
    Grade1,
    /// Everyone without a grade affiliation
    Other,
}

impl GradeTier {
    /// Sweep-ordering rank: lower ranks are processed first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Grade3 => 0,
            Self::Grade2 => 1,
            Self::Grade1 => 2,
            Self::Other => 3,
        }
    }
}

/// Reserved-vs-walk-in classification of a registrant.
///
/// The priority class never affects real-time assignment at submission; it
/// orders only the waitlist resolver's sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityClass {
    /// The registrant arrived with a prior reservation
    Reserved,
    /// The registrant walked up without a reservation
    WalkIn {
        /// Grade tier used for sub-ordering within the walk-in tier
        grade: GradeTier,
    },
}

impl PriorityClass {
    /// Whether this registrant holds a prior reservation
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// Whether a registrant takes part in programs at all.
///
/// This is the explicit flag distinguishing "no feasible program yet" from
/// "deliberately opted out of programs" - it is never inferred from an empty
/// preference list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Participation {
    /// Attends a program; preferences drive the assignment engine
    Programs,
    /// Attends the briefing only; bypasses assignment entirely
    BriefingOnly,
}

// ============================================================================
// Domain Entities
// ============================================================================

/// A capacity-limited session attendees can be assigned to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Unique program identifier
    pub id: ProgramId,
    /// Display title
    pub title: String,
    /// Maximum number of confirmed registrants
    pub capacity: Capacity,
    /// Display ordering in admin and status views
    pub order: i32,
    /// Inactive programs are hidden from selection and never assigned
    pub is_active: bool,
}

impl Program {
    /// Creates a new active `Program`
    #[must_use]
    pub const fn new(id: ProgramId, title: String, capacity: Capacity, order: i32) -> Self {
        Self {
            id,
            title,
            capacity,
            order,
            is_active: true,
        }
    }
}

/// Lifecycle status of a registration record.
///
/// Transitions are owned exclusively by the [`crate::lifecycle`] module:
/// `Waiting → Assigned → Completed`, `Waiting → Completed` for the
/// briefing-only path, `Assigned → Waiting` as an administrator action, and
/// any state `→ Cancelled`. `Cancelled` has no outgoing transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Submitted, no confirmed program seat yet
    Waiting,
    /// Holds a confirmed seat in `assigned_program_id`
    Assigned,
    /// Physically checked in by staff
    Completed,
    /// Withdrawn by an administrator
    Cancelled,
}

impl RegistrationStatus {
    /// Active statuses block a second registration under the same key.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Waiting | Self::Assigned | Self::Completed)
    }

    /// Statuses counted towards a program's enrollment.
    #[must_use]
    pub const fn occupies_seat(self) -> bool {
        matches!(self, Self::Assigned | Self::Completed)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "waiting",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// One attendee's registration record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Unique registration identifier
    pub id: RegistrationId,
    /// Deduplication key for the attendee
    pub attendee_key: AttendeeKey,
    /// Ranked program preferences, highest rank first (no duplicates)
    pub preferences: Vec<ProgramId>,
    /// Program participation flag
    pub participation: Participation,
    /// Reserved/walk-in classification for waitlist ordering
    pub priority: PriorityClass,
    /// Current lifecycle status
    pub status: RegistrationStatus,
    /// Confirmed program seat; non-null only in `Assigned`/`Completed`
    pub assigned_program_id: Option<ProgramId>,
    /// Submission order, strictly increasing across the registration set
    pub sequence: u64,
    /// When the registration was submitted
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Creates a new `Registration` in the `Waiting` state
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: RegistrationId,
        attendee_key: AttendeeKey,
        preferences: Vec<ProgramId>,
        participation: Participation,
        priority: PriorityClass,
        sequence: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            attendee_key,
            preferences,
            participation,
            priority,
            status: RegistrationStatus::Waiting,
            assigned_program_id: None,
            sequence,
            created_at,
            updated_at: created_at,
        }
    }

    /// Whether this record currently occupies a seat in the given program
    #[must_use]
    pub fn occupies(&self, program_id: ProgramId) -> bool {
        self.status.occupies_seat() && self.assigned_program_id == Some(program_id)
    }

    /// Whether the resolver should consider this record in a sweep
    #[must_use]
    pub fn is_waiting_for_assignment(&self) -> bool {
        self.status == RegistrationStatus::Waiting
            && self.participation == Participation::Programs
            && !self.preferences.is_empty()
    }
}

// ============================================================================
// Resolver Inputs / Outputs
// ============================================================================

/// Priority policy for a waitlist resolution sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePolicy {
    /// Process reserved-origin registrants as a tier ahead of walk-ins
    pub prioritize_reserved: bool,
    /// Sub-order the walk-in tier by grade rank (senior-most first)
    pub prioritize_grade: bool,
}

/// Outcome of one full waitlist resolution sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Registrants assigned a seat during the sweep
    pub assigned_count: usize,
    /// Registrants still waiting after the sweep
    pub still_waiting_count: usize,
}

/// Result of a submission or edit, as seen by the surrounding UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOutcome {
    /// A seat was confirmed in one of the ranked preferences
    Assigned {
        /// The registration that received the seat
        registration_id: RegistrationId,
        /// The confirmed program
        program_id: ProgramId,
    },
    /// No preference was feasible (or none were given yet); the registrant
    /// stays on the waitlist
    Waiting {
        /// The waiting registration
        registration_id: RegistrationId,
    },
    /// The capacity race was lost repeatedly; the registrant was placed on
    /// the waitlist instead of receiving the contested seat
    AssignedToWaiting {
        /// The waiting registration
        registration_id: RegistrationId,
    },
    /// The registrant opted out of programs and was checked straight through
    BriefingOnly {
        /// The completed registration
        registration_id: RegistrationId,
    },
}

impl AssignmentOutcome {
    /// The registration this outcome refers to
    #[must_use]
    pub const fn registration_id(&self) -> RegistrationId {
        match self {
            Self::Assigned {
                registration_id, ..
            }
            | Self::Waiting { registration_id }
            | Self::AssignedToWaiting { registration_id }
            | Self::BriefingOnly { registration_id } => *registration_id,
        }
    }
}

/// One row of the administrator status view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStatus {
    /// The program
    pub program_id: ProgramId,
    /// Display title
    pub title: String,
    /// Configured capacity
    pub capacity: Capacity,
    /// Derived enrollment (assigned + completed records)
    pub enrollment: u32,
    /// Whether the program accepts further assignments
    pub is_active: bool,
}

// ============================================================================
// Domain Events
// ============================================================================

/// Facts recorded by the registration reducer.
///
/// Events are applied to [`CheckinState`] and journaled for the service
/// shell, which translates them into store writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RegistrationEvent {
    /// A registration record was created
    RegistrationSubmitted {
        /// The full record as created (status `Waiting`)
        registration: Registration,
    },
    /// A seat was confirmed
    RegistrationAssigned {
        /// The registration that received the seat
        registration_id: RegistrationId,
        /// The confirmed program
        program_id: ProgramId,
        /// When the seat was confirmed
        assigned_at: DateTime<Utc>,
    },
    /// Staff processed the physical check-in
    RegistrationCompleted {
        /// The completed registration
        registration_id: RegistrationId,
        /// When check-in happened
        completed_at: DateTime<Utc>,
    },
    /// An administrator withdrew the registration
    RegistrationCancelled {
        /// The cancelled registration
        registration_id: RegistrationId,
        /// When it was cancelled
        cancelled_at: DateTime<Utc>,
    },
    /// An administrator sent an assigned registration back to the waitlist
    RegistrationReopened {
        /// The reopened registration
        registration_id: RegistrationId,
        /// When it was reopened
        reopened_at: DateTime<Utc>,
    },
    /// An administrator replaced the ranked preferences
    PreferencesChanged {
        /// The edited registration
        registration_id: RegistrationId,
        /// The new ranked preferences
        preferences: Vec<ProgramId>,
        /// When the edit happened
        changed_at: DateTime<Utc>,
    },
    /// An administrator destroyed the record
    RegistrationDeleted {
        /// The deleted registration
        registration_id: RegistrationId,
    },
    /// A program was created or replaced in the catalog
    ProgramUpserted {
        /// The full program record
        program: Program,
    },
    /// A program's capacity was changed
    ProgramCapacitySet {
        /// The edited program
        program_id: ProgramId,
        /// The new capacity
        capacity: Capacity,
    },
    /// A program was activated or deactivated
    ProgramActiveSet {
        /// The edited program
        program_id: ProgramId,
        /// The new active flag
        is_active: bool,
    },
}

// ============================================================================
// Aggregate State
// ============================================================================

/// State for the registration aggregate.
///
/// Holds the program catalog and the full registration set. Enrollment is
/// never stored here; it is derived per decision by
/// [`crate::registry::EnrollmentSnapshot`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckinState {
    /// Program catalog indexed by id
    programs: HashMap<ProgramId, Program>,
    /// All registration records indexed by id
    registrations: HashMap<RegistrationId, Registration>,
    /// Next submission sequence number
    next_sequence: u64,
    /// Events emitted by the last command, drained by the service shell
    #[serde(skip)]
    journal: Vec<RegistrationEvent>,
    /// Rejection recorded by the last command, drained by the service shell
    #[serde(skip)]
    last_rejection: Option<RejectionReason>,
}

impl CheckinState {
    /// Creates a new empty `CheckinState`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from a store snapshot's contents.
    #[must_use]
    pub fn from_records(programs: Vec<Program>, registrations: Vec<Registration>) -> Self {
        let next_sequence = registrations
            .iter()
            .map(|r| r.sequence + 1)
            .max()
            .unwrap_or(0);
        Self {
            programs: programs.into_iter().map(|p| (p.id, p)).collect(),
            registrations: registrations.into_iter().map(|r| (r.id, r)).collect(),
            next_sequence,
            journal: Vec::new(),
            last_rejection: None,
        }
    }

    /// Gets a program by id
    #[must_use]
    pub fn program(&self, id: &ProgramId) -> Option<&Program> {
        self.programs.get(id)
    }

    /// Mutable access to a program (reducer internal)
    pub(crate) fn program_mut(&mut self, id: &ProgramId) -> Option<&mut Program> {
        self.programs.get_mut(id)
    }

    /// Insert or replace a program (reducer internal)
    pub(crate) fn put_program(&mut self, program: Program) {
        self.programs.insert(program.id, program);
    }

    /// Iterate over the program catalog
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    /// Gets a registration by id
    #[must_use]
    pub fn registration(&self, id: &RegistrationId) -> Option<&Registration> {
        self.registrations.get(id)
    }

    /// Mutable access to a registration (reducer internal)
    pub(crate) fn registration_mut(&mut self, id: &RegistrationId) -> Option<&mut Registration> {
        self.registrations.get_mut(id)
    }

    /// Insert a registration, advancing the sequence cursor (reducer internal)
    pub(crate) fn put_registration(&mut self, registration: Registration) {
        self.next_sequence = self.next_sequence.max(registration.sequence + 1);
        self.registrations.insert(registration.id, registration);
    }

    /// Remove a registration (reducer internal)
    pub(crate) fn remove_registration(&mut self, id: &RegistrationId) -> Option<Registration> {
        self.registrations.remove(id)
    }

    /// Iterate over all registration records
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    /// Returns the number of programs
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Returns the number of registrations
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// The sequence number the next submission will receive
    #[must_use]
    pub const fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Record an emitted event for the service shell (reducer internal)
    pub(crate) fn record(&mut self, event: RegistrationEvent) {
        self.journal.push(event);
    }

    /// Drain the journal of events emitted by the last command
    #[must_use]
    pub fn take_journal(&mut self) -> Vec<RegistrationEvent> {
        std::mem::take(&mut self.journal)
    }

    /// Record a command rejection for the service shell (reducer internal)
    pub(crate) fn reject(&mut self, reason: RejectionReason) {
        self.last_rejection = Some(reason);
    }

    /// Drain the rejection recorded by the last command, if any
    #[must_use]
    pub fn take_rejection(&mut self) -> Option<RejectionReason> {
        self.last_rejection.take()
    }
}
