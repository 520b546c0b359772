//! Program registry and enrollment tracking.
//!
//! Enrollment is never stored as an independent counter. It is derived here,
//! per decision, from a single consistent snapshot of the committed
//! registration set - the count of records occupying a seat in each program.
//! Recomputing from committed state is what eliminates drift between the
//! counter and reality, and what makes an interrupted resolver sweep
//! naturally resumable.

use std::collections::HashMap;

use crate::types::{Capacity, CheckinState, Program, ProgramId, ProgramStatus, Registration};

/// A consistent read of capacity and enrollment for every program.
///
/// Built once per decision from `(programs, registrations)`. The waitlist
/// resolver additionally advances it between assignments in the same sweep
/// via [`EnrollmentSnapshot::record_assignment`], so capacity consumed by an
/// earlier registrant is visible to later ones.
#[derive(Clone, Debug, Default)]
pub struct EnrollmentSnapshot {
    programs: HashMap<ProgramId, ProgramSeats>,
}

#[derive(Clone, Copy, Debug)]
struct ProgramSeats {
    capacity: u32,
    enrollment: u32,
    is_active: bool,
}

impl EnrollmentSnapshot {
    /// Derive a snapshot from a program catalog and registration set.
    pub fn build<'a, P, R>(programs: P, registrations: R) -> Self
    where
        P: IntoIterator<Item = &'a Program>,
        R: IntoIterator<Item = &'a Registration>,
    {
        let mut seats: HashMap<ProgramId, ProgramSeats> = programs
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    ProgramSeats {
                        capacity: p.capacity.value(),
                        enrollment: 0,
                        is_active: p.is_active,
                    },
                )
            })
            .collect();

        for registration in registrations {
            if let Some(program_id) = registration.assigned_program_id {
                if registration.occupies(program_id) {
                    if let Some(entry) = seats.get_mut(&program_id) {
                        entry.enrollment += 1;
                    }
                }
            }
        }

        Self { programs: seats }
    }

    /// Derive a snapshot from aggregate state.
    #[must_use]
    pub fn from_state(state: &CheckinState) -> Self {
        Self::build(state.programs(), state.registrations())
    }

    /// Whether the program exists in the catalog
    #[must_use]
    pub fn is_known(&self, program_id: ProgramId) -> bool {
        self.programs.contains_key(&program_id)
    }

    /// Whether the program exists and is open for selection
    #[must_use]
    pub fn is_active(&self, program_id: ProgramId) -> bool {
        self.programs.get(&program_id).is_some_and(|p| p.is_active)
    }

    /// Configured capacity, or `None` for an unknown program
    #[must_use]
    pub fn capacity_of(&self, program_id: ProgramId) -> Option<u32> {
        self.programs.get(&program_id).map(|p| p.capacity)
    }

    /// Derived enrollment; zero for an unknown program
    #[must_use]
    pub fn enrollment_of(&self, program_id: ProgramId) -> u32 {
        self.programs
            .get(&program_id)
            .map_or(0, |p| p.enrollment)
    }

    /// Whether enrollment has reached capacity
    #[must_use]
    pub fn is_full(&self, program_id: ProgramId) -> bool {
        self.programs
            .get(&program_id)
            .is_none_or(|p| p.enrollment >= p.capacity)
    }

    /// Free seats left; zero for an unknown or over-full program
    #[must_use]
    pub fn remaining(&self, program_id: ProgramId) -> u32 {
        self.programs
            .get(&program_id)
            .map_or(0, |p| p.capacity.saturating_sub(p.enrollment))
    }

    /// Whether the program can accept one more assignment right now:
    /// known, active, and under capacity.
    #[must_use]
    pub fn has_room(&self, program_id: ProgramId) -> bool {
        self.programs
            .get(&program_id)
            .is_some_and(|p| p.is_active && p.enrollment < p.capacity)
    }

    /// Advance the running snapshot after a successful assignment in the
    /// same sweep.
    pub fn record_assignment(&mut self, program_id: ProgramId) {
        if let Some(entry) = self.programs.get_mut(&program_id) {
            entry.enrollment += 1;
        }
    }
}

/// Build the administrator status view: one row per program, sorted by the
/// catalog's display order.
#[must_use]
pub fn status_rows(state: &CheckinState) -> Vec<ProgramStatus> {
    let snapshot = EnrollmentSnapshot::from_state(state);
    let mut rows: Vec<(i32, ProgramStatus)> = state
        .programs()
        .map(|program| {
            (
                program.order,
                ProgramStatus {
                    program_id: program.id,
                    title: program.title.clone(),
                    capacity: Capacity::new(
                        snapshot.capacity_of(program.id).unwrap_or_default(),
                    ),
                    enrollment: snapshot.enrollment_of(program.id),
                    is_active: program.is_active,
                },
            )
        })
        .collect();
    rows.sort_by_key(|(order, row)| (*order, row.program_id));
    rows.into_iter().map(|(_, row)| row).collect()
}
