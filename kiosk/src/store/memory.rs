//! In-memory registration store.
//!
//! Backs tests and the demo binary. Honors the same contract a production
//! implementation must: snapshot reads and revision-checked atomic batches.
//! Tests can flip availability off to exercise the transient-failure path,
//! and can commit directly to simulate a concurrent kiosk session racing
//! the service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::types::{Program, ProgramId, Registration, RegistrationId};

use super::{
    RegistrationStore, Revision, StoreError, StoreFuture, StoreSnapshot, WriteBatch, WriteOp,
};

#[derive(Debug, Default)]
struct Collections {
    revision: Revision,
    programs: HashMap<ProgramId, Program>,
    registrations: HashMap<RegistrationId, Registration>,
}

/// Shared in-memory document collection.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationStore {
    inner: RwLock<Collections>,
    available: AtomicBool,
}

impl InMemoryRegistrationStore {
    /// Creates an empty, available store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collections::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; while unavailable every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl RegistrationStore for InMemoryRegistrationStore {
    fn load_snapshot(&self) -> StoreFuture<'_, StoreSnapshot> {
        Box::pin(async move {
            self.check_available()?;
            let inner = self.inner.read().await;
            Ok(StoreSnapshot {
                revision: inner.revision,
                programs: inner.programs.values().cloned().collect(),
                registrations: inner.registrations.values().cloned().collect(),
            })
        })
    }

    fn commit(&self, expected: Revision, batch: WriteBatch) -> StoreFuture<'_, Revision> {
        Box::pin(async move {
            self.check_available()?;
            let mut inner = self.inner.write().await;
            if inner.revision != expected {
                return Err(StoreError::RevisionConflict {
                    expected,
                    actual: inner.revision,
                });
            }

            for op in batch.ops {
                match op {
                    WriteOp::PutRegistration(registration) => {
                        inner.registrations.insert(registration.id, registration);
                    }
                    WriteOp::DeleteRegistration(id) => {
                        inner.registrations.remove(&id);
                    }
                    WriteOp::PutProgram(program) => {
                        inner.programs.insert(program.id, program);
                    }
                }
            }

            inner.revision = inner.revision.next();
            Ok(inner.revision)
        })
    }
}
