//! Registration store abstraction.
//!
//! The core never talks to a concrete database. It consumes this trait,
//! which provides exactly what the capacity guarantee needs: a consistent
//! snapshot read, and an atomic compare-and-write commit guarded by the
//! snapshot's revision. A commit whose expected revision is stale fails with
//! [`StoreError::RevisionConflict`] - the caller re-reads and re-decides
//! (the `CapacityRaceLost` path).
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn RegistrationStore>`).

mod memory;

pub use memory::InMemoryRegistrationStore;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::types::{Program, Registration, RegistrationId};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Monotonic revision of the whole registration collection.
///
/// Every committed batch advances it by one; a commit carries the revision
/// its decision was based on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    /// Creates a `Revision` from a raw counter value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The revision after one more commit
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the collection changed between the
    /// snapshot read and the commit. The caller must re-read and re-decide.
    #[error("revision conflict: expected {expected}, found {actual}")]
    RevisionConflict {
        /// The revision the decision was based on
        expected: Revision,
        /// The collection's actual revision
        actual: Revision,
    },

    /// The store cannot be reached; the core reports a transient failure
    /// and applies nothing.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A single document write within a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Insert or replace a registration record
    PutRegistration(Registration),
    /// Destroy a registration record
    DeleteRegistration(RegistrationId),
    /// Insert or replace a program record
    PutProgram(Program),
}

/// An atomic batch of writes, applied entirely or not at all.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    /// Writes in application order
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates a batch from a list of writes
    #[must_use]
    pub const fn new(ops: Vec<WriteOp>) -> Self {
        Self { ops }
    }

    /// A batch containing one write
    #[must_use]
    pub fn single(op: WriteOp) -> Self {
        Self { ops: vec![op] }
    }

    /// Whether the batch writes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One consistent read of the whole collection.
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    /// Revision this snapshot was taken at
    pub revision: Revision,
    /// The program catalog
    pub programs: Vec<Program>,
    /// All registration records
    pub registrations: Vec<Registration>,
}

/// Shared, externally-synchronized document collection holding programs and
/// registrations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; many kiosk sessions read and
/// write the same collection concurrently.
pub trait RegistrationStore: Send + Sync {
    /// Read a consistent snapshot of programs and registrations together
    /// with the revision it was taken at.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`]: the store cannot be reached
    fn load_snapshot(&self) -> StoreFuture<'_, StoreSnapshot>;

    /// Atomically apply a batch of writes, provided the collection is still
    /// at `expected` revision.
    ///
    /// Returns the new revision on success. The batch is applied entirely
    /// or not at all; a partial assignment can never be observed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::RevisionConflict`]: the collection moved on; re-read
    ///   and re-decide
    /// - [`StoreError::Unavailable`]: the store cannot be reached
    fn commit(&self, expected: Revision, batch: WriteBatch) -> StoreFuture<'_, Revision>;
}
