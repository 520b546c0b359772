//! Aggregates for the check-in system.
//!
//! One aggregate owns the whole registration collection: the program
//! catalog and every registration record move together under a single
//! writer, which is what lets capacity decisions read one consistent
//! snapshot.

pub mod registration;

pub use registration::{RegistrationAction, RegistrationEnvironment, RegistrationReducer};
