//! # Checkin Core
//!
//! Core traits and types for the checkin kiosk architecture.
//!
//! This crate provides the fundamental abstractions for building the
//! event-driven check-in backend using the Reducer pattern:
//!
//! - **State**: Domain state for a feature
//! - **Action**: All possible inputs to a reducer (commands and events)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O)
//! - Dependency Injection via Environment
//!
//! ## Example
//!
//! ```ignore
//! use checkin_core::*;
//!
//! impl Reducer for RegistrationReducer {
//!     type State = CheckinState;
//!     type Action = RegistrationAction;
//!     type Environment = RegistrationEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CheckinState,
//!         action: RegistrationAction,
//!         env: &RegistrationEnvironment,
//!     ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
//!         // Business logic goes here
//!         SmallVec::new()
//!     }
//! }
//! ```

pub mod effect;
pub mod environment;
pub mod reducer;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};
