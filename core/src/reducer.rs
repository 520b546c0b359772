//! The core trait for business logic.
//!
//! Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
//! They contain all business logic and are deterministic and testable: the
//! same state and action always produce the same state mutation and the same
//! effect descriptions.

use crate::effect::Effect;
use smallvec::SmallVec;

/// The Reducer trait - core abstraction for business logic.
///
/// # Type Parameters
///
/// - `State`: The domain state this reducer operates on
/// - `Action`: The action type this reducer processes
/// - `Environment`: The injected dependencies this reducer needs
///
/// # Example
///
/// ```ignore
/// impl Reducer for RegistrationReducer {
///     type State = CheckinState;
///     type Action = RegistrationAction;
///     type Environment = RegistrationEnvironment;
///
///     fn reduce(
///         &self,
///         state: &mut CheckinState,
///         action: RegistrationAction,
///         env: &RegistrationEnvironment,
///     ) -> SmallVec<[Effect<RegistrationAction>; 4]> {
///         match action {
///             RegistrationAction::Submit { .. } => {
///                 // Validate, apply, describe persistence effects
///                 SmallVec::new()
///             }
///             _ => SmallVec::new(),
///         }
///     }
/// }
/// ```
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce an action into state changes and effects.
    ///
    /// This is a pure function that:
    /// 1. Validates the action
    /// 2. Updates state in place
    /// 3. Returns effect descriptions to be executed
    ///
    /// Most actions produce at most a handful of effects, so the return type
    /// is a `SmallVec` that stays on the stack in the common case.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]>;
}
