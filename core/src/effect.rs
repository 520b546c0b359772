//! Side effect descriptions.
//!
//! Effects describe side effects to be performed by the imperative shell.
//! They are values (not execution) and are composable: a reducer returns
//! effect descriptions, the shell executes them and feeds any resulting
//! actions back into the reducer.

use std::future::Future;
use std::pin::Pin;

/// Effect type - describes a side effect to be executed.
///
/// Effects are NOT executed immediately. They are descriptions of what should
/// happen, returned from reducers and executed by the service runtime.
///
/// # Type Parameters
///
/// - `Action`: The action type that effects can produce (feedback loop)
pub enum Effect<Action> {
    /// No-op effect
    None,

    /// Run effects in parallel
    Parallel(Vec<Effect<Action>>),

    /// Run effects sequentially
    Sequential(Vec<Effect<Action>>),

    /// Arbitrary async computation.
    ///
    /// Returns `Option<Action>` - if Some, the action is fed back into the
    /// reducer.
    Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
}

// Manual Debug implementation since Future doesn't implement Debug
impl<Action> std::fmt::Debug for Effect<Action>
where
    Action: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::None => write!(f, "Effect::None"),
            Effect::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Effect::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            }
            Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
        }
    }
}

impl<Action> Effect<Action> {
    /// Combine effects to run in parallel
    #[must_use]
    pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Parallel(effects)
    }

    /// Chain effects to run sequentially
    #[must_use]
    pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
        Effect::Sequential(effects)
    }

    /// Wrap an async computation as an effect
    pub fn future<F>(future: F) -> Effect<Action>
    where
        F: Future<Output = Option<Action>> + Send + 'static,
    {
        Effect::Future(Box::pin(future))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_formats_without_executing() {
        let effect: Effect<u32> = Effect::future(async { Some(1) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");

        let none: Effect<u32> = Effect::None;
        assert_eq!(format!("{none:?}"), "Effect::None");
    }

    #[test]
    fn chain_and_merge_wrap_their_effects() {
        let chained: Effect<u32> = Effect::chain(vec![Effect::None, Effect::None]);
        assert!(matches!(chained, Effect::Sequential(ref inner) if inner.len() == 2));

        let merged: Effect<u32> = Effect::merge(vec![Effect::None]);
        assert!(matches!(merged, Effect::Parallel(ref inner) if inner.len() == 1));
    }
}
