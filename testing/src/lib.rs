//! # Checkin Testing
//!
//! Testing utilities and helpers for the checkin kiosk architecture.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (`FixedClock`,
//!   `SequentialIdGenerator`)
//! - The [`ReducerTest`] Given-When-Then harness for reducer tests
//!
//! ## Example
//!
//! ```ignore
//! use checkin_testing::{ReducerTest, mocks::test_clock};
//!
//! ReducerTest::new(RegistrationReducer::new())
//!     .with_env(test_environment())
//!     .given_state(CheckinState::new())
//!     .when_action(RegistrationAction::Submit { .. })
//!     .then_state(|state| assert_eq!(state.registration_count(), 1))
//!     .run();
//! ```


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations for testing.
pub mod mocks {
    use checkin_core::environment::{Clock, IdGenerator};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use checkin_testing::mocks::FixedClock;
    /// use checkin_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Id generator producing a predictable sequence.
    ///
    /// Each call to `next()` yields a UUID whose low 64 bits encode an
    /// incrementing counter, so test assertions can rely on stable ids.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        counter: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator starting at zero
        #[must_use]
        pub fn new() -> Self {
            Self {
                counter: AtomicU64::new(0),
            }
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next(&self) -> Uuid {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            Uuid::from_u64_pair(0, n + 1)
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
