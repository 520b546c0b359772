//! Configuration management for the check-in application.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

use crate::types::ResolvePolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of ranked preferences per registration
    pub max_preferences: usize,
    /// How many times a lost capacity race is retried before the registrant
    /// is deferred to the waitlist
    pub assign_retry_limit: u32,
    /// Default priority policy for waitlist resolution
    pub default_policy: ResolvePolicy,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_preferences: env::var("CHECKIN_MAX_PREFERENCES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            assign_retry_limit: env::var("CHECKIN_ASSIGN_RETRY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            default_policy: ResolvePolicy {
                prioritize_reserved: env::var("CHECKIN_PRIORITIZE_RESERVED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                prioritize_grade: env::var("CHECKIN_PRIORITIZE_GRADE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "checkin_kiosk=info".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_preferences: 3,
            assign_retry_limit: 5,
            default_policy: ResolvePolicy {
                prioritize_reserved: true,
                prioritize_grade: true,
            },
            log_level: "checkin_kiosk=info".to_string(),
        }
    }
}
