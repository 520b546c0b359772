//! Duplicate registration guard.
//!
//! Checked before a new registration record is created. A hit is surfaced to
//! the caller for manual resolution ("already checked in"); the caller must
//! not retry automatically.

use crate::types::{AttendeeKey, Registration};

/// Find the active registration (waiting, assigned, or completed - not
/// cancelled) held under the given attendee key, if any.
pub fn active_registration_for<'a, I>(
    registrations: I,
    attendee_key: &AttendeeKey,
) -> Option<&'a Registration>
where
    I: IntoIterator<Item = &'a Registration>,
{
    registrations
        .into_iter()
        .find(|r| r.status.is_active() && r.attendee_key == *attendee_key)
}

/// Whether the attendee key already holds an active registration.
pub fn is_duplicate<'a, I>(registrations: I, attendee_key: &AttendeeKey) -> bool
where
    I: IntoIterator<Item = &'a Registration>,
{
    active_registration_for(registrations, attendee_key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Participation, PriorityClass, RegistrationId, RegistrationStatus};
    use chrono::Utc;

    fn registration(key: &AttendeeKey, status: RegistrationStatus) -> Registration {
        let mut r = Registration::new(
            RegistrationId::new(),
            key.clone(),
            vec![],
            Participation::Programs,
            PriorityClass::Reserved,
            0,
            Utc::now(),
        );
        r.status = status;
        r
    }

    #[test]
    fn waiting_assigned_and_completed_block_resubmission() {
        let key = AttendeeKey::new("Yamada Taro", "やまだ たろう");
        for status in [
            RegistrationStatus::Waiting,
            RegistrationStatus::Assigned,
            RegistrationStatus::Completed,
        ] {
            let existing = registration(&key, status);
            assert!(is_duplicate([&existing], &key), "{status} should block");
        }
    }

    #[test]
    fn cancelled_registrations_do_not_block() {
        let key = AttendeeKey::new("Yamada Taro", "やまだ たろう");
        let cancelled = registration(&key, RegistrationStatus::Cancelled);
        assert!(!is_duplicate([&cancelled], &key));
    }

    #[test]
    fn other_attendees_do_not_block() {
        let key = AttendeeKey::new("Yamada Taro", "やまだ たろう");
        let other = registration(
            &AttendeeKey::new("Sato Ren", "さとう れん"),
            RegistrationStatus::Waiting,
        );
        assert!(!is_duplicate([&other], &key));
    }
}
