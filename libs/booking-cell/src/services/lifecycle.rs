// libs/booking-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{BookingError, MeetingStatus};

/// State machine governing Meeting.status. Draft → Proposed → Booked, with
/// Booked → Rescheduled; any non-terminal state can be cancelled, and any
/// live state can fail on unrecoverable error.
pub struct MeetingLifecycleService;

impl MeetingLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current: MeetingStatus,
        next: MeetingStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition {} -> {}", current, next);

        if current.is_terminal() {
            warn!("Meeting is already {} and cannot change state", current);
            return Err(BookingError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        if !self.get_valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(BookingError::InvalidStatusTransition {
                from: current,
                to: next,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current: MeetingStatus) -> Vec<MeetingStatus> {
        match current {
            MeetingStatus::Draft => vec![
                MeetingStatus::Proposed,
                MeetingStatus::Cancelled,
                MeetingStatus::Failed,
            ],
            MeetingStatus::Proposed => vec![
                MeetingStatus::Booked,
                MeetingStatus::Cancelled,
                MeetingStatus::Failed,
            ],
            MeetingStatus::Booked => vec![
                MeetingStatus::Rescheduled,
                MeetingStatus::Cancelled,
                MeetingStatus::Failed,
            ],
            // A rescheduled meeting re-enters the flow with fresh slots.
            MeetingStatus::Rescheduled => vec![
                MeetingStatus::Proposed,
                MeetingStatus::Booked,
                MeetingStatus::Cancelled,
                MeetingStatus::Failed,
            ],
            // Terminal states
            MeetingStatus::Cancelled => vec![],
            MeetingStatus::Failed => vec![],
        }
    }
}

impl Default for MeetingLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
