// libs/booking-cell/src/services/booking.rs
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use availability_cell::models::{AvailabilityConstraints, DateRange};
use availability_cell::services::AvailabilityOrchestrator;
use calendar_cell::models::{CalendarConnection, CalendarError, CalendarEventInput};
use calendar_cell::services::{CalendarEventService, ConnectionService};

use crate::models::{
    BookingError, BookingRequestStatus, ConfirmBookingRequest, ConfirmBookingResponse,
    LocationMode, ManageAction, ManageBookingResponse, Meeting, MeetingStatus,
    ProposeSlotsRequest,
};
use crate::services::crm::LawmaticsClient;
use crate::services::lifecycle::MeetingLifecycleService;
use crate::services::meetings::MeetingService;
use crate::services::progress::ProgressLogger;

const CALENDAR_PROVIDER: &str = "google";
const PRIMARY_CALENDAR: &str = "primary";
const TEST_SUMMARY_PREFIX: &str = "[TEST] ";

/// Drives the full booking lifecycle: proposing slots, confirming a slot
/// into a real meeting with calendar and CRM side effects, and handling
/// client-initiated reschedule/cancel through the public token.
///
/// Failure handling is two-tier: precondition failures abort before any
/// write, while side-effect failures after the status commit are caught
/// per step, logged, and surfaced as warnings.
pub struct BookingService {
    meetings: MeetingService,
    lifecycle: MeetingLifecycleService,
    availability: AvailabilityOrchestrator,
    connections: ConnectionService,
    events: CalendarEventService,
    crm: LawmaticsClient,
    supabase: Arc<SupabaseClient>,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            meetings: MeetingService::new(supabase.clone()),
            lifecycle: MeetingLifecycleService::new(),
            availability: AvailabilityOrchestrator::new(config),
            connections: ConnectionService::new(config),
            events: CalendarEventService::new(config),
            crm: LawmaticsClient::new(config),
            supabase,
        }
    }

    /// Attach suggested slots to the meeting and move it to Proposed.
    /// No external side effects.
    pub async fn propose_meeting(
        &self,
        meeting_id: Uuid,
        request: ProposeSlotsRequest,
    ) -> Result<Meeting, BookingError> {
        let meeting = self.meetings.get_meeting(meeting_id).await?;
        self.lifecycle
            .validate_status_transition(meeting.status, MeetingStatus::Proposed)?;

        if request.slots.is_empty() {
            return Err(BookingError::PreconditionFailed(
                "At least one slot must be proposed".to_string(),
            ));
        }

        let mut preferences = match meeting.preferences {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        preferences.insert("proposed_slots".to_string(), json!(request.slots));

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(MeetingStatus::Proposed));
        update.insert("preferences".to_string(), Value::Object(preferences));

        let updated = self.meetings.update_meeting(meeting_id, update).await?;
        info!(
            "Meeting {} proposed with {} slots",
            meeting_id,
            request.slots.len()
        );
        Ok(updated)
    }

    /// Confirm a chosen slot. Precondition checks and the live-calendar
    /// re-validation happen before any write; once the meeting is Booked,
    /// calendar and CRM sync are best-effort and never revert the status.
    pub async fn confirm_booking(
        &self,
        meeting_id: Uuid,
        request: ConfirmBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<ConfirmBookingResponse, BookingError> {
        let meeting = self.meetings.get_meeting(meeting_id).await?;
        self.lifecycle
            .validate_status_transition(meeting.status, MeetingStatus::Booked)?;
        self.validate_slot_shape(&meeting, &request, now)?;

        let progress = ProgressLogger::new(self.supabase.clone(), meeting_id);
        info!(
            "Confirming meeting {} (run {})",
            meeting_id,
            progress.run_id()
        );
        progress
            .info(
                "confirm_start",
                &format!("Confirming slot {} - {}", request.start_time, request.end_time),
            )
            .await;

        let mut warnings = self
            .revalidate_slot(&meeting, &request, now, &progress)
            .await?;

        // Point of no return: from here on, the booking stands and every
        // failure degrades to a warning.
        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(MeetingStatus::Booked));
        update.insert(
            "start_time".to_string(),
            json!(request.start_time.to_rfc3339()),
        );
        update.insert("end_time".to_string(), json!(request.end_time.to_rfc3339()));
        let meeting = self.meetings.update_meeting(meeting_id, update).await?;
        progress.success("status_booked", "Meeting marked as booked").await;

        let mut has_errors = false;

        let calendar_event_id = self
            .create_booking_event(&meeting, &request, &progress, &mut warnings, &mut has_errors)
            .await;

        let crm_appointment_id = self
            .sync_crm(&meeting, &request, &progress, &mut warnings, &mut has_errors)
            .await;

        progress
            .info(
                "confirm_done",
                if has_errors {
                    "Booking confirmed with side-effect failures"
                } else {
                    "Booking confirmed"
                },
            )
            .await;

        Ok(ConfirmBookingResponse {
            success: true,
            warnings,
            has_errors,
            calendar_event_id,
            crm_appointment_id,
        })
    }

    /// Client-facing reschedule/cancel through the public booking token.
    /// The request must be Open and unexpired; anything else fails without
    /// touching the meeting.
    pub async fn manage_booking(
        &self,
        public_token: &str,
        action: ManageAction,
        now: DateTime<Utc>,
    ) -> Result<ManageBookingResponse, BookingError> {
        let booking_request = self.meetings.get_booking_request_by_token(public_token).await?;

        if booking_request.status != BookingRequestStatus::Open {
            return Err(BookingError::PreconditionFailed(format!(
                "Booking request is {}",
                booking_request.status
            )));
        }
        if booking_request.expires_at <= now {
            return Err(BookingError::PreconditionFailed(
                "Booking request has expired".to_string(),
            ));
        }

        let meeting = self.meetings.get_meeting(booking_request.meeting_id).await?;
        let target = match action {
            ManageAction::Cancel => MeetingStatus::Cancelled,
            ManageAction::Reschedule => MeetingStatus::Rescheduled,
        };
        self.lifecycle
            .validate_status_transition(meeting.status, target)?;

        let progress = ProgressLogger::new(self.supabase.clone(), meeting.id);
        info!(
            "Managing booking {} (action {:?}, run {})",
            meeting.id,
            action,
            progress.run_id()
        );
        progress
            .info("manage_start", &format!("Applying action: {:?}", action))
            .await;

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(target));
        if target == MeetingStatus::Rescheduled {
            // A rescheduled meeting re-enters slot selection with no
            // committed time or event.
            update.insert("start_time".to_string(), Value::Null);
            update.insert("end_time".to_string(), Value::Null);
            update.insert("calendar_event_id".to_string(), Value::Null);
        }
        self.meetings.update_meeting(meeting.id, update).await?;

        self.meetings
            .update_booking_request_status(booking_request.id, BookingRequestStatus::Completed)
            .await?;

        // The status change is durable before any provider cleanup runs;
        // a failed removal is a warning, never a reverted transition.
        let mut warnings = Vec::new();
        self.remove_booking_event(&meeting, &progress, &mut warnings)
            .await;

        progress
            .success("manage_done", &format!("Meeting moved to {}", target))
            .await;

        Ok(ManageBookingResponse {
            success: true,
            warnings,
        })
    }

    fn validate_slot_shape(
        &self,
        meeting: &Meeting,
        request: &ConfirmBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if request.end_time <= request.start_time {
            return Err(BookingError::PreconditionFailed(
                "Slot end must be after start".to_string(),
            ));
        }

        let slot_minutes = (request.end_time - request.start_time).num_minutes();
        if slot_minutes != meeting.duration_minutes {
            return Err(BookingError::PreconditionFailed(format!(
                "Slot is {} minutes but the meeting requires {}",
                slot_minutes, meeting.duration_minutes
            )));
        }

        if request.start_time <= now {
            return Err(BookingError::PreconditionFailed(
                "Slot start is in the past".to_string(),
            ));
        }

        Ok(())
    }

    /// Re-check the chosen slot against live calendars over the slot's own
    /// day before committing. Slots can go stale between suggestion and
    /// confirmation; a conflict here is `SlotTaken`, not a warning.
    async fn revalidate_slot(
        &self,
        meeting: &Meeting,
        request: &ConfirmBookingRequest,
        now: DateTime<Utc>,
        progress: &ProgressLogger,
    ) -> Result<Vec<String>, BookingError> {
        let participants = self.participant_ids(meeting);
        if participants.is_empty() {
            progress
                .warn(
                    "revalidate",
                    "No staff participants to re-validate against",
                    None,
                )
                .await;
            return Ok(vec!["No staff calendars were re-validated".to_string()]);
        }

        let tz: chrono_tz::Tz = meeting.timezone.parse().map_err(|_| {
            BookingError::PreconditionFailed(format!(
                "Unknown meeting timezone: {}",
                meeting.timezone
            ))
        })?;
        let slot_day = request.start_time.with_timezone(&tz).date_naive();
        let range = DateRange {
            start: slot_day,
            end: slot_day,
        };
        let constraints = AvailabilityConstraints {
            timezone: meeting.timezone.clone(),
            include_weekends: true,
            minimum_notice_minutes: 0,
            ..AvailabilityConstraints::default()
        };

        let availability = self
            .availability
            .check_availability(
                &participants,
                meeting.room_resource_id.as_deref(),
                range,
                meeting.duration_minutes,
                &constraints,
                now,
            )
            .await
            .map_err(|e| BookingError::Availability(e.to_string()))?;

        if availability
            .busy_intervals
            .iter()
            .any(|busy| busy.overlaps(request.start_time, request.end_time))
        {
            progress
                .error("revalidate", "Chosen slot conflicts with a live calendar", None)
                .await;
            return Err(BookingError::SlotTaken);
        }

        progress
            .success(
                "revalidate",
                &format!(
                    "Slot clear across {} participant calendars",
                    availability.participants_checked
                ),
            )
            .await;
        Ok(availability.warnings)
    }

    async fn create_booking_event(
        &self,
        meeting: &Meeting,
        request: &ConfirmBookingRequest,
        progress: &ProgressLogger,
        warnings: &mut Vec<String>,
        has_errors: &mut bool,
    ) -> Option<String> {
        let connection = match self.host_connection(meeting).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("No host calendar for meeting {}: {}", meeting.id, e);
                warnings.push(format!("Calendar event not created: {}", e));
                *has_errors = true;
                progress
                    .warn("calendar_event", "Host calendar unavailable", None)
                    .await;
                return None;
            }
        };

        let mut attendee_emails: Vec<String> = meeting
            .attendees
            .iter()
            .map(|attendee| attendee.email.clone())
            .collect();
        // Google room resources are invited like attendees.
        if meeting.location == LocationMode::InPerson {
            if let Some(room) = &meeting.room_resource_id {
                attendee_emails.push(room.clone());
            }
        }

        let summary = if meeting.is_test {
            format!("{}{}", TEST_SUMMARY_PREFIX, meeting.meeting_type)
        } else {
            meeting.meeting_type.clone()
        };

        let input = CalendarEventInput {
            summary,
            description: Some(format!("Scheduled via booking {}", meeting.id)),
            start: request.start_time,
            end: request.end_time,
            timezone: meeting.timezone.clone(),
            attendee_emails,
        };

        match self
            .events
            .create_event(&connection, PRIMARY_CALENDAR, &input)
            .await
        {
            Ok(event_id) => {
                progress
                    .success("calendar_event", &format!("Created event {}", event_id))
                    .await;

                let mut update = serde_json::Map::new();
                update.insert("calendar_event_id".to_string(), json!(event_id));
                if let Err(e) = self.meetings.update_meeting(meeting.id, update).await {
                    warn!("Could not persist event id for meeting {}: {}", meeting.id, e);
                    warnings.push(format!("Calendar event id not persisted: {}", e));
                    *has_errors = true;
                }
                Some(event_id)
            }
            Err(e) => {
                warn!("Event creation failed for meeting {}: {}", meeting.id, e);
                warnings.push(format!("Calendar event not created: {}", e));
                *has_errors = true;
                progress
                    .error(
                        "calendar_event",
                        "Event creation failed",
                        Some(json!({ "error": e.to_string() })),
                    )
                    .await;
                None
            }
        }
    }

    /// Contact lookup/create, then matter, then appointment. Each step is
    /// best-effort; a failure stops the chain but never the booking. Test
    /// meetings skip the CRM entirely.
    async fn sync_crm(
        &self,
        meeting: &Meeting,
        request: &ConfirmBookingRequest,
        progress: &ProgressLogger,
        warnings: &mut Vec<String>,
        has_errors: &mut bool,
    ) -> Option<String> {
        if meeting.is_test {
            progress
                .info("crm_sync", "Test booking, CRM sync skipped")
                .await;
            return None;
        }
        if !self.crm.is_configured() {
            progress
                .info("crm_sync", "CRM not configured, sync skipped")
                .await;
            return None;
        }

        let client = match meeting.attendees.first() {
            Some(client) => client,
            None => {
                warnings.push("CRM sync skipped: no client attendee".to_string());
                progress
                    .warn("crm_contact", "No client attendee on meeting", None)
                    .await;
                return None;
            }
        };

        let contact_id = match meeting.crm_contact_id.clone() {
            Some(id) => id,
            None => {
                let found = match self.crm.find_contact_by_email(&client.email).await {
                    Ok(found) => found,
                    Err(e) => {
                        warnings.push(format!("CRM contact lookup failed: {}", e));
                        *has_errors = true;
                        progress
                            .error(
                                "crm_contact",
                                "Contact lookup failed",
                                Some(json!({ "error": e.to_string() })),
                            )
                            .await;
                        return None;
                    }
                };

                let id = match found {
                    Some(id) => id,
                    None => match self
                        .crm
                        .create_contact(&client.email, client.name.as_deref())
                        .await
                    {
                        Ok(id) => id,
                        Err(e) => {
                            warnings.push(format!("CRM contact creation failed: {}", e));
                            *has_errors = true;
                            progress
                                .error(
                                    "crm_contact",
                                    "Contact creation failed",
                                    Some(json!({ "error": e.to_string() })),
                                )
                                .await;
                            return None;
                        }
                    },
                };
                progress
                    .success("crm_contact", &format!("Resolved contact {}", id))
                    .await;
                id
            }
        };

        let matter_id = match meeting.crm_matter_id.clone() {
            Some(id) => Some(id),
            None => match self.crm.create_matter(&contact_id, &meeting.meeting_type).await {
                Ok(id) => {
                    progress
                        .success("crm_matter", &format!("Created matter {}", id))
                        .await;
                    Some(id)
                }
                Err(e) => {
                    warnings.push(format!("CRM matter creation failed: {}", e));
                    *has_errors = true;
                    progress
                        .error(
                            "crm_matter",
                            "Matter creation failed",
                            Some(json!({ "error": e.to_string() })),
                        )
                        .await;
                    None
                }
            },
        };

        let appointment_id = match self
            .crm
            .create_appointment(
                &contact_id,
                matter_id.as_deref(),
                &meeting.meeting_type,
                request.start_time,
                request.end_time,
            )
            .await
        {
            Ok(id) => {
                progress
                    .success("crm_appointment", &format!("Created appointment {}", id))
                    .await;
                Some(id)
            }
            Err(e) => {
                warnings.push(format!("CRM appointment creation failed: {}", e));
                *has_errors = true;
                progress
                    .error(
                        "crm_appointment",
                        "Appointment creation failed",
                        Some(json!({ "error": e.to_string() })),
                    )
                    .await;
                None
            }
        };

        let mut update = serde_json::Map::new();
        update.insert("crm_contact_id".to_string(), json!(contact_id));
        if let Some(matter_id) = &matter_id {
            update.insert("crm_matter_id".to_string(), json!(matter_id));
        }
        if let Some(appointment_id) = &appointment_id {
            update.insert("crm_appointment_id".to_string(), json!(appointment_id));
        }
        if let Err(e) = self.meetings.update_meeting(meeting.id, update).await {
            warn!("Could not persist CRM ids for meeting {}: {}", meeting.id, e);
            warnings.push(format!("CRM ids not persisted: {}", e));
            *has_errors = true;
        }

        appointment_id
    }

    async fn remove_booking_event(
        &self,
        meeting: &Meeting,
        progress: &ProgressLogger,
        warnings: &mut Vec<String>,
    ) {
        let event_id = match &meeting.calendar_event_id {
            Some(event_id) => event_id,
            None => return,
        };

        let connection = match self.host_connection(meeting).await {
            Ok(connection) => connection,
            Err(e) => {
                warnings.push(format!("Calendar event {} not removed: {}", event_id, e));
                progress
                    .warn("calendar_cleanup", "Host calendar unavailable", None)
                    .await;
                return;
            }
        };

        match self
            .events
            .delete_event(&connection, PRIMARY_CALENDAR, event_id)
            .await
        {
            Ok(()) => {
                progress
                    .success("calendar_cleanup", &format!("Removed event {}", event_id))
                    .await;
            }
            Err(e) => {
                warn!("Event cleanup failed for meeting {}: {}", meeting.id, e);
                warnings.push(format!("Calendar event {} not removed: {}", event_id, e));
                progress
                    .warn(
                        "calendar_cleanup",
                        "Event removal failed",
                        Some(json!({ "error": e.to_string() })),
                    )
                    .await;
            }
        }
    }

    async fn host_connection(
        &self,
        meeting: &Meeting,
    ) -> Result<CalendarConnection, CalendarError> {
        let host_id = meeting.host_user_id.ok_or(CalendarError::NoConnection)?;
        self.connections
            .get_connection(host_id, CALENDAR_PROVIDER)
            .await
    }

    fn participant_ids(&self, meeting: &Meeting) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = meeting.host_user_id.into_iter().collect();
        ids.extend(meeting.support_user_ids.iter().copied());
        ids
    }
}
