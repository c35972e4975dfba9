// libs/availability-cell/src/services/orchestrator.rs
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use calendar_cell::models::{BusyInterval, CalendarConnection, CalendarError};
use calendar_cell::services::{BusyFetcher, ConnectionService};

use crate::models::{
    AvailabilityConstraints, AvailabilityError, CheckAvailabilityResponse, DateRange,
};
use crate::services::suggestion::{merge_busy_intervals, suggest_slots};

const CALENDAR_PROVIDER: &str = "google";
const PRIMARY_CALENDAR: &str = "primary";

/// Composes connection lookup, token-aware busy fetching and the suggestion
/// engine across a group of participants and an optional room resource.
/// Availability is best-effort: a participant whose calendar cannot be read
/// is skipped with a warning, never fatal for the group.
pub struct AvailabilityOrchestrator {
    connections: ConnectionService,
    busy_fetcher: BusyFetcher,
}

impl AvailabilityOrchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            connections: ConnectionService::new(config),
            busy_fetcher: BusyFetcher::new(config),
        }
    }

    pub async fn check_availability(
        &self,
        participant_ids: &[Uuid],
        room_resource_id: Option<&str>,
        range: DateRange,
        duration_minutes: i64,
        constraints: &AvailabilityConstraints,
        now: DateTime<Utc>,
    ) -> Result<CheckAvailabilityResponse, AvailabilityError> {
        self.check_availability_with_calendars(
            participant_ids,
            None,
            room_resource_id,
            range,
            duration_minutes,
            constraints,
            now,
        )
        .await
    }

    /// Like `check_availability`, but with an explicit calendar-id override
    /// applied to every participant instead of their stored selection.
    #[allow(clippy::too_many_arguments)]
    pub async fn check_availability_with_calendars(
        &self,
        participant_ids: &[Uuid],
        calendar_ids_override: Option<&[String]>,
        room_resource_id: Option<&str>,
        range: DateRange,
        duration_minutes: i64,
        constraints: &AvailabilityConstraints,
        now: DateTime<Utc>,
    ) -> Result<CheckAvailabilityResponse, AvailabilityError> {
        let (window_start, window_end) = range_bounds(range, constraints)?;

        let mut all_busy: Vec<BusyInterval> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut participants_checked = 0usize;
        // Any usable staff connection can read the room resource calendar.
        let mut room_reader: Option<CalendarConnection> = None;

        for participant_id in participant_ids {
            let connection = match self
                .connections
                .get_connection(*participant_id, CALENDAR_PROVIDER)
                .await
            {
                Ok(connection) => connection,
                Err(CalendarError::NoConnection) => {
                    debug!("Participant {} has no calendar connection", participant_id);
                    warnings.push(format!(
                        "Participant {} has no calendar connection",
                        participant_id
                    ));
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Could not load connection for participant {}: {}",
                        participant_id, e
                    );
                    warnings.push(format!("Participant {} skipped: {}", participant_id, e));
                    continue;
                }
            };

            let calendar_ids = match calendar_ids_override {
                Some(ids) if !ids.is_empty() => ids.to_vec(),
                _ if connection.selected_calendar_ids.is_empty() => {
                    vec![PRIMARY_CALENDAR.to_string()]
                }
                _ => connection.selected_calendar_ids.clone(),
            };

            match self
                .busy_fetcher
                .fetch_busy(
                    &connection,
                    &calendar_ids,
                    window_start,
                    window_end,
                    constraints.busy_source,
                )
                .await
            {
                Ok(intervals) => {
                    debug!(
                        "Participant {}: {} busy intervals across {} calendars",
                        participant_id,
                        intervals.len(),
                        calendar_ids.len()
                    );
                    all_busy.extend(intervals);
                    participants_checked += 1;
                    if room_reader.is_none() {
                        room_reader = Some(connection);
                    }
                }
                Err(e) => {
                    warn!(
                        "Skipping participant {} calendars: {}",
                        participant_id, e
                    );
                    warnings.push(format!("Participant {} skipped: {}", participant_id, e));
                }
            }
        }

        if let Some(room_id) = room_resource_id {
            match &room_reader {
                Some(connection) => {
                    let room_ids = vec![room_id.to_string()];
                    match self
                        .busy_fetcher
                        .fetch_busy(
                            connection,
                            &room_ids,
                            window_start,
                            window_end,
                            constraints.busy_source,
                        )
                        .await
                    {
                        Ok(intervals) => all_busy.extend(intervals),
                        Err(e) => {
                            warn!("Room {} busy lookup failed: {}", room_id, e);
                            warnings.push(format!("Room {} not checked: {}", room_id, e));
                        }
                    }
                }
                None => {
                    warnings.push(format!(
                        "Room {} not checked: no usable staff connection",
                        room_id
                    ));
                }
            }
        }

        let busy_intervals = merge_busy_intervals(&all_busy);
        let slots = suggest_slots(&busy_intervals, range, duration_minutes, constraints, now)?;

        Ok(CheckAvailabilityResponse {
            slots,
            busy_intervals,
            participants_checked,
            warnings,
        })
    }
}

/// UTC bounds covering the full local-day range, used for busy fetching.
fn range_bounds(
    range: DateRange,
    constraints: &AvailabilityConstraints,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AvailabilityError> {
    if range.end < range.start {
        return Err(AvailabilityError::InvalidRange(format!(
            "{} is after {}",
            range.start, range.end
        )));
    }

    let tz: chrono_tz::Tz = constraints
        .timezone
        .parse()
        .map_err(|_| AvailabilityError::InvalidTimezone(constraints.timezone.clone()))?;

    let start_naive = range.start.and_hms_opt(0, 0, 0).ok_or_else(|| {
        AvailabilityError::InvalidRange("Unrepresentable range start".to_string())
    })?;
    let end_naive = range
        .end
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AvailabilityError::InvalidRange("Unrepresentable range end".to_string()))?;

    let start = tz
        .from_local_datetime(&start_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| start_naive.and_utc());
    let end = tz
        .from_local_datetime(&end_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| end_naive.and_utc());

    Ok((start, end))
}
