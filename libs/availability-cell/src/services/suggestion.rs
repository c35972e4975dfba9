// libs/availability-cell/src/services/suggestion.rs
//
// Pure slot computation. No IO; callers supply busy data and a fixed `now`,
// so output is fully deterministic for fixed inputs.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::debug;

use calendar_cell::models::BusyInterval;

use crate::models::{AvailabilityConstraints, AvailabilityError, DateRange, Slot};

/// Busy blocks separated by no more than this gap are coalesced, so
/// back-to-back events never yield unusable sliver gaps.
const MERGE_EPSILON_MINUTES: i64 = 1;

/// Merge and sort busy intervals, coalescing overlapping blocks and blocks
/// within the epsilon gap. Idempotent: merging a merged set is a no-op.
pub fn merge_busy_intervals(intervals: &[BusyInterval]) -> Vec<BusyInterval> {
    if intervals.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<BusyInterval> = intervals
        .iter()
        .filter(|interval| interval.start < interval.end)
        .copied()
        .collect();
    sorted.sort_by_key(|interval| (interval.start, interval.end));

    let epsilon = Duration::minutes(MERGE_EPSILON_MINUTES);
    let mut merged: Vec<BusyInterval> = Vec::with_capacity(sorted.len());

    for interval in sorted {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end + epsilon => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }

    merged
}

/// Compute bookable slots from busy data and constraints.
///
/// Interval semantics are half-open throughout: a slot ending exactly at a
/// busy-block or business-hours boundary is allowed, and a candidate exactly
/// at the minimum-notice cutoff is included.
pub fn suggest_slots(
    busy: &[BusyInterval],
    range: DateRange,
    duration_minutes: i64,
    constraints: &AvailabilityConstraints,
    now: DateTime<Utc>,
) -> Result<Vec<Slot>, AvailabilityError> {
    if duration_minutes <= 0 {
        return Err(AvailabilityError::InvalidConstraints(
            "Duration must be positive".to_string(),
        ));
    }
    if range.end < range.start {
        return Err(AvailabilityError::InvalidRange(format!(
            "{} is after {}",
            range.start, range.end
        )));
    }
    if constraints.business_start >= constraints.business_end {
        return Err(AvailabilityError::InvalidConstraints(
            "Business hours start must be before end".to_string(),
        ));
    }

    let tz: Tz = constraints
        .timezone
        .parse()
        .map_err(|_| AvailabilityError::InvalidTimezone(constraints.timezone.clone()))?;

    let duration = Duration::minutes(duration_minutes);
    let increment = Duration::minutes(constraints.slot_increment_minutes.max(1));
    let notice_cutoff = now + Duration::minutes(constraints.minimum_notice_minutes);
    let merged = merge_busy_intervals(busy);

    let mut slots = Vec::new();
    let mut day = range.start;

    while day <= range.end && slots.len() < constraints.max_results {
        if !constraints.include_weekends && is_weekend(day) {
            day = next_day(day);
            continue;
        }

        // Resolve the wall-clock window to UTC instants through the zone
        // database; days where a clock time does not exist (DST spring
        // forward) resolve to the next valid instant.
        let (Some(window_start), Some(window_end)) = (
            resolve_local(tz, day, constraints.business_start),
            resolve_local(tz, day, constraints.business_end),
        ) else {
            day = next_day(day);
            continue;
        };

        if window_start >= window_end {
            day = next_day(day);
            continue;
        }

        // The lunch block joins the busy set for this day only.
        let mut day_busy: Vec<BusyInterval> = merged.clone();
        if let (Some(lunch_start), Some(lunch_end)) =
            (constraints.lunch_start, constraints.lunch_end)
        {
            if let (Some(ls), Some(le)) = (
                resolve_local(tz, day, lunch_start),
                resolve_local(tz, day, lunch_end),
            ) {
                if ls < le {
                    day_busy.push(BusyInterval::new(ls, le));
                }
            }
        }
        let day_busy = merge_busy_intervals(&day_busy);

        walk_day_gaps(
            window_start,
            window_end,
            &day_busy,
            duration,
            increment,
            notice_cutoff,
            constraints.max_results,
            tz,
            &mut slots,
        );

        day = next_day(day);
    }

    debug!(
        "Suggested {} slots for {}..{} ({} busy blocks)",
        slots.len(),
        range.start,
        range.end,
        merged.len()
    );
    Ok(slots)
}

/// Walk the free gaps between busy blocks inside one business-hours window,
/// generating stride-aligned candidates into `slots`.
#[allow(clippy::too_many_arguments)]
fn walk_day_gaps(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    day_busy: &[BusyInterval],
    duration: Duration,
    increment: Duration,
    notice_cutoff: DateTime<Utc>,
    max_results: usize,
    tz: Tz,
    slots: &mut Vec<Slot>,
) {
    let mut cursor = window_start;

    // Busy blocks relevant to this window, in order, plus a zero-width
    // sentinel at window end so the trailing gap is walked like any other.
    let mut blocks: Vec<BusyInterval> = day_busy
        .iter()
        .filter(|block| block.start < window_end && block.end > window_start)
        .copied()
        .collect();
    blocks.push(BusyInterval {
        start: window_end,
        end: window_end,
    });

    for block in blocks {
        let gap_end = block.start.min(window_end);

        let mut candidate = cursor;
        while candidate + duration <= gap_end {
            if slots.len() >= max_results {
                return;
            }
            // Inclusive at the notice boundary.
            if candidate >= notice_cutoff {
                slots.push(Slot {
                    start: candidate,
                    end: candidate + duration,
                    label: format_slot_label(candidate, candidate + duration, tz),
                });
            }
            candidate += increment;
        }

        cursor = cursor.max(block.end);
        if cursor >= window_end {
            break;
        }
    }
}

fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(day)
}

/// Resolve a local wall-clock time on a date to a UTC instant. Ambiguous
/// times (DST fall back) take the earlier instant; nonexistent times (spring
/// forward) resolve to None and the caller skips or shifts.
fn resolve_local(tz: Tz, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = day.and_time(time);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        chrono::LocalResult::None => None,
    }
}

fn format_slot_label(start: DateTime<Utc>, end: DateTime<Utc>, tz: Tz) -> String {
    let local_start = start.with_timezone(&tz);
    let local_end = end.with_timezone(&tz);
    format!(
        "{} {} - {}",
        local_start.format("%a, %b %e"),
        local_start.format("%H:%M"),
        local_end.format("%H:%M %Z")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn busy(start: DateTime<Utc>, end: DateTime<Utc>) -> BusyInterval {
        BusyInterval::new(start, end)
    }

    #[test]
    fn merge_coalesces_overlapping_and_adjacent_blocks() {
        let input = vec![
            busy(utc(2025, 3, 3, 10, 0), utc(2025, 3, 3, 11, 0)),
            busy(utc(2025, 3, 3, 10, 30), utc(2025, 3, 3, 11, 30)),
            // Within the 1-minute epsilon of the previous block
            busy(utc(2025, 3, 3, 11, 31), utc(2025, 3, 3, 12, 0)),
            busy(utc(2025, 3, 3, 14, 0), utc(2025, 3, 3, 15, 0)),
        ];

        let merged = merge_busy_intervals(&input);
        assert_eq!(
            merged,
            vec![
                busy(utc(2025, 3, 3, 10, 0), utc(2025, 3, 3, 12, 0)),
                busy(utc(2025, 3, 3, 14, 0), utc(2025, 3, 3, 15, 0)),
            ]
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            busy(utc(2025, 3, 3, 9, 0), utc(2025, 3, 3, 10, 0)),
            busy(utc(2025, 3, 3, 9, 30), utc(2025, 3, 3, 11, 0)),
            busy(utc(2025, 3, 3, 13, 0), utc(2025, 3, 3, 14, 0)),
        ];

        let once = merge_busy_intervals(&input);
        let twice = merge_busy_intervals(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_drops_inverted_intervals() {
        let input = vec![busy(utc(2025, 3, 3, 11, 0), utc(2025, 3, 3, 10, 0))];
        assert!(merge_busy_intervals(&input).is_empty());
    }
}
