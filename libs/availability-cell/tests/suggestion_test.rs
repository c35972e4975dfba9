use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use assert_matches::assert_matches;

use availability_cell::models::{AvailabilityConstraints, AvailabilityError, DateRange, Slot};
use availability_cell::services::suggestion::suggest_slots;
use calendar_cell::models::BusyInterval;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn time(h: u32, mi: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, mi, 0).unwrap()
}

// Monday
fn workday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 14).unwrap()
}

fn single_day(day: NaiveDate) -> DateRange {
    DateRange {
        start: day,
        end: day,
    }
}

fn office_constraints() -> AvailabilityConstraints {
    AvailabilityConstraints {
        business_start: time(9, 0),
        business_end: time(17, 0),
        lunch_start: Some(time(12, 0)),
        lunch_end: Some(time(13, 0)),
        minimum_notice_minutes: 0,
        timezone: "UTC".to_string(),
        include_weekends: false,
        slot_increment_minutes: 30,
        max_results: 30,
        ..AvailabilityConstraints::default()
    }
}

fn starts(slots: &[Slot]) -> Vec<DateTime<Utc>> {
    slots.iter().map(|slot| slot.start).collect()
}

#[test]
fn office_day_with_one_meeting_and_lunch() {
    let day = workday();
    let busy = vec![BusyInterval::new(utc(2030, 1, 14, 10, 0), utc(2030, 1, 14, 11, 0))];
    let now = utc(2030, 1, 10, 8, 0);

    let slots = suggest_slots(&busy, single_day(day), 60, &office_constraints(), now).unwrap();

    // Gaps: 09-10 (one 60-minute fit), 11-12 (one), 13-17 (starts every 30
    // minutes up to 16:00).
    let expected_first_three = vec![
        utc(2030, 1, 14, 9, 0),
        utc(2030, 1, 14, 11, 0),
        utc(2030, 1, 14, 13, 0),
    ];
    assert_eq!(starts(&slots)[..3], expected_first_three[..]);
    assert_eq!(slots.len(), 9);
    assert_eq!(slots.last().unwrap().start, utc(2030, 1, 14, 16, 0));
}

#[test]
fn slots_never_overlap_busy_blocks_or_leave_business_hours() {
    let day = workday();
    let busy = vec![
        BusyInterval::new(utc(2030, 1, 14, 9, 30), utc(2030, 1, 14, 10, 15)),
        BusyInterval::new(utc(2030, 1, 14, 14, 0), utc(2030, 1, 14, 16, 30)),
    ];
    let now = utc(2030, 1, 10, 8, 0);
    let constraints = office_constraints();

    let slots = suggest_slots(&busy, single_day(day), 45, &constraints, now).unwrap();

    assert!(!slots.is_empty());
    for slot in &slots {
        assert_eq!((slot.end - slot.start).num_minutes(), 45);
        assert!(slot.start >= utc(2030, 1, 14, 9, 0));
        assert!(slot.end <= utc(2030, 1, 14, 17, 0));
        for block in &busy {
            assert!(
                !block.overlaps(slot.start, slot.end),
                "slot {} overlaps busy block starting {}",
                slot.start,
                block.start
            );
        }
        // Lunch is busy too.
        assert!(!(slot.start < utc(2030, 1, 14, 13, 0) && slot.end > utc(2030, 1, 14, 12, 0)));
    }
}

#[test]
fn slot_ending_exactly_at_busy_start_is_allowed() {
    let day = workday();
    let busy = vec![BusyInterval::new(utc(2030, 1, 14, 10, 0), utc(2030, 1, 14, 17, 0))];
    let now = utc(2030, 1, 10, 8, 0);
    let mut constraints = office_constraints();
    constraints.lunch_start = None;
    constraints.lunch_end = None;

    let slots = suggest_slots(&busy, single_day(day), 60, &constraints, now).unwrap();

    assert_eq!(starts(&slots), vec![utc(2030, 1, 14, 9, 0)]);
}

#[test]
fn minimum_notice_boundary_is_inclusive() {
    let day = workday();
    let now = utc(2030, 1, 14, 9, 0);
    let mut constraints = office_constraints();
    constraints.lunch_start = None;
    constraints.lunch_end = None;
    constraints.minimum_notice_minutes = 120;

    let slots = suggest_slots(&[], single_day(day), 60, &constraints, now).unwrap();

    // Cutoff is exactly 11:00; the 11:00 candidate is included, 10:30 is not.
    assert_eq!(slots[0].start, utc(2030, 1, 14, 11, 0));
}

#[test]
fn weekends_are_skipped_unless_included() {
    // Saturday and Sunday
    let range = DateRange {
        start: NaiveDate::from_ymd_opt(2030, 1, 12).unwrap(),
        end: NaiveDate::from_ymd_opt(2030, 1, 13).unwrap(),
    };
    let now = utc(2030, 1, 10, 8, 0);

    let weekdays_only = office_constraints();
    let slots = suggest_slots(&[], range, 60, &weekdays_only, now).unwrap();
    assert!(slots.is_empty());

    let mut with_weekends = office_constraints();
    with_weekends.include_weekends = true;
    let slots = suggest_slots(&[], range, 60, &with_weekends, now).unwrap();
    assert!(!slots.is_empty());
}

#[test]
fn max_results_caps_the_output() {
    let range = DateRange {
        start: workday(),
        end: NaiveDate::from_ymd_opt(2030, 1, 18).unwrap(),
    };
    let now = utc(2030, 1, 10, 8, 0);
    let mut constraints = office_constraints();
    constraints.max_results = 5;

    let slots = suggest_slots(&[], range, 30, &constraints, now).unwrap();
    assert_eq!(slots.len(), 5);
}

#[test]
fn output_is_deterministic_and_sorted() {
    let day = workday();
    let busy = vec![
        BusyInterval::new(utc(2030, 1, 14, 15, 0), utc(2030, 1, 14, 15, 30)),
        BusyInterval::new(utc(2030, 1, 14, 9, 30), utc(2030, 1, 14, 10, 0)),
    ];
    let now = utc(2030, 1, 10, 8, 0);
    let constraints = office_constraints();

    let first = suggest_slots(&busy, single_day(day), 30, &constraints, now).unwrap();
    let second = suggest_slots(&busy, single_day(day), 30, &constraints, now).unwrap();

    assert_eq!(first, second);
    assert!(first.windows(2).all(|pair| pair[0].start < pair[1].start));
}

#[test]
fn labels_render_in_the_request_timezone() {
    let day = workday();
    let now = utc(2030, 1, 10, 8, 0);
    let mut constraints = office_constraints();
    constraints.timezone = "America/Chicago".to_string();
    constraints.lunch_start = None;
    constraints.lunch_end = None;

    let slots = suggest_slots(&[], single_day(day), 60, &constraints, now).unwrap();

    // 09:00 Chicago is 15:00 UTC in January.
    assert_eq!(slots[0].start, utc(2030, 1, 14, 15, 0));
    assert!(slots[0].label.contains("09:00"));
}

#[test]
fn invalid_inputs_are_rejected() {
    let day = workday();
    let now = utc(2030, 1, 10, 8, 0);

    assert_matches!(
        suggest_slots(&[], single_day(day), 0, &office_constraints(), now),
        Err(AvailabilityError::InvalidConstraints(_))
    );

    let mut bad_tz = office_constraints();
    bad_tz.timezone = "Not/AZone".to_string();
    assert_matches!(
        suggest_slots(&[], single_day(day), 60, &bad_tz, now),
        Err(AvailabilityError::InvalidTimezone(_))
    );

    let inverted = DateRange {
        start: NaiveDate::from_ymd_opt(2030, 1, 18).unwrap(),
        end: workday(),
    };
    assert_matches!(
        suggest_slots(&[], inverted, 60, &office_constraints(), now),
        Err(AvailabilityError::InvalidRange(_))
    );
}
