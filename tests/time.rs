use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use satfetch::domain::Order;
use satfetch::error::SatfetchError;
use satfetch::time::{floor_to_snapshot, windows};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[test]
fn windows_tile_the_range_without_gaps() {
    let start = at(1, 0);
    let end = at(3, 5);
    for order in [Order::Ascending, Order::Descending] {
        let mut ranges = windows(start, end, TimeDelta::hours(12), order)
            .unwrap()
            .collect::<Vec<_>>();
        ranges.sort_by_key(|range| range.start());

        assert_eq!(ranges.first().unwrap().start(), start);
        assert_eq!(ranges.last().unwrap().end(), end);
        assert!(ranges.windows(2).all(|pair| pair[0].end() == pair[1].start()));
        assert!(ranges.iter().all(|range| range.duration() <= TimeDelta::hours(12)));
        assert_eq!(ranges.len(), 5);
    }
}

#[test]
fn descending_walk_starts_at_range_end_and_clips_the_last_window() {
    let ranges = windows(at(1, 0), at(1, 10), TimeDelta::hours(4), Order::Descending)
        .unwrap()
        .collect::<Vec<_>>();

    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0].start(), at(1, 6));
    assert_eq!(ranges[0].end(), at(1, 10));
    assert_eq!(ranges[2].start(), at(1, 0));
    assert_eq!(ranges[2].end(), at(1, 2));
}

#[test]
fn ascending_walk_clips_the_last_window() {
    let ranges = windows(at(1, 0), at(1, 10), TimeDelta::hours(4), Order::Ascending)
        .unwrap()
        .collect::<Vec<_>>();

    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0].start(), at(1, 0));
    assert_eq!(ranges[2].start(), at(1, 8));
    assert_eq!(ranges[2].end(), at(1, 10));
}

#[test]
fn window_wider_than_range_yields_the_whole_range() {
    let ranges = windows(at(1, 0), at(1, 3), TimeDelta::days(30), Order::Descending)
        .unwrap()
        .collect::<Vec<_>>();

    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].start(), at(1, 0));
    assert_eq!(ranges[0].end(), at(1, 3));
}

#[test]
fn empty_range_yields_no_windows() {
    let mut ranges = windows(at(1, 0), at(1, 0), TimeDelta::hours(1), Order::Ascending).unwrap();
    assert!(ranges.next().is_none());
}

#[test]
fn reversed_range_is_rejected() {
    assert_matches!(
        windows(at(2, 0), at(1, 0), TimeDelta::hours(1), Order::Descending),
        Err(SatfetchError::InvalidRange { .. })
    );
}

#[test]
fn non_positive_width_is_rejected() {
    assert_matches!(
        windows(at(1, 0), at(2, 0), TimeDelta::zero(), Order::Ascending),
        Err(SatfetchError::Configuration(_))
    );
    assert_matches!(
        windows(at(1, 0), at(2, 0), TimeDelta::hours(-1), Order::Ascending),
        Err(SatfetchError::Configuration(_))
    );
}

#[test]
fn end_instants_floor_to_the_previous_snapshot() {
    let seviri = [12, 27, 42, 57];
    let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let at = |hour, minute, second| day.and_hms_opt(hour, minute, second).unwrap();

    assert_eq!(floor_to_snapshot(at(0, 58, 0), &seviri), at(0, 57, 0));
    assert_eq!(floor_to_snapshot(at(1, 30, 0), &seviri), at(1, 27, 0));
    assert_eq!(floor_to_snapshot(at(1, 27, 0), &seviri), at(1, 27, 0));
    assert_eq!(floor_to_snapshot(at(1, 27, 41), &seviri), at(1, 27, 0));
    assert_eq!(
        floor_to_snapshot(at(0, 3, 0), &seviri),
        NaiveDate::from_ymd_opt(2019, 12, 31)
            .unwrap()
            .and_hms_opt(23, 57, 0)
            .unwrap()
    );
    assert_eq!(floor_to_snapshot(at(1, 26, 30), &[]), at(1, 26, 30));
}
