use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::domain::{Order, TimeRange};
use crate::error::SatfetchError;

/// Consecutive windows of fixed width tiling `[start, end)`, walked in `order`.
///
/// The window at the far end of the walk is clipped to the range. An empty
/// range (`start == end`) yields nothing.
#[derive(Debug, Clone)]
pub struct Windows {
    start: NaiveDateTime,
    end: NaiveDateTime,
    width: TimeDelta,
    order: Order,
    cursor: NaiveDateTime,
}

/// Floors `instant` to the latest snapshot minute at or before it.
///
/// Minutes before the first snapshot of the hour fall back to the last snapshot
/// of the previous hour. An empty table leaves `instant` untouched.
pub fn floor_to_snapshot(instant: NaiveDateTime, snapshots: &[u32]) -> NaiveDateTime {
    let Some(&last) = snapshots.iter().max() else {
        return instant;
    };
    let hour =
        instant.date().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(instant.hour()));
    match snapshots
        .iter()
        .copied()
        .filter(|&minute| minute <= instant.minute())
        .max()
    {
        Some(minute) => hour + TimeDelta::minutes(i64::from(minute)),
        None => hour - TimeDelta::minutes(60 - i64::from(last)),
    }
}

pub fn windows(
    start: NaiveDateTime,
    end: NaiveDateTime,
    width: TimeDelta,
    order: Order,
) -> Result<Windows, SatfetchError> {
    if start > end {
        return Err(SatfetchError::InvalidRange { start, end });
    }
    if width <= TimeDelta::zero() {
        return Err(SatfetchError::Configuration(format!(
            "window width must be positive, got {width}"
        )));
    }
    let cursor = match order {
        Order::Ascending => start,
        Order::Descending => end,
    };
    Ok(Windows {
        start,
        end,
        width,
        order,
        cursor,
    })
}

impl Iterator for Windows {
    type Item = TimeRange;

    fn next(&mut self) -> Option<Self::Item> {
        match self.order {
            Order::Ascending => {
                if self.cursor >= self.end {
                    return None;
                }
                let next = self
                    .cursor
                    .checked_add_signed(self.width)
                    .map_or(self.end, |value| value.min(self.end));
                let window = TimeRange::new(self.cursor, next).ok()?;
                self.cursor = next;
                Some(window)
            }
            Order::Descending => {
                if self.cursor <= self.start {
                    return None;
                }
                let next = self
                    .cursor
                    .checked_sub_signed(self.width)
                    .map_or(self.start, |value| value.max(self.start));
                let window = TimeRange::new(next, self.cursor).ok()?;
                self.cursor = next;
                Some(window)
            }
        }
    }
}

impl std::iter::FusedIterator for Windows {}
