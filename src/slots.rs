use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::models::Slot;

/// Times of day the clinic books, every 30 minutes with a lunch break.
const BOOKABLE: [(u32, u32); 17] = [
    (8, 0), (8, 30), (9, 0), (9, 30), (10, 0), (10, 30), (11, 0), (11, 30),
    (13, 0), (13, 30), (14, 0), (14, 30), (15, 0), (15, 30), (16, 0), (16, 30),
    (17, 0),
];

pub fn catalogue() -> Vec<NaiveTime> {
    BOOKABLE
        .iter()
        .filter_map(|&(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .collect()
}

/// Times still bookable on `date` as seen at `now`.
/// Past days: none. Today: only later than the current minute. Later days: all.
pub fn bookable_times(date: NaiveDate, now: NaiveDateTime) -> Vec<NaiveTime> {
    let today = now.date();
    if date < today {
        return vec![];
    }
    let all = catalogue();
    if date > today {
        return all;
    }
    let current_minute = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now.time());
    all.into_iter().filter(|t| *t > current_minute).collect()
}

pub fn is_bookable(slot: Slot, now: NaiveDateTime) -> bool {
    bookable_times(slot.date, now).contains(&slot.time)
}

/// Patients book from tomorrow on.
pub fn min_booking_date(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}
