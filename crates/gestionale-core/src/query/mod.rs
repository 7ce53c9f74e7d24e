//! Ordering and filtering engine
//!
//! Pure functions over reservation lists. Callers pass copies; nothing here
//! mutates the cache in place.

use std::cmp::Ordering;

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::Reservation;

/// Relative date window for filtering, computed against a caller-supplied
/// "today" at day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Today,
    /// [today - 7 days, today], both ends inclusive
    Week,
    /// [today - 1 calendar month, today], both ends inclusive
    Month,
}

/// Stable sort ascending by the (date, time) key.
///
/// Records whose date/time do not parse sort after every valid instant;
/// ties keep their original relative order.
#[must_use]
pub fn sort_by_date_time(mut records: Vec<Reservation>) -> Vec<Reservation> {
    records.sort_by(|a, b| compare_instants(parse_instant(a), parse_instant(b)));
    records
}

/// Case-insensitive substring match on name, surname, and email; raw
/// substring match on phone. An empty term returns the list unchanged.
#[must_use]
pub fn filter_by_text(records: &[Reservation], term: &str) -> Vec<Reservation> {
    if term.is_empty() {
        return records.to_vec();
    }

    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&needle)
                || r.surname.to_lowercase().contains(&needle)
                || r.email.to_lowercase().contains(&needle)
                || r.phone.contains(term)
        })
        .cloned()
        .collect()
}

/// Keep records whose date falls inside the window, time-of-day stripped.
/// Records with an unparsable date are excluded.
#[must_use]
pub fn filter_by_date_window(
    records: &[Reservation],
    window: DateWindow,
    today: NaiveDate,
) -> Vec<Reservation> {
    let lower = match window {
        DateWindow::Today => today,
        DateWindow::Week => today - chrono::Duration::days(7),
        DateWindow::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
    };

    records
        .iter()
        .filter(|r| {
            parse_date(&r.date).is_some_and(|date| date >= lower && date <= today)
        })
        .cloned()
        .collect()
}

/// Parse a reservation's (date, time) into a comparable instant.
#[must_use]
pub fn parse_instant(reservation: &Reservation) -> Option<NaiveDateTime> {
    let date = parse_date(&reservation.date)?;
    let time = parse_time(&reservation.time).unwrap_or_default();
    Some(date.and_time(time))
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn compare_instants(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
