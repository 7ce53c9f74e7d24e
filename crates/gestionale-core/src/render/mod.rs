//! View renderer: projects reservation lists into table rows and counters.
//!
//! Pure over its inputs; the caller is responsible for any prior sorting and
//! filtering, and the same list drives both the rows and the aggregates.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::Reservation;
use crate::query::parse_date;

const WEEKDAYS_SHORT: [&str; 7] = ["lun", "mar", "mer", "gio", "ven", "sab", "dom"];
const MONTHS_SHORT: [&str; 12] = [
    "gen", "feb", "mar", "apr", "mag", "giu", "lug", "ago", "set", "ott", "nov", "dic",
];
const MONTHS_LONG: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

/// Aggregate counters shown above the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub today: usize,
    pub week: usize,
}

/// Everything the notification dispatcher needs to act on a row without a
/// re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPayload {
    /// Phone in deep-link form (`+39...`)
    pub phone: String,
    /// Long-form date for the message body ("15 gennaio 2024")
    pub message_date: String,
    pub time: String,
    pub name: String,
    pub reservation: Reservation,
}

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    /// Short Italian date ("lun 15 gen 2024")
    pub date: String,
    pub time: String,
    pub full_name: String,
    pub email_link: String,
    pub phone_link: String,
    pub guests: u32,
    /// `-` placeholder when the record carries no notes
    pub notes: String,
    pub status_label: &'static str,
    pub action: ActionPayload,
}

/// Rendered table: rows plus aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub rows: Vec<RowView>,
    pub stats: Stats,
}

impl TableView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Project a reservation list into its table view. An empty list yields an
/// empty-state view with zeroed counters.
#[must_use]
pub fn render_table(records: &[Reservation], today: NaiveDate, country_code: &str) -> TableView {
    let rows = records
        .iter()
        .map(|r| render_row(r, country_code))
        .collect();
    TableView {
        rows,
        stats: compute_stats(records, today),
    }
}

fn render_row(reservation: &Reservation, country_code: &str) -> RowView {
    RowView {
        date: format_date_table(&reservation.date),
        time: reservation.time.clone(),
        full_name: reservation.full_name(),
        email_link: format!("mailto:{}", reservation.email),
        phone_link: format!("tel:{}", reservation.phone),
        guests: reservation.guests,
        notes: if reservation.notes.is_empty() {
            "-".to_string()
        } else {
            reservation.notes.clone()
        },
        status_label: reservation.status.label(),
        action: ActionPayload {
            phone: whatsapp_phone(&reservation.phone, country_code),
            message_date: format_date_message(&reservation.date),
            time: reservation.time.clone(),
            name: reservation.name.clone(),
            reservation: reservation.clone(),
        },
    }
}

/// Counters over the given list: total, dated today, dated within the last
/// seven days (inclusive).
#[must_use]
pub fn compute_stats(records: &[Reservation], today: NaiveDate) -> Stats {
    let week_ago = today - chrono::Duration::days(7);
    let dates: Vec<Option<NaiveDate>> = records.iter().map(|r| parse_date(&r.date)).collect();

    Stats {
        total: records.len(),
        today: dates.iter().filter(|d| **d == Some(today)).count(),
        week: dates
            .iter()
            .filter(|d| d.is_some_and(|d| d >= week_ago && d <= today))
            .count(),
    }
}

/// Short Italian table date, e.g. "lun 15 gen 2024". Unparsable dates are
/// rendered verbatim.
#[must_use]
pub fn format_date_table(raw: &str) -> String {
    parse_date(raw).map_or_else(
        || raw.to_string(),
        |date| {
            format!(
                "{} {} {} {}",
                WEEKDAYS_SHORT[date.weekday().num_days_from_monday() as usize],
                date.day(),
                MONTHS_SHORT[date.month0() as usize],
                date.year()
            )
        },
    )
}

/// Long Italian message date, e.g. "15 gennaio 2024".
#[must_use]
pub fn format_date_message(raw: &str) -> String {
    parse_date(raw).map_or_else(
        || raw.to_string(),
        |date| {
            format!(
                "{} {} {}",
                date.day(),
                MONTHS_LONG[date.month0() as usize],
                date.year()
            )
        },
    )
}

/// Numeric Italian date for CSV export, `dd/mm/yyyy`.
#[must_use]
pub fn format_date_short(raw: &str) -> String {
    parse_date(raw).map_or_else(|| raw.to_string(), |date| date.format("%d/%m/%Y").to_string())
}

/// Normalize a free-form phone number for the messaging deep link: strip
/// whitespace and non-digits except a leading `+`, then prefix the country
/// code when no `+` is present. A bare national prefix (e.g. `39...` for
/// `+39`) only gains the `+`.
#[must_use]
pub fn whatsapp_phone(raw: &str, country_code: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for (index, ch) in raw.trim().chars().enumerate() {
        if ch.is_ascii_digit() || (ch == '+' && index == 0) {
            cleaned.push(ch);
        }
    }

    if cleaned.starts_with('+') {
        return cleaned;
    }
    let national = country_code.trim_start_matches('+');
    if cleaned.starts_with(national) && cleaned.len() > national.len() + 6 {
        return format!("+{cleaned}");
    }
    format!("{country_code}{cleaned}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn reservation(date: &str, time: &str) -> Reservation {
        Reservation::from_document(
            None,
            &json!({
                "name": "Mario",
                "surname": "Rossi",
                "email": "mario@example.com",
                "phone": "345 123 4567",
                "date": date,
                "time": time,
                "guests": 2,
                "created_at": "2024-01-01T00:00:00Z",
            }),
        )
    }

    #[test]
    fn empty_list_renders_empty_state_with_zeroed_stats() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let view = render_table(&[], today, "+39");
        assert!(view.is_empty());
        assert_eq!(view.stats, Stats::default());
    }

    #[test]
    fn rows_carry_links_badges_and_action_payload() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let source = reservation("2024-01-15", "20:00");
        let view = render_table(std::slice::from_ref(&source), today, "+39");
        let row = &view.rows[0];

        assert_eq!(row.date, "lun 15 gen 2024");
        assert_eq!(row.full_name, "Mario Rossi");
        assert_eq!(row.email_link, "mailto:mario@example.com");
        assert_eq!(row.phone_link, "tel:345 123 4567");
        assert_eq!(row.notes, "-");
        assert_eq!(row.status_label, "new");
        assert_eq!(row.action.phone, "+393451234567");
        assert_eq!(row.action.message_date, "15 gennaio 2024");
        // The payload carries the full record so no re-fetch is needed
        assert_eq!(row.action.reservation, source);
    }

    #[test]
    fn stats_count_today_and_inclusive_week() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let records = vec![
            reservation("2024-01-15", "20:00"),
            reservation("2024-01-08", "20:00"),
            reservation("2024-01-07", "20:00"),
        ];

        let stats = compute_stats(&records, today);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.today, 1);
        // Exactly seven days back is still inside the window
        assert_eq!(stats.week, 2);
    }

    #[test]
    fn stats_recomputed_after_remote_delete_shrink_by_one() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut records = vec![
            reservation("2024-01-15", "19:00"),
            reservation("2024-01-15", "20:00"),
        ];
        let before = render_table(&records, today, "+39").stats.total;
        records.pop();
        let after = render_table(&records, today, "+39").stats.total;
        assert_eq!(before - 1, after);
    }

    #[test]
    fn whatsapp_phone_strips_and_prefixes() {
        assert_eq!(whatsapp_phone("345 123 4567", "+39"), "+393451234567");
        assert_eq!(whatsapp_phone("+41 79 123 45 67", "+39"), "+41791234567");
        assert_eq!(whatsapp_phone("39 345 123 4567", "+39"), "+393451234567");
        assert_eq!(whatsapp_phone("345-123.4567", "+39"), "+393451234567");
    }

    #[test]
    fn unparsable_date_renders_verbatim() {
        assert_eq!(format_date_table("domani"), "domani");
        assert_eq!(format_date_message(""), "");
        assert_eq!(format_date_short("15/01"), "15/01");
    }

    #[test]
    fn italian_date_formats() {
        assert_eq!(format_date_table("2024-03-03"), "dom 3 mar 2024");
        assert_eq!(format_date_message("2024-12-24"), "24 dicembre 2024");
        assert_eq!(format_date_short("2024-01-05"), "05/01/2024");
    }
}
