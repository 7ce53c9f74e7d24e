//! CSV export of the reservation list.

use std::fmt::Write as _;

use crate::models::Reservation;
use crate::render::format_date_short;

const CSV_HEADER: &str = "Data,Orario,Nome,Cognome,Email,Telefono,Ospiti,Note";

/// Render the reservations as CSV: fixed header, one quoted-field row per
/// record, dates in local `dd/mm/yyyy` form.
#[must_use]
pub fn render_csv(reservations: &[Reservation]) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for r in reservations {
        let fields = [
            format_date_short(&r.date),
            r.time.clone(),
            r.name.clone(),
            r.surname.clone(),
            r.email.clone(),
            r.phone.clone(),
            r.guests.to_string(),
            r.notes.clone(),
        ];
        let row = fields
            .iter()
            .map(|field| quote_field(field))
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(csv, "{row}");
    }

    csv
}

/// Suggested download name: `prenotazioni_<ISO-date>.csv`.
#[must_use]
pub fn suggested_export_file_name(date: chrono::NaiveDate) -> String {
    format!("prenotazioni_{}.csv", date.format("%Y-%m-%d"))
}

fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
