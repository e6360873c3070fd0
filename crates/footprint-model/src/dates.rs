use chrono::{Duration, NaiveDate};

/// Marker prefix forcing a written string to be stored as literal text,
/// never reinterpreted (e.g. a `dd/mm/yyyy` date that must not become a
/// serial number).
pub const TEXT_MARKER: char = '\'';

/// Locale-fixed format used when a date is written into the grid as text.
pub const DATE_TEXT_FORMAT: &str = "%d/%m/%Y";

/// Serial date epoch (day 0). The 1899-12-30 base matches the legacy 1900
/// date system for every date from 1900-03-01 onward while sidestepping its
/// fictitious leap day; the business workbooks hold no earlier dates.
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("fixed epoch date is valid")
}

/// Convert a calendar date to its serial day number.
pub fn serial_from_date(date: NaiveDate) -> f64 {
    (date - epoch()).num_days() as f64
}

/// Convert a serial day number back to a calendar date, truncating any
/// fractional time of day. Out-of-range serials yield `None`.
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    if days < i64::MIN as f64 || days > i64::MAX as f64 {
        return None;
    }
    epoch().checked_add_signed(Duration::days(days as i64))
}

/// Render a date the way it is written into the grid: `dd/mm/yyyy` behind
/// the literal-text marker.
pub fn date_write_text(date: NaiveDate) -> String {
    format!("{TEXT_MARKER}{}", date.format(DATE_TEXT_FORMAT))
}
