use chrono::{Datelike, NaiveDate};

/// Days since 1970-01-01 (UTC).
pub type FilingDay = i32;

// NaiveDate's default is 1970-01-01
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Parse an 8-digit `YYYYMMDD` string into a day count.
///
/// Returns `None` for anything that is not eight ASCII digits naming a real
/// calendar date (`20240231` is rejected rather than rolled over).
pub fn date_to_days(text: &str) -> Option<FilingDay> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = text[0..4].parse().ok()?;
    let month: u32 = text[4..6].parse().ok()?;
    let day: u32 = text[6..8].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    i32::try_from(date.signed_duration_since(epoch()).num_days()).ok()
}

/// Inverse of [`date_to_days`], rendered back as `YYYYMMDD`.
pub fn days_to_date(days: FilingDay) -> Option<String> {
    let date = epoch().checked_add_signed(chrono::Duration::days(days.into()))?;
    Some(format!(
        "{:04}{:02}{:02}",
        date.year(),
        date.month(),
        date.day()
    ))
}
