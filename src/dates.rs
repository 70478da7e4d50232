//! Calendar helpers: free-text date parsing, month parsing and week bounds.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Accepted date shapes with their formats, tried in this order.
    /// chrono's `%Y` takes any number of digits, so the year width is checked here.
    static ref DATE_FORMATS: [(Regex, &'static str); 3] = [
        (Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid ISO date regex"), "%Y-%m-%d"),
        (Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid slash date regex"), "%d/%m/%Y"),
        (Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}$").expect("valid dash date regex"), "%d-%m-%Y"),
    ];
}

/// Earliest year accepted for monthly reports
pub const MIN_REPORT_YEAR: i32 = 2020;

/// Parse a date typed by the user.
///
/// Surrounding whitespace is ignored. The year must have four digits.
/// Returns `None` when no format matches.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .filter(|(shape, _)| shape.is_match(trimmed))
        .find_map(|(_, fmt)| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Monday of the week containing `date`
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Sunday of the week containing `date`
pub fn end_of_week(date: NaiveDate) -> NaiveDate {
    date + Duration::days(6 - date.weekday().num_days_from_monday() as i64)
}

/// Current calendar date in `tz`
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// First and last day of a month
pub fn month_bounds(month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next - Duration::days(1)))
}

/// Parse a `MM/YYYY` month selection
pub fn parse_month_year(text: &str) -> Result<(u32, i32), &'static str> {
    let (month, year) = text.trim().split_once('/').ok_or("format")?;
    let month: u32 = month.trim().parse().map_err(|_| "format")?;
    let year: i32 = year.trim().parse().map_err(|_| "format")?;

    if !(1..=12).contains(&month) || year < MIN_REPORT_YEAR {
        return Err("range");
    }

    Ok((month, year))
}
