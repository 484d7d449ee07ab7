use crate::error::{ReconstructionError, Result};
use chrono::{Datelike, Days, NaiveDate};

/// Parses a feed date of the form `YYYYMMDD`.
pub fn parse_yyyymmdd(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d")
        .map_err(|e| ReconstructionError::DateError(format!("'{}': {}", raw, e)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// `date` minus a fractional number of days, rounded to the nearest whole day.
pub fn subtract_days(date: NaiveDate, days: f64) -> NaiveDate {
    let whole = days.round().max(0.0) as u64;
    date.checked_sub_days(Days::new(whole)).unwrap_or(NaiveDate::MIN)
}

pub fn day_distance(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

/// Parses a fiscal year end given as `MMDD` into (month, day).
pub fn parse_fiscal_year_end(mmdd: &str) -> Option<(u32, u32)> {
    let trimmed = mmdd.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let month: u32 = trimmed[..2].parse().ok()?;
    let day: u32 = trimmed[2..].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((month, day))
}

/// The most recent fiscal year end strictly before `date`.
///
/// Fiscal years that end on a weekday near month end (52/53 week years)
/// are approximated by the calendar day, clamped to the month's length.
pub fn previous_fiscal_year_end(date: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let in_year = |year: i32| -> Option<NaiveDate> {
        let month_end = last_day_of_month(year, month)?;
        NaiveDate::from_ymd_opt(year, month, day.min(month_end.day()))
    };

    let this_year = in_year(date.year())?;
    if this_year < date {
        Some(this_year)
    } else {
        in_year(date.year() - 1)
    }
}

/// Lowercases, turns separators into spaces, drops punctuation and
/// collapses whitespace. `&` reads as `and`.
pub fn normalize_label(label: &str) -> String {
    let mut cleaned = String::with_capacity(label.len());
    for c in label.chars() {
        match c {
            '&' => cleaned.push_str(" and "),
            '-' | '/' | '_' | '\u{2013}' | '\u{2014}' => cleaned.push(' '),
            c if c.is_alphanumeric() || c.is_whitespace() => {
                cleaned.extend(c.to_lowercase());
            }
            _ => {}
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
