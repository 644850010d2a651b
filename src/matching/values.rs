// src/matching/values.rs

use chrono::{Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses the date formats seen in source extracts. Timestamps are truncated
/// to their date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn parse_number(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `(year, month, day)` of a parsable date.
pub fn date_parts(value: &str) -> Option<(i32, u32, u32)> {
    parse_date(value).map(|d| (d.year(), d.month(), d.day()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1985, 3, 7);
        assert_eq!(parse_date("1985-03-07"), expected);
        assert_eq!(parse_date("03/07/1985"), expected);
        assert_eq!(parse_date("19850307"), expected);
        assert_eq!(parse_date("1985-03-07 10:15:00"), expected);
        assert_eq!(parse_date("March 7th"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 1,250.5 "), Some(1250.5));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(date_parts("2001-12-31"), Some((2001, 12, 31)));
        assert_eq!(date_parts("2001-13-31"), None);
    }
}
