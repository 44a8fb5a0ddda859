use crate::error::ConversionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a reported magnitude such as `"100000"`, `"-3000"` or `" 1.23 "`.
///
/// Text that parses to NaN or infinity is rejected: a filing never reports those.
pub fn parse_number(text: &str) -> Result<f64, ConversionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::Empty);
    }
    let value: f64 = trimmed.parse()?;
    if !value.is_finite() {
        return Err(ConversionError::NotFinite(trimmed.to_string()));
    }
    Ok(value)
}

/// Parses a period date. Accepts `YYYY-MM-DD` and ISO date-times, which are
/// truncated to their calendar date.
pub fn parse_date(text: &str) -> Result<NaiveDate, ConversionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::Empty);
    }

    let date_err = match NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        Ok(date) => return Ok(date),
        Err(e) => e,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.date());
        }
    }

    Err(ConversionError::Date(date_err))
}

/// True for empty or whitespace-only text.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("100000", 100000.0)]
    #[case("1.23", 1.23)]
    #[case("-3000", -3000.0)]
    #[case("  42 ", 42.0)]
    #[case("1e3", 1000.0)]
    fn test_parse_number(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(parse_number(input).unwrap(), expected);
    }

    #[rstest]
    #[case("NVDA")]
    #[case("NaN")]
    #[case("inf")]
    #[case("1,000")]
    #[case("")]
    #[case("   ")]
    fn test_parse_number_rejects(#[case] input: &str) {
        assert!(parse_number(input).is_err());
    }

    #[test]
    fn test_parse_number_nan_is_not_finite() {
        assert!(matches!(
            parse_number("NaN"),
            Err(ConversionError::NotFinite(_))
        ));
    }

    #[rstest]
    #[case("2020-10-01")]
    #[case(" 2020-10-01 ")]
    #[case("2020-10-01T00:00:00")]
    #[case("2020-10-01 23:59:59")]
    #[case("2020-10-01T12:30:00+02:00")]
    fn test_parse_date(#[case] input: &str) {
        assert_eq!(
            parse_date(input).unwrap(),
            NaiveDate::from_ymd_opt(2020, 10, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_date_rejects() {
        assert!(matches!(parse_date("Q3 2020"), Err(ConversionError::Date(_))));
        assert!(matches!(parse_date("2020-13-01"), Err(ConversionError::Date(_))));
        assert!(matches!(parse_date(""), Err(ConversionError::Empty)));
    }
}
