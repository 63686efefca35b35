//! Field coercion rules
//!
//! Pure string-to-typed-value conversion, one function per semantic kind.
//! Coercion never fails: an unparsable value yields the column's defined
//! default. Note the asymmetry, which is an intentional domain rule: empty
//! flags become 0 while empty amounts and timestamps become NULL.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::types::BigDecimal;

/// Date-time layouts accepted by [`timestamp`], tried in order.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a decimal amount. Empty or unparsable values become `None`.
pub fn amount(raw: Option<&str>) -> Option<BigDecimal> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    BigDecimal::from_str(s).ok()
}

/// Parse a date-time and normalize it to UTC. Naive inputs are read as UTC;
/// unparsable values become `None`.
pub fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

/// Parse a 0/1 flag. Empty or unparsable values default to 0, never NULL.
pub fn flag(raw: Option<&str>) -> i16 {
    raw.map(str::trim)
        .and_then(|s| s.parse::<i16>().ok())
        .unwrap_or(0)
}

/// Take the integer prefix of a categorical code, dropping any fractional
/// suffix ("5411.0" -> "5411"). No leading digits means `None`.
pub fn code(raw: Option<&str>) -> Option<String> {
    let s = raw?.trim();
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Pass free text through unchanged. Only an absent field becomes `None`.
pub fn text(raw: Option<&str>) -> Option<String> {
    raw.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parses_decimal() {
        assert_eq!(amount(Some("12.50")), Some(BigDecimal::from_str("12.5").unwrap()));
        assert_eq!(amount(Some("0.01")), Some(BigDecimal::from_str("0.01").unwrap()));
        assert_eq!(amount(Some("-3")), Some(BigDecimal::from_str("-3").unwrap()));
    }

    #[test]
    fn test_amount_empty_or_unparsable_is_null() {
        assert_eq!(amount(Some("")), None);
        assert_eq!(amount(Some("   ")), None);
        assert_eq!(amount(Some("abc")), None);
        assert_eq!(amount(None), None);
    }

    #[test]
    fn test_timestamp_normalizes_space_separated() {
        let ts = timestamp(Some("2023-01-05 10:00:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-01-05T10:00:00+00:00");
    }

    #[test]
    fn test_timestamp_accepts_iso_8601_variants() {
        assert!(timestamp(Some("2023-01-05T10:00:00")).is_some());
        assert!(timestamp(Some("2023-01-05T10:00:00Z")).is_some());
        assert!(timestamp(Some("2023-01-05 10:00:00.250")).is_some());
        assert_eq!(
            timestamp(Some("2023-01-05")).unwrap().to_rfc3339(),
            "2023-01-05T00:00:00+00:00"
        );
    }

    #[test]
    fn test_timestamp_unparsable_is_null() {
        assert_eq!(timestamp(Some("not-a-date")), None);
        assert_eq!(timestamp(Some("")), None);
        assert_eq!(timestamp(None), None);
    }

    #[test]
    fn test_flag_defaults_to_zero_not_null() {
        assert_eq!(flag(Some("")), 0);
        assert_eq!(flag(Some("abc")), 0);
        assert_eq!(flag(None), 0);
        assert_eq!(flag(Some("1")), 1);
        assert_eq!(flag(Some("0")), 0);
    }

    #[test]
    fn test_code_takes_integer_prefix() {
        assert_eq!(code(Some("5411.0")), Some("5411".to_string()));
        assert_eq!(code(Some("5411")), Some("5411".to_string()));
        assert_eq!(code(Some("7995.99")), Some("7995".to_string()));
    }

    #[test]
    fn test_code_without_digits_is_null() {
        assert_eq!(code(Some("")), None);
        assert_eq!(code(Some("abc")), None);
        assert_eq!(code(None), None);
    }

    #[test]
    fn test_text_passes_through_unchanged() {
        assert_eq!(text(Some("grocery_pos")), Some("grocery_pos".to_string()));
        // Present-but-empty is preserved; only an absent field is NULL.
        assert_eq!(text(Some("")), Some(String::new()));
        assert_eq!(text(None), None);
    }
}
