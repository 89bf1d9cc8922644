//! HTTP-date formatting and parsing.
//!
//! `Last-Modified` values arrive in the RFC 7231 preferred form, but legacy
//! servers still emit the obsolete RFC 850 and asctime shapes plus a handful
//! of non-standard variants, so parsing tries those as fallbacks.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Obsolete and non-standard formats, tried in order after RFC 2822.
/// All are interpreted as GMT.
const LEGACY_FORMATS: &[&str] = &[
    // RFC 850, obsoleted by RFC 1036
    "%A, %d-%b-%y %H:%M:%S GMT",
    // ANSI C asctime()
    "%a %b %e %H:%M:%S %Y",
    // assorted variants seen in the wild
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%a, %d %b %y %H:%M:%S GMT",
    "%a %d %b %Y %H:%M:%S GMT",
    "%a %d-%b-%Y %H:%M:%S GMT",
];

/// Formats an epoch-millisecond timestamp for use in `If-Modified-Since`.
pub fn format_http_date(timestamp_millis: i64) -> String {
    let datetime: DateTime<Utc> = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or_default();
    datetime.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an HTTP-date into epoch milliseconds, or `None` when the value
/// matches no known format.
pub fn parse_http_date(value: &str) -> Option<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc2822(value) {
        return Some(datetime.with_timezone(&Utc).timestamp_millis());
    }

    for format in LEGACY_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    log::warn!("Couldn't parse date: {value}, ignoring");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2015-10-21 07:28:00 UTC
    const KNOWN_MILLIS: i64 = 1445412480000;

    #[test]
    fn test_format_rfc1123() {
        assert_eq!(format_http_date(KNOWN_MILLIS), "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn test_parse_rfc1123() {
        assert_eq!(
            parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(KNOWN_MILLIS)
        );
    }

    #[test]
    fn test_parse_rfc850() {
        assert_eq!(
            parse_http_date("Wednesday, 21-Oct-15 07:28:00 GMT"),
            Some(KNOWN_MILLIS)
        );
    }

    #[test]
    fn test_parse_asctime() {
        assert_eq!(
            parse_http_date("Wed Oct 21 07:28:00 2015"),
            Some(KNOWN_MILLIS)
        );
    }

    #[test]
    fn test_parse_with_offset() {
        // RFC 2822 offsets are honored
        assert_eq!(
            parse_http_date("Wed, 21 Oct 2015 09:28:00 +0200"),
            Some(KNOWN_MILLIS)
        );
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert_eq!(parse_http_date("not a date"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn test_roundtrip() {
        let formatted = format_http_date(KNOWN_MILLIS);
        assert_eq!(parse_http_date(&formatted), Some(KNOWN_MILLIS));
    }
}
