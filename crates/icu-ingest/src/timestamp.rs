use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses the timestamp layouts found in the source tables. A bare date is
/// read as midnight. Returns `None` for empty or unparseable cells.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2180, 7, 23)
            .and_then(|d| d.and_hms_opt(12, 35, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2180-07-23 12:35:00"), Some(expected));
        assert_eq!(parse_timestamp("2180-07-23T12:35:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2180-07-23 12:35 "), Some(expected));
        assert_eq!(parse_timestamp("2180-07-23 12:35:00.000"), Some(expected));
    }

    #[test]
    fn bare_date_is_midnight() {
        let parsed = parse_timestamp("2180-07-23").unwrap();
        assert_eq!(parsed.to_string(), "2180-07-23 00:00:00");
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
