//! Capture filename scheme.
//!
//! Images are named `capture_<YYYYMMDD>_<HHMMSS>[_<label>].jpg`.  The
//! timestamp is zero-padded and fixed-width, so a descending sort on the
//! filename is also newest-first as long as every file follows the scheme.

use chrono::NaiveDateTime;

const PREFIX: &str = "capture";

/// Format of the timestamp embedded in filenames.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Shown in place of a timestamp that cannot be recovered from a filename.
pub const UNKNOWN_TIMESTAMP: &str = "Unknown";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Longest label that keeps a labelled filename within the usual 255-byte
/// filesystem limit.
pub const MAX_LABEL_LEN: usize = 255 - "capture_YYYYMMDD_HHMMSS_.jpg".len();

/// Best-effort decoding of a capture filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// `YYYY-MM-DD HH:MM:SS`, or [`UNKNOWN_TIMESTAMP`].
    pub timestamp: String,
    pub taken_at:  Option<NaiveDateTime>,
    pub label:     Option<String>,
}

/// Format `at` the way it appears inside a filename (`20240101_093000`).
pub fn stamp(at: &NaiveDateTime) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// Build the filename for an image taken at `at`.
///
/// An empty label is treated as no label.
pub fn make_name(at: &NaiveDateTime, label: Option<&str>) -> String {
    match label {
        Some(l) if !l.is_empty() => format!("{PREFIX}_{}_{l}.jpg", stamp(at)),
        _ => format!("{PREFIX}_{}.jpg", stamp(at)),
    }
}

/// Recover the timestamp and label from a filename.
///
/// Labels may themselves contain `_`: everything after the time part is
/// joined back together.  Never fails; names that do not follow the scheme
/// come back with an unknown timestamp.
pub fn parse_name(filename: &str) -> ParsedName {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => filename,
    };
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return ParsedName {
            timestamp: UNKNOWN_TIMESTAMP.to_string(),
            taken_at:  None,
            label:     None,
        };
    }

    let taken_at = NaiveDateTime::parse_from_str(
        &format!("{}_{}", parts[1], parts[2]),
        STAMP_FORMAT,
    )
    .ok()
    // chrono accepts unpadded fields; the scheme does not
    .filter(|_| parts[1].len() == 8 && parts[2].len() == 6);

    let label = if parts.len() > 3 {
        Some(parts[3..].join("_")).filter(|l| !l.is_empty())
    } else {
        None
    };

    ParsedName {
        timestamp: taken_at
            .map(|t| t.format(DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string()),
        taken_at,
        label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn name_without_label() {
        assert_eq!(make_name(&at(9, 5, 7), None), "capture_20240101_090507.jpg");
        assert_eq!(make_name(&at(9, 5, 7), Some("")), "capture_20240101_090507.jpg");
    }

    #[test]
    fn name_with_label() {
        assert_eq!(
            make_name(&at(23, 59, 59), Some("door")),
            "capture_20240101_235959_door.jpg"
        );
    }

    #[test]
    fn timestamp_survives_round_trip() {
        for (t, label) in [(at(0, 0, 0), None), (at(12, 30, 1), Some("x")), (at(23, 59, 59), Some("a_b"))] {
            let parsed = parse_name(&make_name(&t, label));
            assert_eq!(parsed.timestamp, t.format("%Y-%m-%d %H:%M:%S").to_string());
            assert_eq!(parsed.taken_at, Some(t));
            assert_eq!(parsed.label.as_deref(), label);
        }
    }

    #[test]
    fn underscores_in_label_are_rejoined() {
        let parsed = parse_name("capture_20240101_090000_front_door.jpg");
        assert_eq!(parsed.label.as_deref(), Some("front_door"));
        assert_eq!(parsed.timestamp, "2024-01-01 09:00:00");
    }

    #[test]
    fn malformed_names_are_unknown() {
        for name in ["photo.jpg", "capture_20240101.jpg", "", "no_ext"] {
            let parsed = parse_name(name);
            assert_eq!(parsed.timestamp, UNKNOWN_TIMESTAMP, "name={name:?}");
            assert_eq!(parsed.taken_at, None);
        }
    }

    #[test]
    fn invalid_stamp_keeps_label() {
        let parsed = parse_name("capture_2024_9_hello.png");
        assert_eq!(parsed.timestamp, UNKNOWN_TIMESTAMP);
        assert_eq!(parsed.label.as_deref(), Some("hello"));

        let parsed = parse_name("capture_20241301_250000.jpg");
        assert_eq!(parsed.timestamp, UNKNOWN_TIMESTAMP);
    }
}
