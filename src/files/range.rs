//! Single byte-range evaluation (`Range` / `If-Range`)
//!
//! Only one range per request is honoured. Multi-range and malformed headers
//! fall back to the full body, which RFC 7233 permits.

use chrono::{DateTime, Utc};

/// Inclusive byte range within a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for this range
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Decide what part of a `size`-byte file to send.
///
/// `If-Range` must match either the strong ETag or the second-truncated
/// modification time, otherwise the range is dropped.
pub fn evaluate(
    range: Option<&str>,
    if_range: Option<&str>,
    etag: &str,
    modified: Option<DateTime<Utc>>,
    size: u64,
) -> RangeOutcome {
    let Some(range) = range else {
        return RangeOutcome::Full;
    };

    if let Some(validator) = if_range {
        if !if_range_matches(validator.trim(), etag, modified) {
            return RangeOutcome::Full;
        }
    }

    match parse_single(range, size) {
        Some(Ok(range)) => RangeOutcome::Partial(range),
        Some(Err(())) => RangeOutcome::Unsatisfiable,
        None => RangeOutcome::Full,
    }
}

fn if_range_matches(validator: &str, etag: &str, modified: Option<DateTime<Utc>>) -> bool {
    if validator.starts_with('"') || validator.starts_with("W/") {
        return validator == etag;
    }
    match (parse_http_date(validator), modified) {
        (Some(date), Some(modified)) => modified.timestamp() == date.timestamp(),
        _ => false,
    }
}

/// `None` means ignore the header, `Some(Err)` means nothing in range.
fn parse_single(header: &str, size: u64) -> Option<Result<ByteRange, ()>> {
    let spec = header.trim().strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let suffix: u64 = last.parse().ok()?;
        if suffix == 0 || size == 0 {
            return Some(Err(()));
        }
        return Some(Ok(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }));
    }

    let start: u64 = first.parse().ok()?;
    let end = if last.is_empty() {
        None
    } else {
        let end: u64 = last.parse().ok()?;
        if end < start {
            return None;
        }
        Some(end)
    };

    if start >= size {
        return Some(Err(()));
    }

    Some(Ok(ByteRange {
        start,
        end: end.map_or(size - 1, |end| end.min(size - 1)),
    }))
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETAG: &str = "\"abc\"";

    #[test]
    fn test_no_range_is_full() {
        assert_eq!(evaluate(None, None, ETAG, None, 10), RangeOutcome::Full);
    }

    #[test]
    fn test_bounded_range() {
        assert_eq!(
            evaluate(Some("bytes=0-4"), None, ETAG, None, 10),
            RangeOutcome::Partial(ByteRange { start: 0, end: 4 })
        );
        assert_eq!(
            evaluate(Some("bytes=5-100"), None, ETAG, None, 10),
            RangeOutcome::Partial(ByteRange { start: 5, end: 9 })
        );
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        assert_eq!(
            evaluate(Some("bytes=7-"), None, ETAG, None, 10),
            RangeOutcome::Partial(ByteRange { start: 7, end: 9 })
        );
        assert_eq!(
            evaluate(Some("bytes=-3"), None, ETAG, None, 10),
            RangeOutcome::Partial(ByteRange { start: 7, end: 9 })
        );
        assert_eq!(
            evaluate(Some("bytes=-30"), None, ETAG, None, 10),
            RangeOutcome::Partial(ByteRange { start: 0, end: 9 })
        );
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(
            evaluate(Some("bytes=10-"), None, ETAG, None, 10),
            RangeOutcome::Unsatisfiable
        );
        assert_eq!(
            evaluate(Some("bytes=-0"), None, ETAG, None, 10),
            RangeOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_ignored_headers() {
        assert_eq!(
            evaluate(Some("bytes=0-1,4-5"), None, ETAG, None, 10),
            RangeOutcome::Full
        );
        assert_eq!(
            evaluate(Some("items=0-1"), None, ETAG, None, 10),
            RangeOutcome::Full
        );
        assert_eq!(
            evaluate(Some("bytes=5-2"), None, ETAG, None, 10),
            RangeOutcome::Full
        );
    }

    #[test]
    fn test_if_range() {
        let modified = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();

        assert_eq!(
            evaluate(Some("bytes=0-1"), Some(ETAG), ETAG, Some(modified), 10),
            RangeOutcome::Partial(ByteRange { start: 0, end: 1 })
        );
        assert_eq!(
            evaluate(Some("bytes=0-1"), Some("\"other\""), ETAG, Some(modified), 10),
            RangeOutcome::Full
        );
        assert_eq!(
            evaluate(
                Some("bytes=0-1"),
                Some("Sun, 06 Nov 1994 08:49:37 GMT"),
                ETAG,
                Some(modified),
                10
            ),
            RangeOutcome::Partial(ByteRange { start: 0, end: 1 })
        );
        assert_eq!(
            evaluate(
                Some("bytes=0-1"),
                Some("Mon, 07 Nov 1994 08:49:37 GMT"),
                ETAG,
                Some(modified),
                10
            ),
            RangeOutcome::Full
        );
    }

    #[test]
    fn test_http_date_round_trip_format() {
        let date = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(http_date(date), "Sun, 06 Nov 1994 08:49:37 GMT");
    }
}
