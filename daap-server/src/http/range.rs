//! `Range: bytes=a-b` parsing. Only the single-range form DAAP clients
//! send is supported; anything else is a 400, matching the protocol's
//! "single range only" contract.

use axum::http::HeaderMap;
use daap_core::provider::ByteRange;
use daap_core::{Error, Result};

/// `None` when there is no `Range` header at all (a plain 200 request).
/// `Some(Err(..))` for a header present but malformed.
pub fn parse_range_header(headers: &HeaderMap) -> Option<Result<ByteRange>> {
    let raw = headers.get(axum::http::header::RANGE)?;
    Some(parse_range_value(raw.to_str().ok()?))
}

fn parse_range_value(value: &str) -> Result<ByteRange> {
    let spec = value
        .strip_prefix("bytes=")
        .ok_or_else(|| Error::BadRange(format!("unsupported range unit in '{value}'")))?;

    if spec.contains(',') {
        return Err(Error::BadRange("multiple ranges are not supported".to_string()));
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| Error::BadRange(format!("malformed range '{spec}'")))?;

    if start_str.is_empty() {
        // `bytes=-N` (suffix range) needs the resource's total size to
        // resolve, which isn't known at header-parse time; DAAP clients
        // never send it in practice, so it's rejected rather than
        // threaded through as a third range variant.
        return Err(Error::BadRange("suffix ranges are not supported".to_string()));
    }

    let start: u64 = start_str
        .parse()
        .map_err(|_| Error::BadRange(format!("malformed range start in '{spec}'")))?;
    let end = if end_str.is_empty() {
        None
    } else {
        let end: u64 = end_str
            .parse()
            .map_err(|_| Error::BadRange(format!("malformed range end in '{spec}'")))?;
        if end < start {
            return Err(Error::BadRange(format!("range end before start in '{spec}'")));
        }
        Some(end + 1)
    };

    Ok((start, end))
}

/// Resolve a `Content-Range` header value, inclusive bounds, from a
/// `(served_start, served_end_exclusive)` pair and the full resource size.
/// `total_size == 0` means "unknown", rendered as the `*` wildcard.
pub fn content_range_header(start: u64, end_exclusive: u64, total_size: u64) -> String {
    let end_inclusive = end_exclusive.saturating_sub(1);
    if total_size == 0 {
        format!("bytes {start}-{end_inclusive}/*")
    } else {
        format!("bytes {start}-{end_inclusive}/{total_size}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_closed_range() {
        let range = parse_range_value("bytes=0-99").unwrap();
        assert_eq!(range, (0, Some(100)));
    }

    #[test]
    fn parses_an_open_ended_range() {
        let range = parse_range_value("bytes=100-").unwrap();
        assert_eq!(range, (100, None));
    }

    #[test]
    fn rejects_multiple_ranges() {
        assert!(parse_range_value("bytes=0-10,20-30").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_range_value("not-a-range").is_err());
        assert!(parse_range_value("bytes=abc-def").is_err());
    }

    #[test]
    fn rejects_end_before_start() {
        assert!(parse_range_value("bytes=50-10").is_err());
    }

    #[test]
    fn rejects_suffix_ranges() {
        assert!(parse_range_value("bytes=-500").is_err());
    }

    #[test]
    fn content_range_header_uses_wildcard_total_when_size_is_zero() {
        assert_eq!(content_range_header(0, 100, 0), "bytes 0-99/*");
        assert_eq!(content_range_header(0, 100, 500), "bytes 0-99/500");
    }
}
