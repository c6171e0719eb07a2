// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Range` header parsing (RFC 7233) and combination: turns a raw `Range`
//! header plus a known resource size into an ascending, non-overlapping list
//! of byte intervals, or a verdict that the whole range request should be
//! ignored or rejected.

use http::header::HeaderValue;
use smallvec::SmallVec;

/// An inclusive byte interval `[start, end]`, `0 <= start <= end < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRange {
    pub start: u64,
    pub end: u64,
}

impl StreamRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Result of parsing a `Range` header against a known resource size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRange {
    /// No `Range` header, a non-`bytes` unit, or a syntactically malformed
    /// value: serve the full resource with status 200.
    Invalid,
    /// Every requested range lies entirely beyond `size`: status 416.
    Unsatisfiable,
    /// One or more combined, ascending, non-overlapping ranges.
    Ok(SmallVec<[StreamRange; 1]>),
}

/// Parses a `Range` header value of the form `bytes=<spec>[, <spec>]*`
/// against a resource of `size` bytes, combining overlapping/adjacent
/// ranges, and falling back to [`ParsedRange::Invalid`] if the combined
/// count exceeds `max_ranges`.
pub fn parse(header: Option<&HeaderValue>, size: u64, max_ranges: usize) -> ParsedRange {
    let Some(header) = header else {
        return ParsedRange::Invalid;
    };
    if size == 0 {
        return ParsedRange::Invalid;
    }
    let Ok(s) = header.to_str() else {
        return ParsedRange::Invalid;
    };
    let Some(spec) = s.strip_prefix("bytes=") else {
        // Non-bytes unit (e.g. `items=0-4`): ignored, serve the full body.
        return ParsedRange::Invalid;
    };

    let mut raw: SmallVec<[(Option<u64>, Option<u64>); 2]> = SmallVec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return ParsedRange::Invalid;
        }
        let Some((start_s, end_s)) = part.split_once('-') else {
            return ParsedRange::Invalid;
        };
        let start = if start_s.is_empty() {
            None
        } else {
            match start_s.parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => return ParsedRange::Invalid,
            }
        };
        let end = if end_s.is_empty() {
            None
        } else {
            match end_s.parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => return ParsedRange::Invalid,
            }
        };
        if start.is_none() && end.is_none() {
            return ParsedRange::Invalid;
        }
        raw.push((start, end));
    }

    let mut resolved: SmallVec<[StreamRange; 2]> = SmallVec::new();
    for (start, end) in raw {
        match (start, end) {
            (Some(start), _) if start >= size => continue, // beyond size: dropped, may yield Unsatisfiable.
            (Some(start), Some(end)) => {
                resolved.push(StreamRange { start, end: end.min(size - 1) });
            }
            (Some(start), None) => {
                resolved.push(StreamRange { start, end: size - 1 });
            }
            (None, Some(suffix_len)) => {
                if suffix_len == 0 {
                    continue; // "bytes=-0" requests zero bytes: unsatisfiable, not invalid.
                }
                let start = size.saturating_sub(suffix_len);
                resolved.push(StreamRange { start, end: size - 1 });
            }
            (None, None) => unreachable!("rejected above"),
        }
    }

    if resolved.is_empty() {
        return ParsedRange::Unsatisfiable;
    }

    let combined = combine(resolved);
    if combined.len() > max_ranges {
        return ParsedRange::Invalid;
    }
    ParsedRange::Ok(combined)
}

/// Sorts ascending and merges overlapping or adjacent ranges.
fn combine(mut ranges: SmallVec<[StreamRange; 2]>) -> SmallVec<[StreamRange; 1]> {
    ranges.sort_by_key(|r| r.start);
    let mut out: SmallVec<[StreamRange; 1]> = SmallVec::new();
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdr(s: &str) -> HeaderValue {
        HeaderValue::from_str(s).unwrap()
    }

    #[test]
    fn single_range() {
        match parse(Some(&hdr("bytes=2-5")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(&rs[..], &[StreamRange { start: 2, end: 5 }]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn suffix_range() {
        match parse(Some(&hdr("bytes=-3")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(&rs[..], &[StreamRange { start: 6, end: 8 }]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn open_ended_range() {
        match parse(Some(&hdr("bytes=7-")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(&rs[..], &[StreamRange { start: 7, end: 8 }]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn combines_overlapping_and_adjacent() {
        match parse(Some(&hdr("bytes=1-1,3-")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(
                &rs[..],
                &[StreamRange { start: 1, end: 1 }, StreamRange { start: 3, end: 8 }]
            ),
            other => panic!("unexpected {:?}", other),
        }
        match parse(Some(&hdr("bytes=0-2,2-4")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(&rs[..], &[StreamRange { start: 0, end: 4 }]),
            other => panic!("unexpected {:?}", other),
        }
        match parse(Some(&hdr("bytes=0-2,3-4")), 9, 200) {
            ParsedRange::Ok(rs) => assert_eq!(&rs[..], &[StreamRange { start: 0, end: 4 }]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn beyond_size_is_unsatisfiable() {
        assert_eq!(parse(Some(&hdr("bytes=9-50")), 9, 200), ParsedRange::Unsatisfiable);
    }

    #[test]
    fn malformed_falls_back_to_full() {
        assert_eq!(parse(Some(&hdr("bytes=abc")), 9, 200), ParsedRange::Invalid);
        assert_eq!(parse(Some(&hdr("bytes=")), 9, 200), ParsedRange::Invalid);
    }

    #[test]
    fn non_bytes_unit_is_ignored() {
        assert_eq!(parse(Some(&hdr("items=0-4")), 9, 200), ParsedRange::Invalid);
    }

    #[test]
    fn exceeding_max_ranges_falls_back_to_full() {
        let many = (0..10).map(|i| format!("{}-{}", i * 2, i * 2)).collect::<Vec<_>>().join(",");
        let header = hdr(&format!("bytes={}", many));
        assert_eq!(parse(Some(&header), 100, 5), ParsedRange::Invalid);
    }

    #[test]
    fn no_header_is_invalid_meaning_full_content() {
        assert_eq!(parse(None, 9, 200), ParsedRange::Invalid);
    }
}
