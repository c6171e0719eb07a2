// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! ETag derivation, matching, and conditional-request evaluation: strong/weak
//! comparison, `If-Match`/`If-None-Match`/`If-Modified-Since`/
//! `If-Unmodified-Since` precedence, and `If-Range` freshness.

use std::time::{Duration, SystemTime};

use http::header::{HeaderMap, HeaderValue};
use http::{self, header};

use crate::date;

/// A strong or weak entity tag, already formatted as the quoted header text
/// (e.g. `"abc123"` or `W/"abc123"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    /// Builds the strong or weak form `"<size-hex>-<mtime*1000-hex>[-<encoding>]"`.
    pub fn derive(size: u64, mtime_ms: u64, encoding: Option<&str>, weak: bool) -> ETag {
        let mut tag = format!("{:x}-{:x}", size, mtime_ms.saturating_mul(1000));
        if let Some(enc) = encoding {
            if enc != "identity" {
                tag.push('-');
                tag.push_str(enc);
            }
        }
        if weak {
            ETag(format!("W/\"{}\"", tag))
        } else {
            ETag(format!("\"{}\"", tag))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.0).expect("derived etag text is valid ASCII")
    }

    fn is_weak(s: &str) -> bool {
        s.starts_with("W/")
    }

    fn strip_weak(s: &str) -> &str {
        s.strip_prefix("W/").unwrap_or(s)
    }
}

/// Strong comparison (RFC 7232 section 2.3.2): both sides must be strong
/// (not `W/`-prefixed) and byte-identical.
pub fn strong_eq(a: &str, b: &str) -> bool {
    !ETag::is_weak(a) && !ETag::is_weak(b) && a == b
}

/// Weak comparison: byte-identical after stripping any leading `W/`.
pub fn weak_eq(a: &str, b: &str) -> bool {
    ETag::strip_weak(a) == ETag::strip_weak(b)
}

fn parse_list(value: &HeaderValue) -> Option<Vec<&str>> {
    let s = value.to_str().ok()?;
    if s.trim() == "*" {
        return Some(vec!["*"]);
    }
    Some(s.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()).collect())
}

/// `If-Match` evaluation: true (passes) if the header is absent, is `*` and a
/// representation exists, or strong-matches the current etag.
pub fn if_match_passes(headers: &HeaderMap, etag: Option<&str>) -> bool {
    let Some(hdr) = headers.get(header::IF_MATCH) else {
        return true;
    };
    let Some(items) = parse_list(hdr) else {
        return true; // unparseable: treat like absent.
    };
    if items.iter().any(|i| *i == "*") {
        return etag.is_some();
    }
    match etag {
        Some(etag) => items.iter().any(|i| strong_eq(i, etag)),
        None => false,
    }
}

/// `If-None-Match` evaluation: true (client's cache is stale, proceed) unless
/// the header is `*` or weak-matches the current etag.
pub fn if_none_match_fails(headers: &HeaderMap, etag: Option<&str>) -> bool {
    let Some(hdr) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Some(items) = parse_list(hdr) else {
        return false;
    };
    if items.iter().any(|i| *i == "*") {
        return etag.is_some();
    }
    match etag {
        Some(etag) => items.iter().any(|i| weak_eq(i, etag)),
        None => false,
    }
}

/// Outcome of conditional-request evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshStatus {
    Ok200,
    NotModified304,
    PreconditionFailed412,
}

/// Evaluates conditional-request precedence:
/// `If-Match` > `If-Unmodified-Since` > `If-None-Match` > `If-Modified-Since`.
pub fn fresh_status(
    is_get_or_head: bool,
    headers: &HeaderMap,
    etag: Option<&str>,
    last_modified: Option<SystemTime>,
) -> FreshStatus {
    if !if_match_passes(headers, etag) {
        return FreshStatus::PreconditionFailed412;
    }
    if headers.get(header::IF_MATCH).is_none() {
        if let (Some(m), Some(since)) = (last_modified, headers.get(header::IF_UNMODIFIED_SINCE)) {
            if let Some(since) = date::parse(since) {
                if m > since {
                    return FreshStatus::PreconditionFailed412;
                }
            }
        }
    }

    if if_none_match_fails(headers, etag) {
        return if is_get_or_head {
            FreshStatus::NotModified304
        } else {
            FreshStatus::PreconditionFailed412
        };
    }
    if is_get_or_head && headers.get(header::IF_NONE_MATCH).is_none() {
        if let (Some(m), Some(since)) = (last_modified, headers.get(header::IF_MODIFIED_SINCE)) {
            if let Some(since) = date::parse(since) {
                if m <= since {
                    return FreshStatus::NotModified304;
                }
            }
        }
    }

    FreshStatus::Ok200
}

/// Margin applied to date-based `If-Range`: the resource must not have been
/// modifiable within this window of `Last-Modified`, since HTTP-date has
/// only one-second resolution.
const IF_RANGE_DATE_MARGIN: Duration = Duration::from_secs(60);

/// Whether a `Range` header should be honored given an `If-Range` header: a
/// strong-etag `If-Range` must byte-equal the current strong etag; a date
/// `If-Range` must equal `Last-Modified` and the current time must be at
/// least 60s past it. Any other outcome, including a weak-etag `If-Range`
/// (which can never strong-match), causes the `Range` header to be ignored.
pub fn if_range_fresh(
    if_range: Option<&HeaderValue>,
    etag: Option<&str>,
    last_modified: Option<SystemTime>,
) -> bool {
    let Some(if_range) = if_range else {
        return true;
    };
    let Ok(raw) = if_range.to_str() else {
        return false;
    };
    if raw.starts_with('"') || raw.starts_with("W/\"") {
        // If-Range with a weak etag never matches: strong comparison only.
        match etag {
            Some(etag) => strong_eq(raw, etag),
            None => false,
        }
    } else {
        let (Some(parsed), Some(lm)) = (httpdate::parse_http_date(raw).ok(), last_modified) else {
            return false;
        };
        parsed == lm && SystemTime::now() >= lm + IF_RANGE_DATE_MARGIN
    }
}
