// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP-date formatting and parsing (RFC 7231 section 7.1.1.1).
//!
//! Thin wrapper over [`httpdate`], kept as its own module so the engine and
//! `storage` defaults share one parsing policy: unparseable dates are always
//! treated as absent, never as a hard error.

use std::time::SystemTime;

use http::header::HeaderValue;

/// Formats a [`SystemTime`] as an RFC 7231 HTTP-date header value.
pub fn format(t: SystemTime) -> HeaderValue {
    // httpdate always produces ASCII IMF-fixdate text.
    HeaderValue::from_str(&httpdate::fmt_http_date(t)).expect("httpdate output is valid ASCII")
}

/// Parses a header value as an HTTP-date. Returns `None` on any parse
/// failure rather than an error: unparseable dates are treated as absent
/// and never trigger a conditional match.
pub fn parse(v: &HeaderValue) -> Option<SystemTime> {
    let s = v.to_str().ok()?;
    httpdate::parse_http_date(s).ok()
}
