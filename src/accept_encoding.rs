// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Accept-Encoding` negotiation over a fixed set of pre-computed variants:
//! a full ranked preference list over an arbitrary set of server-offered
//! encodings, rather than a single yes/no gate.

use std::str::FromStr;

use http::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};

/// Parses an RFC 7231 section 5.3.1 `qvalue` into an integer in `[0, 1000]`.
fn parse_qvalue(s: &str) -> Result<u16, ()> {
    match s {
        "1" | "1." | "1.0" | "1.00" | "1.000" => return Ok(1000),
        "0" | "0." => return Ok(0),
        s if !s.starts_with("0.") => return Err(()),
        _ => {}
    };
    let v = &s[2..];
    let factor = match v.len() {
        1 => 100,
        2 => 10,
        3 => 1,
        _ => return Err(()),
    };
    let v = u16::from_str(v).map_err(|_| ())?;
    Ok(v * factor)
}

fn canonicalize(token: &str) -> &str {
    match token {
        "x-gzip" => "gzip",
        "x-compress" => "compress",
        other => other,
    }
}

/// One accept-encoding entry after parsing: a lowercase, canonicalized
/// coding token and its weight (0..=1000). `q=0` entries are dropped before
/// this point except `identity`.
#[derive(Debug, Clone)]
struct Preference {
    token: String,
    weight: u16,
}

/// Parses an `Accept-Encoding` header into ranked preferences. A missing or
/// empty header means "accept identity only". `*` expands, at its own
/// weight, to every name in `server_encodings` not already listed
/// explicitly.
fn parse(headers: &HeaderMap, server_encodings: &[&str]) -> Vec<Preference> {
    let Some(hdr) = headers.get(ACCEPT_ENCODING) else {
        return vec![Preference { token: "identity".into(), weight: 1000 }];
    };
    let Ok(s) = hdr.to_str() else {
        return vec![Preference { token: "identity".into(), weight: 1000 }];
    };
    if s.trim().is_empty() {
        return vec![Preference { token: "identity".into(), weight: 1000 }];
    }

    let mut star: Option<u16> = None;
    let mut explicit: Vec<Preference> = Vec::new();
    let mut identity_q0_explicit = false;

    for entry in s.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.splitn(2, ';');
        let lower = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let token = canonicalize(lower.trim()).to_string();
        let weight = match parts.next() {
            None => 1000,
            Some(q) => {
                let q = q.trim();
                let q = q.strip_prefix("q=").unwrap_or(q);
                parse_qvalue(q.trim()).unwrap_or(1000)
            }
        };

        if token == "*" {
            star = Some(weight);
            continue;
        }
        if weight == 0 && token != "identity" {
            continue; // explicit q=0 removes a non-identity coding.
        }
        if token == "identity" && weight == 0 {
            identity_q0_explicit = true;
        }
        explicit.push(Preference { token, weight });
    }

    if let Some(star_weight) = star {
        for name in server_encodings {
            let name = canonicalize(name);
            if explicit.iter().any(|p| p.token == name) {
                continue;
            }
            explicit.push(Preference { token: name.to_string(), weight: star_weight });
        }
        if !explicit.iter().any(|p| p.token == "identity") && !identity_q0_explicit {
            explicit.push(Preference { token: "identity".into(), weight: star_weight });
        }
    }

    // identity;q=0 with no matching `*` still results in identity being
    // served: drop it from the ranked list rather than treat it as "not
    // acceptable". Callers see no encoding selected and fall back to identity.
    explicit.retain(|p| !(p.token == "identity" && p.weight == 0));

    explicit.sort_by(|a, b| b.weight.cmp(&a.weight));
    explicit
}

/// Returns the highest-preference encoding from `server_encodings` (in the
/// caller's own preference order for ties) that the client accepts, or
/// `None` if only `identity` (or nothing) is acceptable.
pub fn negotiate(headers: &HeaderMap, server_encodings: &[&str]) -> Option<String> {
    let prefs = parse(headers, server_encodings);
    for pref in &prefs {
        if pref.token == "identity" {
            continue;
        }
        if server_encodings.iter().any(|e| canonicalize(e) == pref.token) {
            return Some(pref.token.clone());
        }
    }
    None
}

/// All encodings from `server_encodings` the client accepts at all (weight
/// > 0), in the client's preference order. Used by filesystem storage's
/// pre-compressed variant selection, which then re-ranks by the *mapping's
/// own* configured preference order rather than the client's.
pub fn acceptable(headers: &HeaderMap, server_encodings: &[&str]) -> Vec<String> {
    parse(headers, server_encodings)
        .into_iter()
        .filter(|p| p.token != "identity")
        .map(|p| p.token)
        .collect()
}

pub fn vary_header_value() -> HeaderValue {
    HeaderValue::from_static("Accept-Encoding")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdrs(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ACCEPT_ENCODING, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn missing_header_is_identity_only() {
        assert_eq!(negotiate(&HeaderMap::new(), &["gzip", "br"]), None);
    }

    #[test]
    fn picks_highest_weight() {
        assert_eq!(
            negotiate(&hdrs("gzip;q=0.5, br;q=0.9"), &["gzip", "br"]),
            Some("br".to_string())
        );
    }

    #[test]
    fn q0_removes_encoding() {
        assert_eq!(negotiate(&hdrs("gzip;q=0"), &["gzip"]), None);
    }

    #[test]
    fn star_expands_to_unlisted_server_encodings() {
        assert_eq!(negotiate(&hdrs("*"), &["br"]), Some("br".to_string()));
    }

    #[test]
    fn x_gzip_folds_to_gzip() {
        assert_eq!(negotiate(&hdrs("x-gzip"), &["gzip"]), Some("gzip".to_string()));
    }

    #[test]
    fn empty_header_means_identity_only() {
        assert_eq!(negotiate(&hdrs(""), &["gzip"]), None);
    }
}
