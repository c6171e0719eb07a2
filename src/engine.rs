// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The response engine: the state machine that turns
//! `(reference, request headers, options)` into a [`StreamResponse`] against
//! an abstract [`Storage`] backend. Runs method gating, conditional
//! evaluation, range parsing, and multipart framing, in that order.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::boundary;
use crate::etag;
use crate::range::{self, ParsedRange, StreamRange};
use crate::storage::{DispositionType, Reference, Storage, StorageInfo};
use crate::stream::{DynBody, EmptyStream, MultiStream, Part};

/// A header value override: use the engine-derived default, suppress the
/// header entirely (`Disabled` is a sentinel distinct from an empty string),
/// or force a specific value.
#[derive(Debug, Clone)]
pub enum Override<T> {
    Default,
    Disabled,
    Value(T),
}

impl<T> Default for Override<T> {
    fn default() -> Self {
        Override::Default
    }
}

/// Tunable knobs for [`respond`]: header overrides, allowed methods, range
/// limits, and etag strength.
pub struct ServeOptions {
    pub cache_control: Override<HeaderValue>,
    pub last_modified: Override<HeaderValue>,
    pub etag: Override<HeaderValue>,
    pub content_type: Override<HeaderValue>,
    pub content_disposition_type: Override<DispositionType>,
    pub content_disposition_filename: Override<String>,
    pub status_code: Option<StatusCode>,
    pub allowed_methods: Vec<Method>,
    pub max_ranges: usize,
    pub weak_etags: bool,
    pub default_content_type: HeaderValue,
    /// When true, attaches the error's stable [`StorageError::name`] to
    /// `X-Send-Stream-Error` on 4xx responses, for test assertions.
    pub debug_errors: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        ServeOptions {
            cache_control: Override::Default,
            last_modified: Override::Default,
            etag: Override::Default,
            content_type: Override::Default,
            content_disposition_type: Override::Default,
            content_disposition_filename: Override::Default,
            status_code: None,
            allowed_methods: vec![Method::GET, Method::HEAD],
            max_ranges: 200,
            weak_etags: false,
            default_content_type: HeaderValue::from_static("application/octet-stream"),
            debug_errors: false,
        }
    }
}

/// The prepared response: status, headers, and a body the caller hands to a
/// sink. The storage handle backing it has already been closed by the time
/// this is returned: every branch of [`respond`] closes it before returning.
pub struct StreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: DynBody,
}

fn text_body(headers: &mut HeaderMap, text: &'static str, is_head: bool) -> DynBody {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=UTF-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(text.len()));
    if is_head {
        Box::pin(EmptyStream::new())
    } else {
        Box::pin(crate::stream::BufferStream::new(Bytes::from_static(text.as_bytes())))
    }
}

fn method_from_headers(method: Option<&Method>, headers: &HeaderMap) -> Option<Method> {
    if let Some(m) = method {
        return Some(m.clone());
    }
    headers
        .get(":method")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Method::from_bytes(s.as_bytes()).ok())
}

fn allow_header_value(allowed: &[Method]) -> HeaderValue {
    let joined = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static("GET, HEAD"))
}

fn apply_override<T: Clone>(opt: &Override<T>, storage_default: Option<T>) -> Option<T> {
    match opt {
        Override::Disabled => None,
        Override::Value(v) => Some(v.clone()),
        Override::Default => storage_default,
    }
}

/// Resolves `reference` against `storage` and produces a [`StreamResponse`]:
/// method gate, open, conditional evaluation, range parsing, then body
/// assembly. Guarantees `close` is called exactly once on every exit path
/// where `open` succeeded.
pub async fn respond<S: Storage>(
    storage: &S,
    reference: Reference,
    request_method: Option<&Method>,
    request_headers: &HeaderMap,
    options: &ServeOptions,
) -> Result<StreamResponse, crate::error::EngineFault> {
    let method = method_from_headers(request_method, request_headers)
        .ok_or(crate::error::EngineFault::MissingMethod)?;
    let is_head = method == Method::HEAD;
    let is_get = method == Method::GET;

    // Step 1: method gate.
    if !options.allowed_methods.iter().any(|m| m == &method) {
        let mut headers = HeaderMap::new();
        headers.insert(header::ALLOW, allow_header_value(&options.allowed_methods));
        let body = text_body(&mut headers, "Method Not Allowed", is_head);
        return Ok(StreamResponse { status: StatusCode::METHOD_NOT_ALLOWED, headers, body });
    }

    // Step 2: open.
    let info = match storage.open(&reference, request_headers).await {
        Ok(info) => info,
        Err(err) => {
            let mut headers = HeaderMap::new();
            if options.debug_errors {
                if let Ok(name) = HeaderValue::from_str(err.name()) {
                    headers.insert(
                        HeaderName::from_static("x-send-stream-error"),
                        name,
                    );
                }
            }
            let phrase = status_phrase(err.status_code());
            let body = text_body(&mut headers, phrase, is_head);
            return Ok(StreamResponse { status: err.status_code(), headers, body });
        }
    };

    // Step 3: header baseline.
    let etag_default = storage.create_etag(&info, options.weak_etags);
    let etag_value = apply_override(&options.etag, etag_default);
    let last_modified_default = storage.create_last_modified(&info);
    let last_modified_value = apply_override(&options.last_modified, last_modified_default);
    let cache_control_default = storage.create_cache_control(&info);
    let cache_control_value = apply_override(&options.cache_control, cache_control_default);
    let content_type_default = content_type_header(&info, &options.default_content_type);
    let content_type_value = apply_override(&options.content_type, Some(content_type_default));
    let disposition_type_default = storage.create_content_disposition_type(&info);
    let disposition_type_value =
        apply_override(&options.content_disposition_type, Some(disposition_type_default));
    let disposition_filename_value =
        apply_override(&options.content_disposition_filename, info.file_name.clone());

    let etag_str = etag_value.as_ref().and_then(|v| v.to_str().ok().map(|s| s.to_string()));
    let last_modified_time = info.mtime;

    let mut baseline = HeaderMap::new();
    if let Some(ref cc) = cache_control_value {
        baseline.insert(header::CACHE_CONTROL, cc.clone());
    }
    if let Some(ref lm) = last_modified_value {
        baseline.insert(header::LAST_MODIFIED, lm.clone());
    }
    if let Some(ref et) = etag_value {
        baseline.insert(header::ETAG, et.clone());
    }
    if let Some(ref vary) = info.vary {
        if let Ok(hv) = HeaderValue::from_str(vary) {
            baseline.insert(header::VARY, hv);
        }
    }

    // Step 3 override: an explicit statusCode bypasses conditional and range
    // evaluation entirely and serves the full body at that status.
    if let Some(forced) = info.status_code_override.or(options.status_code) {
        let mut headers = baseline;
        apply_content_type_and_disposition(
            &mut headers,
            &content_type_value,
            disposition_type_value,
            disposition_filename_value.as_deref(),
        );
        let size = info.size;
        let body = if is_head {
            storage.close(info).await;
            Box::pin(EmptyStream::new()) as DynBody
        } else {
            let stream = storage.create_read_stream(&info, None, false);
            storage.close(info).await;
            stream
        };
        if let Some(size) = size {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        }
        return Ok(StreamResponse { status: forced, headers, body });
    }

    // Step 4: conditional evaluation.
    let fresh = etag::fresh_status(is_get || is_head, request_headers, etag_str.as_deref(), last_modified_time);
    match fresh {
        etag::FreshStatus::NotModified304 => {
            storage.close(info).await;
            return Ok(StreamResponse {
                status: StatusCode::NOT_MODIFIED,
                headers: baseline,
                body: Box::pin(EmptyStream::new()),
            });
        }
        etag::FreshStatus::PreconditionFailed412 => {
            let mut headers = baseline;
            let body = text_body(&mut headers, "Precondition Failed", is_head);
            storage.close(info).await;
            return Ok(StreamResponse { status: StatusCode::PRECONDITION_FAILED, headers, body });
        }
        etag::FreshStatus::Ok200 => {}
    }

    let mut headers = baseline;

    // Step 5: encoding header.
    if let Some(ref enc) = info.content_encoding {
        if enc != "identity" {
            if let Ok(hv) = HeaderValue::from_str(enc) {
                headers.insert(header::CONTENT_ENCODING, hv);
            }
        }
    }

    // Step 6: Content-Type + Content-Disposition.
    apply_content_type_and_disposition(
        &mut headers,
        &content_type_value,
        disposition_type_value,
        disposition_filename_value.as_deref(),
    );

    // Step 7: range evaluation. `Accept-Ranges` reflects server capability
    // regardless of method (HEAD mirrors what a matching GET would report);
    // actual range parsing/serving is still GET-only.
    let ranges_supported = options.max_ranges > 0 && info.size.is_some();
    let range_eligible = is_get && ranges_supported;

    if info.size.is_some() {
        headers.insert(
            header::ACCEPT_RANGES,
            if ranges_supported { HeaderValue::from_static("bytes") } else { HeaderValue::from_static("none") },
        );
    }

    let size = info.size;
    let range_header = request_headers.get(header::RANGE);
    let if_range_fresh = etag::if_range_fresh(
        request_headers.get(header::IF_RANGE),
        etag_str.as_deref(),
        last_modified_time,
    );

    let parsed_range = if range_eligible && if_range_fresh {
        range::parse(range_header, size.unwrap(), options.max_ranges)
    } else {
        ParsedRange::Invalid
    };

    match parsed_range {
        ParsedRange::Unsatisfiable => {
            let mut headers = headers;
            if let Ok(hv) = HeaderValue::from_str(&format!("bytes */{}", size.unwrap())) {
                headers.insert(header::CONTENT_RANGE, hv);
            }
            let body = text_body(&mut headers, "Range Not Satisfiable", is_head);
            storage.close(info).await;
            return Ok(StreamResponse { status: StatusCode::RANGE_NOT_SATISFIABLE, headers, body });
        }
        ParsedRange::Invalid => {
            // Step 8 (full content): HEAD closes storage immediately.
            if let Some(size) = size {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            }
            headers.insert(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
            let body = if is_head {
                storage.close(info).await;
                Box::pin(EmptyStream::new()) as DynBody
            } else {
                let stream = storage.create_read_stream(&info, None, false);
                storage.close(info).await;
                stream
            };
            Ok(StreamResponse { status: StatusCode::OK, headers, body })
        }
        ParsedRange::Ok(ranges) if ranges.len() == 1 => {
            let r = ranges[0];
            let size = size.unwrap();
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(r.len()));
            if let Ok(hv) = HeaderValue::from_str(&format!("bytes {}-{}/{}", r.start, r.end, size)) {
                headers.insert(header::CONTENT_RANGE, hv);
            }
            headers.insert(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
            let body = if is_head {
                storage.close(info).await;
                Box::pin(EmptyStream::new()) as DynBody
            } else {
                let stream = storage.create_read_stream(&info, Some(r), false);
                storage.close(info).await;
                stream
            };
            Ok(StreamResponse { status: StatusCode::PARTIAL_CONTENT, headers, body })
        }
        ParsedRange::Ok(ranges) => {
            let size = size.unwrap();
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let boundary_token = boundary::generate();
            let (parts, total_len) = if is_head {
                (Vec::new(), 0u64)
            } else {
                build_multipart_parts(storage, &info, &ranges, size, &content_type, &boundary_token)
            };
            headers.remove(header::CONTENT_TYPE);
            if let Ok(hv) = HeaderValue::from_str(&format!("multipart/byteranges; boundary={}", boundary_token)) {
                headers.insert(header::CONTENT_TYPE, hv);
            }
            headers.insert(
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
            let body = if is_head {
                storage.close(info).await;
                Box::pin(EmptyStream::new()) as DynBody
            } else {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(total_len));
                let body = MultiStream::new(parts, move || {});
                storage.close(info).await;
                Box::pin(body) as DynBody
            };
            Ok(StreamResponse { status: StatusCode::PARTIAL_CONTENT, headers, body })
        }
    }
}

/// Builds the ordered list of boundary/header/body [`Part`]s for a
/// `multipart/byteranges` response and the exact total byte length, summing
/// each part's header bytes plus `(end - start + 1)` per range.
fn build_multipart_parts<S: Storage>(
    storage: &S,
    info: &StorageInfo<S::Data>,
    ranges: &[StreamRange],
    size: u64,
    content_type: &str,
    boundary_token: &str,
) -> (Vec<Part>, u64) {
    let mut parts = Vec::with_capacity(ranges.len() * 2);
    let mut total: u64 = 0;
    for (idx, r) in ranges.iter().enumerate() {
        let mut header = BytesMut::new();
        if idx > 0 {
            header.put_slice(b"\r\n");
        }
        header.put_slice(b"--");
        header.put_slice(boundary_token.as_bytes());
        header.put_slice(b"\r\n");
        header.put_slice(b"content-type: ");
        header.put_slice(content_type.as_bytes());
        header.put_slice(b"\r\n");
        header.put_slice(format!("content-range: bytes {}-{}/{}\r\n", r.start, r.end, size).as_bytes());
        header.put_slice(b"\r\n");
        let header = header.freeze();
        total += header.len() as u64;
        parts.push(Part::Buffer(header));
        parts.push(Part::Dyn(storage.create_read_stream(info, Some(*r), false)));
        total += r.len();
    }
    let mut trailer = BytesMut::new();
    trailer.put_slice(b"\r\n--");
    trailer.put_slice(boundary_token.as_bytes());
    trailer.put_slice(b"--");
    let trailer = trailer.freeze();
    total += trailer.len() as u64;
    parts.push(Part::Buffer(trailer));
    (parts, total)
}

fn content_type_header<T>(info: &StorageInfo<T>, default_content_type: &HeaderValue) -> HeaderValue {
    let Some(ref mime) = info.mime_type else {
        return default_content_type.clone();
    };
    let with_charset = match info.mime_type_charset.as_deref() {
        Some(cs) => format!("{}; charset={}", mime, cs),
        None if mime.starts_with("text/") || mime == "application/javascript" || mime == "application/json" => {
            format!("{}; charset=UTF-8", mime)
        }
        None => mime.clone(),
    };
    HeaderValue::from_str(&with_charset).unwrap_or_else(|_| default_content_type.clone())
}

/// RFC 6266 `Content-Disposition` header value, ASCII form plus a
/// `filename*=UTF-8''<percent-encoded>` extension when `filename` has
/// non-ASCII bytes. Grounded in `actix-files`/`salvo`'s `NamedFile`
/// disposition building in `other_examples/`.
fn content_disposition_value(disposition_type: DispositionType, filename: Option<&str>) -> HeaderValue {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

    let kind = match disposition_type {
        DispositionType::Inline => "inline",
        DispositionType::Attachment => "attachment",
    };
    let Some(filename) = filename else {
        return HeaderValue::from_static(kind);
    };
    let ascii_fallback: String = filename.chars().map(|c| if c.is_ascii() && c != '"' { c } else { '_' }).collect();
    let mut value = format!("{}; filename=\"{}\"", kind, ascii_fallback);
    if !filename.is_ascii() {
        let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();
        value.push_str(&format!("; filename*=UTF-8''{}", encoded));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(kind))
}

fn apply_content_type_and_disposition(
    headers: &mut HeaderMap,
    content_type_value: &Option<HeaderValue>,
    disposition_type_value: Option<DispositionType>,
    disposition_filename: Option<&str>,
) {
    if let Some(ref ct) = content_type_value {
        headers.insert(header::CONTENT_TYPE, ct.clone());
    }
    if let Some(disposition_type) = disposition_type_value {
        headers.insert(header::CONTENT_DISPOSITION, content_disposition_value(disposition_type, disposition_filename));
    }
}

fn status_phrase(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "Not Found",
        StatusCode::METHOD_NOT_ALLOWED => "Method Not Allowed",
        StatusCode::PRECONDITION_FAILED => "Precondition Failed",
        StatusCode::RANGE_NOT_SATISFIABLE => "Range Not Satisfiable",
        StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fs::{FilesystemStorage, OnDirectory};
    use http_body_util::BodyExt;

    async fn serve(
        storage: &FilesystemStorage,
        path: &str,
        method: Method,
        headers: HeaderMap,
    ) -> StreamResponse {
        let options = ServeOptions::default();
        respond(storage, Reference::Path(path.to_string()), Some(&method), &headers, &options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_get_returns_200_with_etag_and_accept_ranges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let resp = serve(&storage, "/nums.txt", Method::GET, HeaderMap::new()).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers.get(header::CONTENT_LENGTH).unwrap(), "9");
        assert_eq!(resp.headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");
        assert!(resp.headers.get(header::ETAG).is_some());
        let body = resp.body.collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"123456789");
    }

    #[tokio::test]
    async fn single_range_returns_206() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=2-5"));
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers.get(header::CONTENT_RANGE).unwrap(), "bytes 2-5/9");
        let body = resp.body.collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"3456");
    }

    #[tokio::test]
    async fn multi_range_returns_multipart_byteranges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=1-1,3-"));
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::PARTIAL_CONTENT);
        let ct = resp.headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
        assert!(ct.starts_with("multipart/byteranges; boundary="));
        let boundary = ct.strip_prefix("multipart/byteranges; boundary=").unwrap().to_string();
        let body = resp.body.collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert_eq!(text.matches(&format!("--{}", boundary)).count(), 3);
        assert!(text.contains("bytes 1-1/9"));
        assert!(text.contains("bytes 3-8/9"));
        assert!(text.contains('2'));
        assert!(text.contains("456789"));
    }

    #[tokio::test]
    async fn range_beyond_size_is_416() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=9-50"));
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers.get(header::CONTENT_RANGE).unwrap(), "bytes */9");
    }

    #[tokio::test]
    async fn non_bytes_unit_range_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("items=0-4"));
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.body.collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"123456789");
    }

    #[tokio::test]
    async fn missing_resource_is_404_with_status_phrase_body() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let resp = serve(&storage, "/missing", Method::GET, HeaderMap::new()).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let body = resp.body.collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Not Found");
        assert_eq!(resp.headers.get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=UTF-8");
    }

    #[tokio::test]
    async fn post_with_default_methods_is_405() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let resp = serve(&storage, "/nums.txt", Method::POST, HeaderMap::new()).await;
        assert_eq!(resp.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers.get(header::ALLOW).unwrap(), "GET, HEAD");
    }

    #[tokio::test]
    async fn if_none_match_returns_304_without_content_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let first = serve(&storage, "/nums.txt", Method::GET, HeaderMap::new()).await;
        let etag = first.headers.get(header::ETAG).unwrap().clone();
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, etag);
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::NOT_MODIFIED);
        assert!(resp.headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn if_match_wrong_etag_is_412() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nums.txt"), b"123456789").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("\"wrong\""));
        let resp = serve(&storage, "/nums.txt", Method::GET, headers).await;
        assert_eq!(resp.status, StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn path_traversal_is_404_not_normalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pets")).unwrap();
        std::fs::write(dir.path().join("name.txt"), b"x").unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let resp = serve(&storage, "/pets/../name.txt", Method::GET, HeaderMap::new()).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_listing_has_no_cache_control() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), b"a").unwrap();
        let storage = FilesystemStorage::new(dir.path()).with_on_directory(OnDirectory::ListFiles);
        let resp = serve(&storage, "/sub", Method::GET, HeaderMap::new()).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert!(resp.headers.get(header::CACHE_CONTROL).is_none());
    }
}
