// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Abstract storage contract: `Storage::open` resolves a [`Reference`] to an
//! opaque [`StorageInfo`] that the engine drives through
//! `create_read_stream`/`close`, plus defaultable header-derivation hooks a
//! backend can override.

pub mod fs;

use std::time::SystemTime;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue};

use crate::error::StorageError;
use crate::etag::ETag;
use crate::range::StreamRange;
use crate::stream::DynBody;

/// The caller-supplied identifier a [`Storage`] resolves to a concrete
/// resource: either a URL path (parsed, query-stripped, percent-decoded by
/// the storage) or an already-split, already-decoded sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Path(String),
    Segments(Vec<String>),
}

impl Reference {
    /// A human-readable form for error messages; never used for I/O.
    pub fn display(&self) -> String {
        match self {
            Reference::Path(p) => p.clone(),
            Reference::Segments(s) => format!("/{}", s.join("/")),
        }
    }
}

/// `inline` or `attachment` for `Content-Disposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionType {
    Inline,
    Attachment,
}

/// The metadata record returned by [`Storage::open`], owned read-only by the
/// engine from a successful `open` until exactly one `close` call.
///
/// `attached_data` carries whatever a concrete backend needs to later
/// produce a read stream (e.g. a resolved filesystem path); it is opaque to
/// the engine.
#[derive(Debug, Clone)]
pub struct StorageInfo<T> {
    pub attached_data: T,
    pub file_name: Option<String>,
    pub mtime: Option<SystemTime>,
    pub size: Option<u64>,
    pub vary: Option<String>,
    pub content_encoding: Option<String>,
    pub mime_type: Option<String>,
    pub mime_type_charset: Option<String>,
    /// Pre-formatted overrides a backend may supply directly, bypassing the
    /// engine's default derivation from `mtime`/`size`.
    pub last_modified_override: Option<HeaderValue>,
    pub etag_override: Option<HeaderValue>,
    pub cache_control_override: Option<HeaderValue>,
    pub content_disposition_type: Option<DispositionType>,
    pub content_disposition_filename: Option<String>,
    /// Forces `Cache-Control` to be omitted regardless of `cache_control_override`
    /// or the derived default. Set by the filesystem storage's directory
    /// listing, which should never be cached.
    pub no_cache_control: bool,
    /// When set, the engine bypasses conditional and range evaluation
    /// entirely and serves this status with a full body.
    pub status_code_override: Option<http::StatusCode>,
}

impl<T> StorageInfo<T> {
    pub fn new(attached_data: T) -> Self {
        StorageInfo {
            attached_data,
            file_name: None,
            mtime: None,
            size: None,
            vary: None,
            content_encoding: None,
            mime_type: None,
            mime_type_charset: None,
            last_modified_override: None,
            etag_override: None,
            cache_control_override: None,
            content_disposition_type: None,
            content_disposition_filename: None,
            no_cache_control: false,
            status_code_override: None,
        }
    }
}

fn mtime_ms(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Default etag derivation: strong/weak form derived from `size` + `mtime` +
/// `content_encoding`.
pub fn default_etag<T>(info: &StorageInfo<T>, weak: bool) -> Option<HeaderValue> {
    if let Some(ref hv) = info.etag_override {
        return Some(hv.clone());
    }
    let (size, mtime) = (info.size?, info.mtime?);
    let tag = ETag::derive(size, mtime_ms(mtime), info.content_encoding.as_deref(), weak);
    Some(tag.header_value())
}

/// Default `Last-Modified` derivation: formatted from `mtime`, if known.
pub fn default_last_modified<T>(info: &StorageInfo<T>) -> Option<HeaderValue> {
    if let Some(ref hv) = info.last_modified_override {
        return Some(hv.clone());
    }
    info.mtime.map(crate::date::format)
}

/// Default `Cache-Control` derivation: `"public, max-age=0"`.
pub fn default_cache_control<T>(info: &StorageInfo<T>) -> Option<HeaderValue> {
    if info.no_cache_control {
        return None;
    }
    if let Some(ref hv) = info.cache_control_override {
        return Some(hv.clone());
    }
    Some(HeaderValue::from_static("public, max-age=0"))
}

/// Default `Content-Disposition` type: `inline`.
pub fn default_content_disposition_type<T>(info: &StorageInfo<T>) -> DispositionType {
    info.content_disposition_type.unwrap_or(DispositionType::Inline)
}

/// The capability interface the engine drives: `open`/`create_read_stream`/
/// `close`, plus overridable header-derivation hooks. A backend only needs
/// to implement `open` and `create_read_stream`/`close`; the header hooks
/// fall back to sensible defaults and can be overridden per implementation.
#[async_trait]
pub trait Storage: Send + Sync {
    type Data: Send + Sync + 'static;

    /// Resolves `reference` to a [`StorageInfo`], or fails with a typed
    /// [`StorageError`] the engine maps to a status code.
    async fn open(
        &self,
        reference: &Reference,
        request_headers: &HeaderMap,
    ) -> Result<StorageInfo<Self::Data>, StorageError>;

    /// Produces a body for the whole resource (`range = None`) or a single
    /// byte range. `auto_close` means the returned stream owns whatever
    /// handle it needs and must release it itself on end or drop; when
    /// `false`, the handle (if any) is released later via `close`.
    fn create_read_stream(
        &self,
        info: &StorageInfo<Self::Data>,
        range: Option<StreamRange>,
        auto_close: bool,
    ) -> DynBody;

    /// Idempotent release of any handle opened by `open` that was not
    /// transferred to an `auto_close` stream. Called exactly once per
    /// successful `open`, on every exit path.
    async fn close(&self, info: StorageInfo<Self::Data>);

    fn create_etag(&self, info: &StorageInfo<Self::Data>, weak: bool) -> Option<HeaderValue> {
        default_etag(info, weak)
    }

    fn create_last_modified(&self, info: &StorageInfo<Self::Data>) -> Option<HeaderValue> {
        default_last_modified(info)
    }

    fn create_cache_control(&self, info: &StorageInfo<Self::Data>) -> Option<HeaderValue> {
        default_cache_control(info)
    }

    fn create_content_disposition_type(&self, info: &StorageInfo<Self::Data>) -> DispositionType {
        default_content_disposition_type(info)
    }
}
