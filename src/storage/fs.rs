// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Filesystem storage: path validation, root join, pre-compressed variant
//! selection, and directory handling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderMap;
use percent_encoding::percent_decode_str;

use crate::accept_encoding;
use crate::error::{PathError, StorageError};
use crate::range::StreamRange;
use crate::storage::{DispositionType, Reference, Storage, StorageInfo};
use crate::stream::{BufferStream, DynBody};

/// How a resolved directory is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDirectory {
    Error,
    ListFiles,
}

/// A single pre-compressed representation of a logical resource: `name` is
/// the `Content-Encoding` token, `suffix` is appended to the resolved
/// identity path to find the variant file (e.g. `.br`, `.gz`).
#[derive(Debug, Clone)]
pub struct EncodingVariant {
    pub name: String,
    pub suffix: String,
}

/// One entry of a [`FilesystemStorage`]'s encoding mappings: a matcher over
/// the resolved identity path plus an ordered list of variants to try,
/// highest-preference first.
pub struct ContentEncodingMapping {
    matches: Box<dyn Fn(&Path) -> bool + Send + Sync>,
    pub encodings: Vec<EncodingVariant>,
}

impl ContentEncodingMapping {
    /// Matches any path whose file name ends with `suffix` (e.g. `.js`).
    pub fn by_suffix(suffix: impl Into<String>, encodings: Vec<EncodingVariant>) -> Self {
        let suffix = suffix.into();
        ContentEncodingMapping {
            matches: Box::new(move |p| p.to_string_lossy().ends_with(&suffix)),
            encodings,
        }
    }

    /// Matches every path; useful as a catch-all final mapping.
    pub fn any(encodings: Vec<EncodingVariant>) -> Self {
        ContentEncodingMapping { matches: Box::new(|_| true), encodings }
    }
}

/// What `create_read_stream` needs to reproduce a resource: a concrete
/// filesystem path and whether it's a synthesized directory listing.
#[derive(Debug, Clone)]
pub enum FsData {
    File(PathBuf),
    Directory { entries: Vec<String> },
}

fn default_ignore(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some('.') => chars.next().is_some_and(|c| c != '.'),
        _ => false,
    }
}

/// Percent-decodes and splits a [`Reference`] into raw (not yet validated)
/// path segments, stripping any query string or fragment first.
fn decode_segments(reference: &Reference) -> Result<Vec<String>, PathError> {
    match reference {
        Reference::Segments(segs) => Ok(segs.clone()),
        Reference::Path(path) => {
            let path = path.split(['?', '#']).next().unwrap_or("");
            let path = path.strip_prefix('/').unwrap_or(path);
            path.split('/')
                .map(|seg| {
                    percent_decode_str(seg)
                        .decode_utf8()
                        .map(|s| s.into_owned())
                        .map_err(|_| PathError::MalformedPath)
                })
                .collect()
        }
    }
}

/// Validates decoded path segments, in the order a careful implementation
/// should check them: forbidden bytes and embedded separators first
/// (cheapest, most dangerous), then normalization, then slash bookkeeping,
/// then the ignore pattern.
fn validate_segments(
    segments: &[String],
    ignore_pattern: &(dyn Fn(&str) -> bool + Send + Sync),
) -> Result<(), PathError> {
    for seg in segments {
        if seg.contains('\0') {
            return Err(PathError::ForbiddenCharacter);
        }
        if seg.contains('/') || seg.contains('\\') {
            return Err(PathError::InvalidPath);
        }
    }
    if segments.iter().any(|s| s == "." || s == "..") {
        return Err(PathError::NotNormalized);
    }
    if segments.len() > 1 && segments[..segments.len() - 1].iter().any(|s| s.is_empty()) {
        return Err(PathError::ConsecutiveSlashes);
    }
    if segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
        return Err(PathError::TrailingSlash);
    }
    if segments.iter().any(|s| ignore_pattern(s)) {
        return Err(PathError::IgnoredFile);
    }
    Ok(())
}

/// Joins validated segments onto `root`. Each segment is pushed as a single
/// path component, never reinterpreted for separators, so this join can
/// never escape `root` even if the validation above were somehow bypassed.
fn join_root(root: &Path, segments: &[String]) -> PathBuf {
    let mut out = root.to_path_buf();
    for seg in segments {
        if !seg.is_empty() {
            out.push(seg);
        }
    }
    out
}

/// Serves a directory tree, selecting among pre-compressed variants and
/// (optionally) rendering a directory listing.
pub struct FilesystemStorage {
    root: PathBuf,
    pub content_encoding_mappings: Vec<ContentEncodingMapping>,
    ignore_pattern: Box<dyn Fn(&str) -> bool + Send + Sync>,
    pub on_directory: OnDirectory,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FilesystemStorage {
            root: root.into(),
            content_encoding_mappings: Vec::new(),
            ignore_pattern: Box::new(default_ignore),
            on_directory: OnDirectory::Error,
        }
    }

    pub fn with_encoding_mappings(mut self, mappings: Vec<ContentEncodingMapping>) -> Self {
        self.content_encoding_mappings = mappings;
        self
    }

    pub fn with_on_directory(mut self, policy: OnDirectory) -> Self {
        self.on_directory = policy;
        self
    }

    pub fn with_ignore_pattern(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.ignore_pattern = Box::new(f);
        self
    }

    fn find_mapping(&self, identity_path: &Path) -> Option<&ContentEncodingMapping> {
        self.content_encoding_mappings.iter().find(|m| (m.matches)(identity_path))
    }

    /// Tries each pre-compressed variant the client accepts, in the
    /// mapping's own preference order, falling back to the identity path.
    async fn select_variant(
        &self,
        identity_path: PathBuf,
        request_headers: &HeaderMap,
    ) -> Result<(PathBuf, std::fs::Metadata, Option<String>), StorageError> {
        if let Some(mapping) = self.find_mapping(&identity_path) {
            let names: Vec<&str> = mapping.encodings.iter().map(|e| e.name.as_str()).collect();
            let accepted = accept_encoding::acceptable(request_headers, &names);
            for variant in &mapping.encodings {
                if !accepted.iter().any(|a| a == &variant.name) {
                    continue;
                }
                let mut candidate = identity_path.clone().into_os_string();
                candidate.push(&variant.suffix);
                let candidate = PathBuf::from(candidate);
                if let Ok(md) = tokio::fs::metadata(&candidate).await {
                    if md.is_file() {
                        return Ok((candidate, md, Some(variant.name.clone())));
                    }
                }
            }
        }
        match tokio::fs::metadata(&identity_path).await {
            Ok(md) => Ok((identity_path, md, None)),
            Err(_) => Err(StorageError::does_not_exist(identity_path.to_string_lossy())),
        }
    }

    async fn list_directory(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::Unknown {
                reference: dir.to_string_lossy().into_owned(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        while let Some(entry) = rd.next_entry().await.map_err(|e| StorageError::Unknown {
            reference: dir.to_string_lossy().into_owned(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if (self.ignore_pattern)(&name) {
                continue;
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }
}

fn render_listing(entries: &[String]) -> Vec<u8> {
    let mut html = String::from("<!DOCTYPE html>\n<html><body><ul>\n");
    for entry in entries {
        let escaped = entry.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
        html.push_str(&format!("<li><a href=\"{escaped}\">{escaped}</a></li>\n"));
    }
    html.push_str("</ul></body></html>\n");
    html.into_bytes()
}

#[async_trait]
impl Storage for FilesystemStorage {
    type Data = FsData;

    async fn open(
        &self,
        reference: &Reference,
        request_headers: &HeaderMap,
    ) -> Result<StorageInfo<FsData>, StorageError> {
        let display = reference.display();
        let segments = decode_segments(reference)
            .map_err(|e| e.into_storage_error(display.clone(), Vec::new()))?;
        validate_segments(&segments, &self.ignore_pattern)
            .map_err(|e| e.into_storage_error(display.clone(), segments.clone()))?;

        let identity_path = join_root(&self.root, &segments);
        let (resolved, metadata, content_encoding) =
            self.select_variant(identity_path, request_headers).await?;

        if metadata.is_dir() {
            return match self.on_directory {
                OnDirectory::Error => Err(StorageError::is_directory(display)),
                OnDirectory::ListFiles => {
                    let entries = self.list_directory(&resolved).await?;
                    let mut info = StorageInfo::new(FsData::Directory { entries });
                    info.mime_type = Some("text/html".to_string());
                    info.no_cache_control = true;
                    Ok(info)
                }
            };
        }

        let mtime = metadata.modified().ok();
        let size = metadata.len();
        let mut info = StorageInfo::new(FsData::File(resolved.clone()));
        info.file_name = resolved.file_name().map(|n| n.to_string_lossy().into_owned());
        info.mtime = mtime;
        info.size = Some(size);
        info.mime_type = mime_guess::from_path(&resolved).first().map(|m| m.essence_str().to_string());
        if let Some(ref enc) = content_encoding {
            info.content_encoding = Some(enc.clone());
            info.vary = Some("Accept-Encoding".to_string());
        }
        Ok(info)
    }

    fn create_read_stream(
        &self,
        info: &StorageInfo<FsData>,
        range: Option<StreamRange>,
        _auto_close: bool,
    ) -> DynBody {
        match &info.attached_data {
            FsData::Directory { entries } => {
                Box::pin(BufferStream::new(Bytes::from(render_listing(entries))))
            }
            FsData::File(path) => {
                let path = path.clone();
                Box::pin(file_stream(path, range))
            }
        }
    }

    async fn close(&self, _info: StorageInfo<FsData>) {
        // Every handle is opened lazily inside `create_read_stream` and
        // closed by that stream itself (`auto_close` semantics); `open`
        // never keeps a file descriptor alive, so there is nothing to
        // release here.
    }
}

/// Bridges a `tokio::fs::File` slice into an [`http_body::Body`], reading in
/// fixed-size chunks until the requested range (or EOF for the whole file)
/// is exhausted.
fn file_stream(path: PathBuf, range: Option<StreamRange>) -> impl http_body::Body<Data = Bytes, Error = crate::stream::BoxError> + Send {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use http_body::{Frame, SizeHint};
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    const CHUNK_SIZE: usize = 64 * 1024;

    enum State {
        Opening(Pin<Box<dyn std::future::Future<Output = std::io::Result<tokio::fs::File>> + Send>>),
        Seeking(Pin<Box<dyn std::future::Future<Output = std::io::Result<tokio::fs::File>> + Send>>),
        Reading { file: tokio::fs::File, remaining: Option<u64> },
        Done,
    }

    struct FileStream {
        state: State,
        start: u64,
        remaining_len: Option<u64>,
    }

    impl http_body::Body for FileStream {
        type Data = Bytes;
        type Error = crate::stream::BoxError;

        fn poll_frame(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
            let this = self.get_mut();
            loop {
                match &mut this.state {
                    State::Opening(fut) => match fut.as_mut().poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => {
                            this.state = State::Done;
                            return Poll::Ready(Some(Err(Box::new(e))));
                        }
                        Poll::Ready(Ok(mut file)) => {
                            if this.start == 0 {
                                this.state = State::Reading { file, remaining: this.remaining_len };
                            } else {
                                let start = this.start;
                                this.state = State::Seeking(Box::pin(async move {
                                    file.seek(std::io::SeekFrom::Start(start)).await?;
                                    Ok(file)
                                }));
                            }
                        }
                    },
                    State::Seeking(fut) => match fut.as_mut().poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => {
                            this.state = State::Done;
                            return Poll::Ready(Some(Err(Box::new(e))));
                        }
                        Poll::Ready(Ok(file)) => {
                            this.state = State::Reading { file, remaining: this.remaining_len };
                        }
                    },
                    State::Reading { file, remaining } => {
                        let want = remaining.map(|r| r.min(CHUNK_SIZE as u64) as usize).unwrap_or(CHUNK_SIZE);
                        if want == 0 {
                            this.state = State::Done;
                            return Poll::Ready(None);
                        }
                        let mut buf = vec![0u8; want];
                        let mut read_buf = tokio::io::ReadBuf::new(&mut buf);
                        match Pin::new(&mut *file).poll_read(cx, &mut read_buf) {
                            Poll::Pending => return Poll::Pending,
                            Poll::Ready(Err(e)) => {
                                this.state = State::Done;
                                return Poll::Ready(Some(Err(Box::new(e))));
                            }
                            Poll::Ready(Ok(())) => {
                                let n = read_buf.filled().len();
                                if n == 0 {
                                    this.state = State::Done;
                                    return Poll::Ready(None);
                                }
                                buf.truncate(n);
                                if let Some(r) = remaining {
                                    *r -= n as u64;
                                }
                                return Poll::Ready(Some(Ok(Frame::data(Bytes::from(buf)))));
                            }
                        }
                    }
                    State::Done => return Poll::Ready(None),
                }
            }
        }

        fn is_end_stream(&self) -> bool {
            matches!(self.state, State::Done)
        }

        fn size_hint(&self) -> SizeHint {
            match self.remaining_len {
                Some(n) => SizeHint::with_exact(n),
                None => SizeHint::default(),
            }
        }
    }

    let (start, len) = match range {
        Some(r) => (r.start, Some(r.len())),
        None => (0, None),
    };
    FileStream {
        state: State::Opening(Box::pin(tokio::fs::File::open(path))),
        start,
        remaining_len: len,
    }
}
