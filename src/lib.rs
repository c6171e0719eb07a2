// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A static-content response engine for HTTP/1.1 and HTTP/2: conditional
//! GET/HEAD, byte-range and `multipart/byteranges` serving, and content
//! negotiation over pre-encoded variants, against an abstract [`Storage`]
//! backend.
//!
//! This crate supplies one way to respond to a request: hand [`respond`] a
//! [`Storage`] implementation, a [`Reference`], the request's method and
//! headers, and a [`ServeOptions`]; it returns a [`StreamResponse`] (a
//! status, a header map, and a body) which a [`ResponseSink`] turns into an
//! `http::Response` ready to hand to hyper or any other `http_body::Body`
//! consumer.
//!
//! ```no_run
//! use respond_range::{respond, FilesystemStorage, Reference, ServeOptions};
//!
//! # async fn example() {
//! let storage = FilesystemStorage::new("/srv/www");
//! let headers = http::HeaderMap::new();
//! let resp = respond(
//!     &storage,
//!     Reference::Path("/index.html".to_string()),
//!     Some(&http::Method::GET),
//!     &headers,
//!     &ServeOptions::default(),
//! )
//! .await
//! .expect("request carried a usable method");
//! # let _ = resp;
//! # }
//! ```
//!
//! # Why an abstract `Storage` trait?
//!
//! [`Storage::open`] is the only place I/O happens before headers are known;
//! everything downstream (conditional evaluation, range parsing, multipart
//! framing) is pure header/metadata logic driven off the returned
//! [`StorageInfo`]. A caller who wants in-memory resources, an object store,
//! or a database blob column only needs to implement `open` and
//! `create_read_stream`/`close`; [`FilesystemStorage`] is the one backend
//! this crate ships.

mod accept_encoding;
mod boundary;
mod date;
mod engine;
mod error;
mod etag;
mod range;
mod sink;
mod storage;
mod stream;

pub use crate::engine::{respond, Override, ServeOptions, StreamResponse};
pub use crate::error::{EngineFault, StorageError};
pub use crate::range::StreamRange;
pub use crate::sink::{NoopObserver, ResponseSink, SinkObserver};
pub use crate::storage::fs::{ContentEncodingMapping, EncodingVariant, FilesystemStorage, OnDirectory};
pub use crate::storage::{DispositionType, Reference, Storage, StorageInfo};
pub use crate::stream::{BoxError, BufferStream, DynBody};

pub use accept_encoding::negotiate as negotiate_encoding;
