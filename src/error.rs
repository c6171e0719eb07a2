// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors a [`Storage`](crate::storage::Storage) can fail `open` with, and the
//! engine-internal faults that never reach a client as a status code.

use http::Method;

/// A known, classifiable failure from a storage backend's `open`.
///
/// Every variant carries enough context to reconstruct the client-visible
/// status (via [`StorageError::status_code`]) and a stable debug name (via
/// [`StorageError::name`]) used for the `X-Send-Stream-Error` test header.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no such resource: {reference}")]
    DoesNotExist { reference: String },

    #[error("path has a trailing slash: {reference}")]
    TrailingSlash { reference: String },

    #[error("path contains consecutive slashes: {reference}")]
    ConsecutiveSlashes { reference: String },

    #[error("path is not normalized (contains '.' or '..'): {reference}")]
    NotNormalized { reference: String, parts: Vec<String> },

    #[error("invalid path: {reference}")]
    InvalidPath { reference: String, parts: Vec<String> },

    #[error("malformed percent-encoding in path: {reference}")]
    MalformedPath { reference: String },

    #[error("forbidden character in path: {reference}")]
    ForbiddenCharacter { reference: String },

    #[error("ignored file: {reference}")]
    IgnoredFile { reference: String },

    #[error("resource is a directory: {reference}")]
    IsDirectory { reference: String },

    #[error("method not allowed: {method}")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("precondition failed for: {reference}")]
    PreconditionFailed { reference: String },

    #[error("range not satisfiable for: {reference} (size {size})")]
    RangeNotSatisfiable { reference: String, size: u64 },

    #[error("storage error: {message}")]
    Unknown {
        reference: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// The HTTP status this error maps to when the engine turns it into a
    /// [`StreamResponse`](crate::engine::StreamResponse).
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode as S;
        match self {
            StorageError::DoesNotExist { .. }
            | StorageError::TrailingSlash { .. }
            | StorageError::ConsecutiveSlashes { .. }
            | StorageError::NotNormalized { .. }
            | StorageError::InvalidPath { .. }
            | StorageError::MalformedPath { .. }
            | StorageError::ForbiddenCharacter { .. }
            | StorageError::IgnoredFile { .. }
            | StorageError::IsDirectory { .. } => S::NOT_FOUND,
            StorageError::MethodNotAllowed { .. } => S::METHOD_NOT_ALLOWED,
            StorageError::PreconditionFailed { .. } => S::PRECONDITION_FAILED,
            StorageError::RangeNotSatisfiable { .. } => S::RANGE_NOT_SATISFIABLE,
            StorageError::Unknown { .. } => S::INTERNAL_SERVER_ERROR,
        }
    }

    /// A stable, low-cardinality name suitable for logging and for the
    /// optional `X-Send-Stream-Error` debug header (see
    /// [`ServeOptions::debug_errors`](crate::engine::ServeOptions::debug_errors)).
    pub fn name(&self) -> &'static str {
        match self {
            StorageError::DoesNotExist { .. } => "DoesNotExist",
            StorageError::TrailingSlash { .. } => "TrailingSlash",
            StorageError::ConsecutiveSlashes { .. } => "ConsecutiveSlashes",
            StorageError::NotNormalized { .. } => "NotNormalized",
            StorageError::InvalidPath { .. } => "InvalidPath",
            StorageError::MalformedPath { .. } => "MalformedPath",
            StorageError::ForbiddenCharacter { .. } => "ForbiddenCharacter",
            StorageError::IgnoredFile { .. } => "IgnoredFile",
            StorageError::IsDirectory { .. } => "IsDirectory",
            StorageError::MethodNotAllowed { .. } => "MethodNotAllowed",
            StorageError::PreconditionFailed { .. } => "PreconditionFailed",
            StorageError::RangeNotSatisfiable { .. } => "RangeNotSatisfiable",
            StorageError::Unknown { .. } => "Unknown",
        }
    }

    pub fn does_not_exist(reference: impl Into<String>) -> Self {
        StorageError::DoesNotExist { reference: reference.into() }
    }

    pub fn is_directory(reference: impl Into<String>) -> Self {
        StorageError::IsDirectory { reference: reference.into() }
    }
}

/// A path segment error raised before any I/O is attempted, with enough
/// context to build the matching [`StorageError`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    MalformedPath,
    NotNormalized,
    ConsecutiveSlashes,
    TrailingSlash,
    ForbiddenCharacter,
    InvalidPath,
    IgnoredFile,
}

impl PathError {
    pub fn into_storage_error(self, reference: String, parts: Vec<String>) -> StorageError {
        match self {
            PathError::MalformedPath => StorageError::MalformedPath { reference },
            PathError::NotNormalized => StorageError::NotNormalized { reference, parts },
            PathError::ConsecutiveSlashes => StorageError::ConsecutiveSlashes { reference },
            PathError::TrailingSlash => StorageError::TrailingSlash { reference },
            PathError::ForbiddenCharacter => StorageError::ForbiddenCharacter { reference },
            PathError::InvalidPath => StorageError::InvalidPath { reference, parts },
            PathError::IgnoredFile => StorageError::IgnoredFile { reference },
        }
    }
}

/// A programmer or infrastructure fault: these never become a client-visible
/// status code and are expected to propagate to the caller of the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineFault {
    #[error("no request method available (neither Request::method nor ':method' header)")]
    MissingMethod,

    #[error("response already sent for this StreamResponse")]
    AlreadySent,

    #[error("storage open() returned a StorageInfo violating its contract: {0}")]
    ContractViolation(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
