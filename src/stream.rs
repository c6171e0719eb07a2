// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Stream primitives: `EmptyStream`, `BufferStream`, and `MultiStream`, built
//! directly on [`http_body::Body`] so the engine can hand a body straight to
//! the sink.
//!
//! `MultiStream` is a single reusable owning type holding an ordered queue
//! of children plus a finalize callback that runs exactly once on every
//! termination path, whether drained normally or dropped early.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// Boxed body error type shared by every stream primitive and by
/// [`crate::storage::Storage`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed, pinned body producing `Bytes` frames, as returned by
/// [`crate::storage::Storage::create_read_stream`]. `Send` only: a body may
/// own an in-flight future (e.g. an open-file future) that is not `Sync`,
/// and neither hyper nor `http_body` requires more than `Send`.
pub type DynBody = Pin<Box<dyn Body<Data = Bytes, Error = BoxError> + Send>>;

/// Produces no bytes and ends immediately on first poll. Used for HEAD,
/// 1xx/204/304 responses, and any other branch that must carry an empty
/// body.
#[derive(Debug, Default)]
pub struct EmptyStream {
    ended: bool,
}

impl EmptyStream {
    pub fn new() -> Self {
        EmptyStream { ended: false }
    }
}

impl Body for EmptyStream {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        self.ended = true;
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        true
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(0)
    }
}

/// Wraps a single byte buffer: one data frame, then end. Used for status-
/// phrase error bodies and for multipart boundary/header fragments.
#[derive(Debug)]
pub struct BufferStream(Option<Bytes>);

impl BufferStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        BufferStream(Some(data.into()))
    }
}

impl Body for BufferStream {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        Poll::Ready(self.0.take().map(|b| Ok(Frame::data(b))))
    }

    fn is_end_stream(&self) -> bool {
        self.0.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.0.as_ref().map(|b| b.len() as u64).unwrap_or(0))
    }
}

/// One source a [`MultiStream`] plays back, in order: an in-memory buffer
/// (multipart boundary/header text) or a storage-produced stream for a
/// specific byte range.
pub enum Part {
    Buffer(Bytes),
    Dyn(DynBody),
}

impl From<Bytes> for Part {
    fn from(b: Bytes) -> Self {
        Part::Buffer(b)
    }
}

impl From<Vec<u8>> for Part {
    fn from(v: Vec<u8>) -> Self {
        Part::Buffer(Bytes::from(v))
    }
}

/// Plays back an ordered sequence of [`Part`]s as one body, invoking a
/// user-supplied finalize callback exactly once when the stream is fully
/// drained *or* dropped early (downstream close, error, or panic unwind).
///
/// Only the current child is "live"; children are produced from an owned
/// queue rather than captured by a closure, so the whole chain can be torn
/// down deterministically at any point.
pub struct MultiStream {
    pending: VecDeque<Part>,
    current: Option<DynBody>,
    finalize: Option<Box<dyn FnOnce() + Send>>,
    errored: bool,
}

impl MultiStream {
    pub fn new(parts: impl IntoIterator<Item = Part>, on_finalize: impl FnOnce() + Send + 'static) -> Self {
        MultiStream {
            pending: parts.into_iter().collect(),
            current: None,
            finalize: Some(Box::new(on_finalize)),
            errored: false,
        }
    }

    fn run_finalize(&mut self) {
        if let Some(f) = self.finalize.take() {
            f();
        }
    }
}

impl Body for MultiStream {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        if this.errored {
            this.run_finalize();
            return Poll::Ready(None);
        }
        loop {
            if this.current.is_none() {
                match this.pending.pop_front() {
                    None => {
                        this.run_finalize();
                        return Poll::Ready(None);
                    }
                    Some(Part::Buffer(b)) => {
                        this.current = Some(Box::pin(BufferStream::new(b)));
                    }
                    Some(Part::Dyn(body)) => {
                        this.current = Some(body);
                    }
                }
            }
            let body = this.current.as_mut().expect("just set above");
            match body.as_mut().poll_frame(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(frame))) => return Poll::Ready(Some(Ok(frame))),
                Poll::Ready(Some(Err(e))) => {
                    // Error in any child propagates; the remainder is dropped.
                    this.current = None;
                    this.pending.clear();
                    this.errored = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.current = None; // advance to the next part.
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}

impl Drop for MultiStream {
    fn drop(&mut self) {
        // Downstream close or a panic unwinding through the sink both drop
        // the body without a final `poll_frame`; the finalize must still
        // run exactly once.
        self.run_finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let body = EmptyStream::new();
        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes().len(), 0);
    }

    #[tokio::test]
    async fn buffer_stream_yields_once() {
        let body = BufferStream::new(Bytes::from_static(b"hello"));
        let collected = body.collect().await.unwrap();
        assert_eq!(&collected.to_bytes()[..], b"hello");
    }

    #[tokio::test]
    async fn multi_stream_concatenates_in_order_and_finalizes_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let parts = vec![
            Part::Buffer(Bytes::from_static(b"a")),
            Part::Buffer(Bytes::from_static(b"b")),
            Part::Dyn(Box::pin(BufferStream::new(Bytes::from_static(b"c")))),
        ];
        let body = MultiStream::new(parts, move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let collected = body.collect().await.unwrap();
        assert_eq!(&collected.to_bytes()[..], b"abc");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multi_stream_finalizes_on_early_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let body = MultiStream::new(
            vec![Part::Buffer(Bytes::from_static(b"a"))],
            move || {
                count2.fetch_add(1, Ordering::SeqCst);
            },
        );
        drop(body);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
