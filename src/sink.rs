// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The response sink: converts an engine-produced [`StreamResponse`] into an
//! `http::Response` body and observes its completion, wrapping the body
//! rather than reimplementing a server's own write loop.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::Response;
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, warn};

use crate::engine::StreamResponse;
use crate::error::EngineFault;
use crate::stream::{BoxError, DynBody};

/// Observable completion events a sink emits.
pub trait SinkObserver: Send + Sync {
    /// The output (connection/response) was already committed or destroyed
    /// before the body could be written.
    fn response_error(&self, _err: &BoxError) {}
    /// The body stream itself produced an error while being read.
    fn read_error(&self, _err: &BoxError) {}
    /// Both directions finished: the body ended (normally or by error) and
    /// the output was closed. Emitted exactly once.
    fn response_close(&self) {}
}

/// A no-op observer for callers that don't need completion events.
pub struct NoopObserver;
impl SinkObserver for NoopObserver {}

/// Guards a [`StreamResponse`] against being sent more than once.
pub struct ResponseSink {
    sent: AtomicBool,
}

impl ResponseSink {
    pub fn new() -> Self {
        ResponseSink { sent: AtomicBool::new(false) }
    }

    /// Consumes `resp` into an `http::Response` whose body is wrapped to
    /// emit completion events to `observer`. Fails with
    /// [`EngineFault::AlreadySent`] if called more than once on the same
    /// sink.
    pub fn send(
        &self,
        resp: StreamResponse,
        observer: Arc<dyn SinkObserver>,
    ) -> Result<Response<DynBody>, EngineFault> {
        if self.sent.swap(true, Ordering::SeqCst) {
            return Err(EngineFault::AlreadySent);
        }
        let mut builder = Response::builder().status(resp.status);
        *builder.headers_mut().expect("status always valid") = resp.headers;
        let body: DynBody = Box::pin(ObservedBody {
            inner: resp.body,
            observer,
            closed: false,
        });
        Ok(builder.body(body).expect("body set exactly once"))
    }
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a [`DynBody`], translating its termination into observer events.
/// `response_close` fires exactly once, whether the body drains normally or
/// is dropped early by a downstream close, the same guaranteed-once shape
/// as [`crate::stream::MultiStream`]'s finalize callback.
struct ObservedBody {
    inner: DynBody,
    observer: Arc<dyn SinkObserver>,
    closed: bool,
}

impl ObservedBody {
    fn close_once(&mut self) {
        if !self.closed {
            self.closed = true;
            self.observer.response_close();
        }
    }
}

impl Body for ObservedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_frame(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                debug!("response body drained");
                this.close_once();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(Some(Err(err))) => {
                warn!(error = %err, "response body read error");
                this.observer.read_error(&err);
                this.close_once();
                Poll::Ready(Some(Err(err)))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        // A downstream close before the body ends drops this wrapper (and,
        // transitively, `inner`, e.g. a `MultiStream`, which runs its own
        // finalize on the same drop) without a final `poll_frame`.
        self.close_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::EmptyStream;
    use http::{HeaderMap, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::atomic::AtomicUsize;

    struct CountingObserver {
        closes: AtomicUsize,
        read_errors: AtomicUsize,
    }

    impl SinkObserver for CountingObserver {
        fn read_error(&self, _err: &BoxError) {
            self.read_errors.fetch_add(1, Ordering::SeqCst);
        }
        fn response_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn drains_and_closes_once() {
        let observer = Arc::new(CountingObserver {
            closes: AtomicUsize::new(0),
            read_errors: AtomicUsize::new(0),
        });
        let sink = ResponseSink::new();
        let resp = StreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Box::pin(EmptyStream::new()),
        };
        let response = sink.send(resp, observer.clone()).unwrap();
        let _ = response.into_body().collect().await.unwrap();
        assert_eq!(observer.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_send_is_already_sent() {
        let sink = ResponseSink::new();
        let observer = Arc::new(NoopObserver);
        let make = || StreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Box::pin(EmptyStream::new()) as DynBody,
        };
        assert!(sink.send(make(), observer.clone()).is_ok());
        assert!(matches!(sink.send(make(), observer), Err(EngineFault::AlreadySent)));
    }

    #[test]
    fn early_drop_still_closes_once() {
        let observer = Arc::new(CountingObserver {
            closes: AtomicUsize::new(0),
            read_errors: AtomicUsize::new(0),
        });
        let body = ObservedBody {
            inner: Box::pin(EmptyStream::new()),
            observer: observer.clone(),
            closed: false,
        };
        drop(body);
        assert_eq!(observer.closes.load(Ordering::SeqCst), 1);
    }
}
