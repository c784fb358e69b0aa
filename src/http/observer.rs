//! Response observation.
//!
//! # Responsibilities
//! - Record the status of the response head handed to the server
//! - Count body bytes actually yielded to the server
//! - Signal completion exactly once (end of stream, body error, or drop)
//!
//! # Design Decisions
//! - `ObservedBody` is a pass-through `http_body::Body`: same data and error
//!   types, frames forwarded untouched, no buffering
//! - Only data frames count towards the size; trailers do not
//! - A body dropped early (client disconnect) still completes, reporting the
//!   bytes sent so far

use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::http::StatusCode;
use bytes::Buf;
use hyper::body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;

/// Status and size observed for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseStats {
    status: StatusCode,
    bytes_written: u64,
}

impl Default for ResponseStats {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            bytes_written: 0,
        }
    }
}

impl ResponseStats {
    /// Record the response status. The last call wins.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Add bytes accepted downstream.
    pub fn record_written(&mut self, n: usize) {
        self.bytes_written += n as u64;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

type OnComplete = Box<dyn FnOnce(ResponseStats) + Send + Sync>;

/// Fires the completion callback once, at the latest when dropped.
struct Completion {
    stats: ResponseStats,
    callback: Option<OnComplete>,
}

impl Completion {
    fn fire(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self.stats);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.fire();
    }
}

pin_project! {
    /// Response body decorator that observes the bytes handed to the server.
    pub struct ObservedBody<B> {
        #[pin]
        inner: B,
        completion: Completion,
    }
}

impl<B> ObservedBody<B> {
    pub fn new(inner: B, stats: ResponseStats) -> Self {
        Self {
            inner,
            completion: Completion {
                stats,
                callback: None,
            },
        }
    }

    /// Run `f` with the final stats once the body finishes, fails or is dropped.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ResponseStats) + Send + Sync + 'static,
    {
        self.completion.callback = Some(Box::new(f));
        self
    }

    /// Stats observed so far.
    pub fn stats(&self) -> &ResponseStats {
        &self.completion.stats
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }
}

impl<B> Body for ObservedBody<B>
where
    B: Body,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));

        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.completion.stats.record_written(data.remaining());
                }
            }
            // Errors pass through unchanged; the count stays at what was yielded.
            Some(Err(_)) | None => this.completion.fire(),
        }

        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: fmt::Debug> fmt::Debug for ObservedBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedBody")
            .field("inner", &self.inner)
            .field("stats", &self.completion.stats)
            .finish()
    }
}
