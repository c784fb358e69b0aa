//! Request logging middleware.
//!
//! Logs one line when a request arrives and one when its response completes:
//!
//! ```text
//! rid=… method=GET uri=/foo ip=10.0.0.5 evt=request.start
//! rid=… status=404 size=9 duration=1.2ms evt=request.end
//! ```
//!
//! Install it after request-id and real-IP resolution so `rid` and `ip` are
//! available. Handlers get the per-request logger through the
//! [`RequestLogger`] extractor, [`RequestLogger::from_request`] or
//! [`RequestLogger::current`].
//!
//! The end line is written when the response body has been fully handed to
//! the server, fails, or is dropped. If the inner service returns an error the
//! end line carries `status=0 size=0 error=true` and the error is returned
//! unchanged. A panic or a cancelled request future produces no end line.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::{Duration, Instant};

use axum::http::{Request, Response};
use hyper::body::Body;
use pin_project_lite::pin_project;
use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};

use crate::config::RequestLogConfig;
use crate::http::context::{self, LoggerSlot};
use crate::http::observer::{ObservedBody, ResponseStats};
use crate::config::LogFormat;
use crate::logger::{sink_from_config, LogSink, RequestLogger, TracingSink, Value};

/// Layer that wraps services with [`RequestLogService`].
#[derive(Clone, Debug)]
pub struct RequestLogLayer {
    logger: RequestLogger,
}

impl RequestLogLayer {
    /// Create the layer. Without a sink, this layer gets its own
    /// timestamped text subscriber on standard output.
    pub fn new(sink: Option<Arc<dyn LogSink>>) -> Self {
        let sink = sink.unwrap_or_else(|| Arc::new(TracingSink::stdout(LogFormat::Logfmt, true)));
        Self {
            logger: RequestLogger::new(sink),
        }
    }

    pub fn with_sink<L: LogSink + 'static>(sink: L) -> Self {
        Self::new(Some(Arc::new(sink)))
    }

    pub fn from_config(config: &RequestLogConfig) -> Self {
        Self::new(Some(sink_from_config(config)))
    }

    /// The base logger requests derive from.
    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }
}

impl Default for RequestLogLayer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            logger: self.logger.clone(),
        }
    }
}

/// Service emitting `request.start` / `request.end` lines around `inner`.
#[derive(Clone, Debug)]
pub struct RequestLogService<S> {
    inner: S,
    logger: RequestLogger,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Body,
{
    type Response = Response<ObservedBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();

        let logger = self
            .logger
            .with("rid", context::request_id(request.extensions()).to_owned());

        logger.log(&[
            ("method", Value::from(request.method())),
            ("uri", Value::from(context::request_uri(&request))),
            ("ip", Value::from(context::client_ip(request.extensions()))),
            ("evt", Value::from("request.start")),
        ]);

        request
            .extensions_mut()
            .insert(LoggerSlot(logger.clone()));

        let inner = &mut self.inner;
        let future = context::sync_scope(logger.clone(), || inner.call(request));

        ResponseFuture {
            inner: context::scope(logger.clone(), future),
            logger,
            start,
        }
    }
}

pin_project! {
    /// Response future of [`RequestLogService`].
    pub struct ResponseFuture<F> {
        #[pin]
        inner: TaskLocalFuture<RequestLogger, F>,
        logger: RequestLogger,
        start: Instant,
    }
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ObservedBody<ResBody>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));
        let start = *this.start;

        match result {
            Ok(response) => {
                let mut stats = ResponseStats::default();
                stats.set_status(response.status());

                let logger = this.logger.clone();
                Poll::Ready(Ok(response.map(|body| {
                    ObservedBody::new(body, stats)
                        .on_complete(move |stats| log_end(&logger, &stats, start.elapsed()))
                })))
            }
            Err(err) => {
                this.logger.log(&[
                    ("status", Value::from(0u16)),
                    ("size", Value::from(0u64)),
                    ("duration", Value::from(start.elapsed())),
                    ("error", Value::from(true)),
                    ("evt", Value::from("request.end")),
                ]);
                Poll::Ready(Err(err))
            }
        }
    }
}

fn log_end(logger: &RequestLogger, stats: &ResponseStats, duration: Duration) {
    logger.log(&[
        ("status", Value::from(stats.status())),
        ("size", Value::from(stats.bytes_written())),
        ("duration", Value::from(duration)),
        ("evt", Value::from("request.end")),
    ]);
}
