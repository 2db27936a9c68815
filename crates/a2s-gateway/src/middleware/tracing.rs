//! Per-request tracing spans.
//!
//! Every request runs inside an `api_request` span. Bridged requests can sit
//! in a handler for the whole target deadline, so the span also records the
//! final status and latency once the response is ready.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info_span, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            http.user_agent = user_agent(&req).unwrap_or_default(),
            http.status_code = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;

                let span = Span::current();
                span.record("latency_ms", started.elapsed().as_millis() as u64);
                match &result {
                    Ok(response) => {
                        span.record("http.status_code", response.status().as_u16());
                        debug!(status = response.status().as_u16(), "Request finished");
                    }
                    Err(_) => {
                        debug!("Request failed inside the service stack");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn user_agent<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(axum::http::header::USER_AGENT)?
        .to_str()
        .ok()
}
