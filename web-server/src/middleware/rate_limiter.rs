// web-server/src/middleware/rate_limiter.rs
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    Error, HttpResponse, ResponseError,
};
use common::{ErrorBody, RateLimitConfig};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};

// Drop idle clients every this many checks
const SWEEP_EVERY: usize = 1024;

#[derive(Debug)]
struct RateLimitExceeded {
    retry_after: u64,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Too many requests")
    }
}

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, self.retry_after.to_string()))
            .json(ErrorBody::new(self.to_string()))
    }
}

/// Sliding-window limiter keyed by the TCP peer IP, applied to POSTs on the
/// configured prefixes. Forwarded headers are client-controlled and ignored.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    hits: Arc<DashMap<String, Vec<Instant>>>,
    checks: Arc<AtomicUsize>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            paths,
            max_requests,
            window,
            hits: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.paths.clone(),
            config.max_requests,
            Duration::from_secs(config.window_seconds),
        )
    }

    fn applies_to(&self, method: &Method, path: &str) -> bool {
        method == Method::POST && self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Record a hit; returns seconds until a slot frees when over the limit
    fn check(&self, ip: &str, now: Instant) -> Option<u64> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep(now);
        }

        let mut entry = self.hits.entry(ip.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.max_requests {
            let oldest = entry.first().copied().unwrap_or(now);
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            return Some(wait.as_secs().max(1));
        }

        entry.push(now);
        None
    }

    /// Forget clients with no hits left in the window
    fn sweep(&self, now: Instant) {
        self.hits.retain(|_, hits| {
            hits.retain(|t| now.duration_since(*t) < self.window);
            !hits.is_empty()
        });
    }

    fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.method(), req.path()) {
            let ip = req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            if let Some(retry_after) = self.limiter.check(&ip, Instant::now()) {
                tracing::warn!("Rate limit exceeded for IP: {}", ip);
                return Box::pin(async move { Err(RateLimitExceeded { retry_after }.into()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}
