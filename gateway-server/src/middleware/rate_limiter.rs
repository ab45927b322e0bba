// gateway-server/src/middleware/rate_limiter.rs
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse,
};
use common::RateLimitConfig;
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde_json::json;

/// Per-IP sliding window over the configured path prefixes.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Arc<Vec<String>>,
    max_requests: usize,
    window: Duration,
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            paths: Arc::new(config.paths.clone()),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            hits: Arc::new(DashMap::new()),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Record a hit for `ip`. `Some(retry_after)` when over the limit.
    fn check(&self, ip: &str, now: Instant) -> Option<Duration> {
        let mut hits = self.hits.entry(ip.to_string()).or_insert_with(VecDeque::new);
        while hits.front().map_or(false, |t| now.duration_since(*t) >= self.window) {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            let oldest = hits.front().copied().unwrap_or(now);
            return Some(self.window.saturating_sub(now.duration_since(oldest)));
        }
        hits.push_back(now);
        None
    }

    /// Drop clients with no hits inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.hits
            .retain(|_, hits| hits.back().map_or(false, |t| now.duration_since(*t) < window));
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
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
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if let Some(retry_after) = self.limiter.check(&ip, Instant::now()) {
                tracing::warn!("Rate limit exceeded for IP: {} on {}", ip, req.path());
                let secs = retry_after.as_secs().max(1);
                let response = HttpResponse::TooManyRequests()
                    .insert_header((header::RETRY_AFTER, secs.to_string()))
                    .json(json!({ "error": "rate limit exceeded" }));
                return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
