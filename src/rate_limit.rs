// src/rate_limit.rs

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Seau à jetons global : `burst` requêtes d'affilée au plus, puis
/// `per_second` nouvelles requêtes par seconde.
#[derive(Debug)]
pub struct RateLimiter {
    per_second: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    /// `None` quand l'un des deux réglages vaut 0 : aucune limite.
    pub fn new(per_second: u32, burst: u32) -> Option<Self> {
        if per_second == 0 || burst == 0 {
            return None;
        }

        Some(Self {
            per_second: f64::from(per_second),
            burst: f64::from(burst),
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                refilled_at: Instant::now(),
            }),
        })
    }

    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.burst);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Middleware axum : 429 dès que le seau est vide.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    AppError::RateLimited.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_settings_disable_the_limit() {
        assert!(RateLimiter::new(0, 10).is_none());
        assert!(RateLimiter::new(10, 0).is_none());
    }

    #[test]
    fn burst_is_spent_then_requests_are_refused() {
        let limiter = RateLimiter::new(1, 3).unwrap();

        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn bucket_refills_over_time() {
        let limiter = RateLimiter::new(1000, 1).unwrap();
        assert!(limiter.try_acquire());

        std::thread::sleep(std::time::Duration::from_millis(20));

        assert!(limiter.try_acquire());
    }
}
