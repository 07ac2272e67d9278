// Process-wide token bucket guarding every connection
use super::{helpers as h, Module};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub fn register(ctx: &mut super::ModuleContext) {
    if !ctx.config.token_bucket.enabled {
        log::warn!("token bucket disabled");
        return;
    }
    ctx.pipeline.add(Box::new(BucketGate { bucket: Arc::clone(&ctx.shared.bucket) }));
}

/// Classic token bucket. Refill and deduction happen under one lock, so
/// concurrent callers observe a linearizable sequence of `consume` calls.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        TokenBucket {
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    pub fn capacity(&self) -> f64 { self.capacity }
    pub fn refill_rate(&self) -> f64 { self.refill_per_sec }

    pub fn consume(&self, n: f64) -> bool {
        self.consume_at(n, Instant::now())
    }

    /// Refill for the time elapsed up to `now`, then take `n` tokens if they
    /// are all there. On failure the (refilled) balance is left untouched.
    pub fn consume_at(&self, n: f64, now: Instant) -> bool {
        let mut s = h::lock(&self.state, "token_bucket");
        let elapsed = now.saturating_duration_since(s.last_refill).as_secs_f64();
        s.tokens = (s.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        if now > s.last_refill {
            s.last_refill = now;
        }
        if s.tokens >= n {
            s.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Current balance, without refilling.
    pub fn tokens(&self) -> f64 {
        h::lock(&self.state, "token_bucket").tokens
    }
}

struct BucketGate {
    bucket: Arc<TokenBucket>,
}

impl Module for BucketGate {
    fn name(&self) -> &str { "token_bucket" }
    fn handle(&self, r: &HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        if self.bucket.consume(1.0) {
            return None;
        }
        log::warn!(
            "token bucket empty ({:.2} left), dropping {} {} from {}",
            self.bucket.tokens(), r.method, r.target, c.peer
        );
        Some(HttpResponse::status_only(429))
    }
}
