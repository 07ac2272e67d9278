// Simulated upstream 429 while a test has throttling switched on
use super::{helpers as h, Module, RateLimitToggle};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub fn register(ctx: &mut super::ModuleContext) {
    ctx.pipeline.add(Box::new(ToggleGate {
        toggle: Arc::clone(&ctx.shared.toggle),
        policy: Arc::clone(&ctx.shared.policy),
    }));
}

/// Builds the reply a throttled client sees. Swap the implementation to
/// imitate a different upstream's 429 contract.
pub trait ThrottlePolicy: Send + Sync {
    fn throttle_response(&self, now: DateTime<Utc>) -> HttpResponse;
}

/// IMF-fixdate, whole seconds: `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// JSON `detail` body plus an absolute `Retry-After` date.
pub struct RetryAfterJson {
    delay: chrono::Duration,
}

impl RetryAfterJson {
    pub fn new(retry_after_secs: u64) -> Self {
        RetryAfterJson { delay: chrono::Duration::seconds(retry_after_secs.min(86_400) as i64) }
    }
}

impl ThrottlePolicy for RetryAfterJson {
    fn throttle_response(&self, now: DateTime<Utc>) -> HttpResponse {
        let body = h::json_body("detail", "Rate limit exceeded");
        let mut r = HttpResponse::new(429);
        r.headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Retry-After".to_string(), http_date(now + self.delay)),
            ("Connection".to_string(), "close".to_string()),
        ];
        r.body = body.into_bytes();
        r
    }
}

struct ToggleGate {
    toggle: Arc<RateLimitToggle>,
    policy: Arc<dyn ThrottlePolicy>,
}

impl Module for ToggleGate {
    fn name(&self) -> &str { "rate_limit_toggle" }
    fn handle(&self, r: &HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        let test = self.toggle.active_test()?;
        log::info!("Rate limiting active ({test}), answering {} {} from {} with 429", r.method, r.target, c.peer);
        Some(self.policy.throttle_response(Utc::now()))
    }
}
