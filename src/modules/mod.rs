// Request pipeline: short-circuiting stages, then forward or tunnel
mod control_plane;
mod forwarder;
mod helpers;
mod throttle;
mod token_bucket;
mod tunnel;

pub use control_plane::{parse_test_name, RateLimitToggle, StartError, END_PATH, START_PATH};
pub use forwarder::Forwarder;
pub use helpers::json_body;
pub use throttle::{http_date, RetryAfterJson, ThrottlePolicy};
pub use token_bucket::TokenBucket;
pub use tunnel::{Tunnel, ESTABLISHED};

use crate::config::Config;
use crate::context::Context;
use crate::error::ProxyError;
use crate::http::{HttpRequest, HttpResponse};
use std::sync::Arc;

pub trait Module: Send + Sync {
    fn name(&self) -> &str;
    /// Return Some(response) to short-circuit, None to continue.
    fn handle(&self, r: &HttpRequest, c: &mut Context) -> Option<HttpResponse>;
}

/// Process-wide state every connection consults. Built once at startup and
/// handed to the stages; nothing else is shared between connections.
#[derive(Clone)]
pub struct Shared {
    pub bucket: Arc<TokenBucket>,
    pub toggle: Arc<RateLimitToggle>,
    pub policy: Arc<dyn ThrottlePolicy>,
}

impl Shared {
    pub fn from_config(cfg: &Config) -> Self {
        Shared {
            bucket: Arc::new(TokenBucket::new(cfg.token_bucket.capacity, cfg.token_bucket.refill_per_second)),
            toggle: Arc::new(RateLimitToggle::new()),
            policy: Arc::new(RetryAfterJson::new(cfg.throttle.retry_after_secs)),
        }
    }
}

pub struct Pipeline {
    mods: Vec<Box<dyn Module>>,
    forwarder: Forwarder,
    tunnel: Tunnel,
}

impl Pipeline {
    pub fn new(forwarder: Forwarder, tunnel: Tunnel) -> Self {
        Pipeline { mods: Vec::new(), forwarder, tunnel }
    }
    pub fn add(&mut self, m: Box<dyn Module>) {
        log::debug!("stage loaded: {}", m.name());
        self.mods.push(m);
    }
    pub fn has_module(&self, name: &str) -> bool {
        self.mods.iter().any(|m| m.name() == name)
    }
    /// Run the stages in order; the first reply wins.
    pub fn handle(&self, r: &HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        self.mods.iter().find_map(|m| m.handle(r, c))
    }
    pub fn forwarder(&self) -> &Forwarder { &self.forwarder }
    pub fn tunnel(&self) -> &Tunnel { &self.tunnel }
}

/// Registration context: pipeline + config + shared state.
pub struct ModuleContext<'a> {
    pub pipeline: &'a mut Pipeline,
    pub config: &'a Config,
    pub shared: &'a Shared,
}

/// Stage order matters: the bucket guards everything, the control plane is
/// answered before the toggle can throttle it.
pub fn register_all(p: &mut Pipeline, cfg: &Config, shared: &Shared) {
    let mut ctx = ModuleContext { pipeline: p, config: cfg, shared };
    token_bucket::register(&mut ctx);
    control_plane::register(&mut ctx);
    throttle::register(&mut ctx);
}

pub fn build_pipeline(cfg: &Config, shared: &Shared) -> Result<Pipeline, ProxyError> {
    let mut p = Pipeline::new(Forwarder::new(&cfg.server)?, Tunnel::new(&cfg.server));
    register_all(&mut p, cfg, shared);
    Ok(p)
}
