// Test-controlled rate-limit toggle and its two control endpoints
use super::{helpers as h, Module};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse, Target};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const START_PATH: &str = "/start_rate_limiting";
pub const END_PATH: &str = "/end_rate_limiting";

pub fn register(ctx: &mut super::ModuleContext) {
    ctx.pipeline.add(Box::new(ControlPlane { toggle: Arc::clone(&ctx.shared.toggle) }));
}

/// On/off switch for simulated throttling. The test name is present exactly
/// when throttling is on, so both live in one `Option`.
#[derive(Default)]
pub struct RateLimitToggle {
    active_test: Mutex<Option<String>>,
}

impl RateLimitToggle {
    pub fn new() -> Self {
        RateLimitToggle::default()
    }

    /// Turn throttling on for `test_name`. Returns the test it replaced.
    pub fn start(&self, test_name: &str) -> Option<String> {
        h::lock(&self.active_test, "rate_limit_toggle").replace(test_name.to_string())
    }

    /// Turn throttling off. Returns the test that was active, if any.
    pub fn end(&self) -> Option<String> {
        h::lock(&self.active_test, "rate_limit_toggle").take()
    }

    pub fn active_test(&self) -> Option<String> {
        h::lock(&self.active_test, "rate_limit_toggle").clone()
    }
}

/// Why a start request was refused. The messages are part of the wire
/// contract.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StartError {
    #[error("Request body is missing or empty")]
    MissingBody,
    #[error("Invalid JSON in request body")]
    InvalidJson,
    #[error("'test_name' is missing or not a string")]
    MissingTestName,
}

pub fn parse_test_name(body: &[u8]) -> Result<String, StartError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(StartError::MissingBody);
    }
    let v: serde_json::Value = serde_json::from_slice(body).map_err(|_| StartError::InvalidJson)?;
    match v.get("test_name").and_then(serde_json::Value::as_str) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(StartError::MissingTestName),
    }
}

fn error_reply(code: u16, msg: &str) -> HttpResponse {
    HttpResponse::json(code, h::json_body("error", msg))
}

struct ControlPlane {
    toggle: Arc<RateLimitToggle>,
}

impl ControlPlane {
    fn route(&self, r: &HttpRequest) -> HttpResponse {
        let path = r.path();
        if path != START_PATH && path != END_PATH {
            return error_reply(404, "Endpoint not found");
        }
        if r.method != "POST" {
            return error_reply(405, "Only POST method is allowed");
        }
        if path == START_PATH {
            self.start(&r.body)
        } else {
            self.end()
        }
    }

    fn start(&self, body: &[u8]) -> HttpResponse {
        let name = match parse_test_name(body) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("start_rate_limiting rejected: {e}");
                return error_reply(400, &e.to_string());
            }
        };
        match self.toggle.start(&name) {
            Some(prev) => log::info!("Rate limiting started for test: {name} (replaces {prev})"),
            None => log::info!("Rate limiting started for test: {name}"),
        }
        let status = format!("rate limiting started for test: {name}");
        HttpResponse::json(200, h::json_body("status", &status))
    }

    fn end(&self) -> HttpResponse {
        match self.toggle.end() {
            Some(name) => log::info!("Rate limiting ended for test: {name}"),
            None => log::info!("Rate limiting ended (was not active)"),
        }
        HttpResponse::json(200, h::json_body("status", "rate limiting ended"))
    }
}

impl Module for ControlPlane {
    fn name(&self) -> &str { "control_plane" }
    fn handle(&self, r: &HttpRequest, _: &mut Context) -> Option<HttpResponse> {
        if r.target_form() != Target::Origin {
            return None;
        }
        Some(self.route(r))
    }
}
