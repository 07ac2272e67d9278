// Configuration loading and validation
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_LISTEN: &str = "localhost:8004";
pub const DEFAULT_CAPACITY: f64 = 100.0;
pub const DEFAULT_REFILL: f64 = 10.0;
pub const DEFAULT_RETRY_AFTER: u64 = 3;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: Srv,
    pub token_bucket: BucketCfg,
    pub throttle: ThrottleCfg,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Srv {
    pub listen_addr: String,
    pub buffer_size: usize,
    pub client_timeout: u64,
    pub upstream_timeout: u64,
    pub connect_timeout: u64,
    pub tunnel_poll_ms: u64,
    pub log_level: String,
    pub logging: bool,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BucketCfg {
    pub enabled: bool,
    pub capacity: f64,
    pub refill_per_second: f64,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ThrottleCfg {
    pub retry_after_secs: u64,
}

impl Default for Srv {
    fn default() -> Self {
        Srv {
            listen_addr: DEFAULT_LISTEN.to_string(),
            buffer_size: 8192,
            client_timeout: 30,
            upstream_timeout: 30,
            connect_timeout: 10,
            tunnel_poll_ms: 500,
            log_level: "info".to_string(),
            logging: true,
        }
    }
}

impl Default for BucketCfg {
    fn default() -> Self {
        BucketCfg { enabled: true, capacity: DEFAULT_CAPACITY, refill_per_second: DEFAULT_REFILL }
    }
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        ThrottleCfg { retry_after_secs: DEFAULT_RETRY_AFTER }
    }
}

impl Config {
    /// Clamp unusable values back to defaults. Returns false when the listen
    /// address had to be replaced.
    pub fn validate(&mut self) -> bool {
        let mut valid = true;
        let s = &mut self.server;

        if !valid_listen_addr(&s.listen_addr) {
            log::error!("listen_addr '{}' is not host:port, using {DEFAULT_LISTEN}", s.listen_addr);
            s.listen_addr = DEFAULT_LISTEN.to_string();
            valid = false;
        }

        if s.buffer_size < 1024 {
            log::warn!("buffer_size too small ({}), using 1024", s.buffer_size);
            s.buffer_size = 1024;
        }
        if s.client_timeout == 0 {
            log::warn!("client_timeout is 0, using 30");
            s.client_timeout = 30;
        }
        if s.upstream_timeout == 0 {
            log::warn!("upstream_timeout is 0, using 30");
            s.upstream_timeout = 30;
        }
        if s.connect_timeout == 0 {
            log::warn!("connect_timeout is 0, using 10");
            s.connect_timeout = 10;
        }
        if s.tunnel_poll_ms == 0 {
            s.tunnel_poll_ms = 500;
        }

        let b = &mut self.token_bucket;
        if !b.capacity.is_finite() || b.capacity <= 0.0 {
            log::warn!("token_bucket.capacity {} invalid, using {DEFAULT_CAPACITY}", b.capacity);
            b.capacity = DEFAULT_CAPACITY;
        }
        if !b.refill_per_second.is_finite() || b.refill_per_second <= 0.0 {
            log::warn!("token_bucket.refill_per_second {} invalid, using {DEFAULT_REFILL}", b.refill_per_second);
            b.refill_per_second = DEFAULT_REFILL;
        }

        valid
    }
}

/// `host:port` with a non-empty host and a numeric port.
pub fn valid_listen_addr(addr: &str) -> bool {
    addr.rsplit_once(':')
        .map(|(h, p)| !h.is_empty() && p.parse::<u16>().is_ok())
        .unwrap_or(false)
}

pub fn parse_config(txt: &str, origin: &str) -> Result<Config, ConfigError> {
    toml::from_str(txt).map_err(|source| ConfigError::Parse { path: origin.to_string(), source })
}

/// Load the file at `path`. A missing file yields `Ok(None)`.
/// The result is not validated yet so that warnings can go through the
/// logger, which is configured from this very file.
pub fn load_config(path: &Path) -> Result<Option<Config>, ConfigError> {
    let shown = path.display().to_string();
    match fs::read_to_string(path) {
        Ok(txt) => parse_config(&txt, &shown).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read { path: shown, source }),
    }
}
