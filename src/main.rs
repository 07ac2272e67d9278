mod colors;
mod config;
mod context;
mod error;
mod http;
mod logging;
mod modules;
mod server;


use std::path::PathBuf;

use clap::Parser;

/// Exit status an external harness reads as "proxy never came up".
const EXIT_UNAVAILABLE: i32 = 69;

#[derive(Parser, Debug)]
#[command(name = "rate_limit_proxy", version, about = "Forward proxy that can simulate upstream rate limiting")]
struct Cli {
    /// TOML configuration file; skipped when it does not exist
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address, overrides server.listen_addr
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let (mut c, load_err) = match config::load_config(&cli.config) {
        Ok(found) => (found.unwrap_or_default(), None),
        Err(e) => (config::Config::default(), Some(e)),
    };
    let listen_override = cli.listen.is_some();
    if let Some(addr) = cli.listen {
        c.server.listen_addr = addr;
    }
    if let Some(level) = cli.log_level {
        c.server.log_level = level;
    }

    if let Err(e) = logging::init(c.server.logging, &c.server.log_level) {
        eprintln!("logger already installed: {e}");
    }
    if let Some(e) = load_err {
        log::error!("{e}; using defaults");
    }
    if listen_override && !config::valid_listen_addr(&c.server.listen_addr) {
        log::error!("--listen '{}' is not host:port", c.server.listen_addr);
        std::process::exit(EXIT_UNAVAILABLE);
    }
    c.validate();

    let shared = modules::Shared::from_config(&c);
    let pipe = match modules::build_pipeline(&c, &shared) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Cannot build request pipeline: {e}");
            std::process::exit(EXIT_UNAVAILABLE);
        }
    };

    let bucket_on = pipe.has_module("token_bucket");

    let srv = match server::Server::bind(c.server.clone(), pipe) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Cannot listen on {}: {e}", c.server.listen_addr);
            std::process::exit(EXIT_UNAVAILABLE);
        }
    };

    logging::separator();
    log::info!("Proxy listening on {}", c.server.listen_addr);
    if bucket_on {
        log::info!(
            "Token bucket: capacity {}, refill {}/s",
            shared.bucket.capacity(), shared.bucket.refill_rate()
        );
    }
    log::info!("Throttled replies carry Retry-After +{}s", c.throttle.retry_after_secs);
    log::info!("Control plane: POST {} / POST {}", modules::START_PATH, modules::END_PATH);
    logging::separator();

    if let Err(e) = srv.run() {
        log::error!("Server failed: {e}");
        std::process::exit(1);
    }
}
