// Terminal logging on top of the `log` facade
use std::io::Write;

use log::LevelFilter;

use crate::colors::*;

/// Map a config level name onto a filter. Unknown names mean `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Install the global logger.
///
/// `RUST_LOG` is read first and the configured level overrides it for this
/// crate. With `enabled == false` nothing is printed at all. Calling this
/// twice is harmless: the second logger is rejected and the error returned.
pub fn init(enabled: bool, level: &str) -> Result<(), log::SetLoggerError> {
    let filter = if enabled { parse_level(level) } else { LevelFilter::Off };
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_module("rate_limit_proxy", filter);
    builder.filter_module("rustls", LevelFilter::Warn);
    builder.format(|buf, record| {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let col = level_color(record.level());
        let tag = match record.level() {
            log::Level::Error => "✗",
            log::Level::Warn => "⚠",
            log::Level::Info => "·",
            log::Level::Debug => "DBG",
            log::Level::Trace => "TRC",
        };
        writeln!(buf, "{DIM}{ts}{RESET} {col}{tag}{RESET} {}", record.args())
    });
    builder.try_init()
}

pub fn request(method: &str, target: &str, peer: &str) {
    log::info!("{YELLOW}→{RESET} {BOLD}{method}{RESET} {target} from {peer}");
}

pub fn response(status: u16, ms: u128) {
    let col = status_color(status);
    log::info!("{GREEN}←{RESET} {BOLD}{col}{status}{RESET} ({ms}ms)");
}

pub fn separator() {
    log::debug!("{SEPARATOR}");
}
