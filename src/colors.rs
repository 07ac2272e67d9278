// ANSI color codes for terminal output
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

pub fn status_color(c: u16) -> &'static str {
    match c {
        200..=299 => GREEN,
        300..=399 => CYAN,
        429 => MAGENTA,
        400..=499 => YELLOW,
        _ => RED,
    }
}

pub fn level_color(l: log::Level) -> &'static str {
    match l {
        log::Level::Error => RED,
        log::Level::Warn => YELLOW,
        log::Level::Info => CYAN,
        log::Level::Debug | log::Level::Trace => DIM,
    }
}

pub const SEPARATOR: &str = "\x1b[90m──────────────────────────────────────────\x1b[0m";
