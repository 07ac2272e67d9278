// Shared utilities for modules
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::ProxyError;

/// Lock, recovering the data if another handler panicked while holding it.
pub fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("{what}: mutex recovered after panic");
            poisoned.into_inner()
        }
    }
}

/// One-field JSON object with `": "` separators, e.g. `{"status": "ok"}`.
pub fn json_body(key: &str, value: &str) -> String {
    let k = serde_json::Value::String(key.to_string());
    let v = serde_json::Value::String(value.to_string());
    format!("{{{k}: {v}}}")
}

/// Try each resolved address in turn until one accepts within `timeout`.
pub fn connect_any(label: &str, addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream, ProxyError> {
    let mut last = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for a in addrs {
        match TcpStream::connect_timeout(a, timeout) {
            Ok(s) => {
                let _ = s.set_nodelay(true);
                return Ok(s);
            }
            Err(e) => {
                log::debug!("connect {label} via {a} failed: {e}");
                last = e;
            }
        }
    }
    Err(ProxyError::Connect { addr: label.to_string(), source: last })
}

/// Copy until `r` reaches EOF. A TLS peer that hangs up without
/// `close_notify` surfaces as `UnexpectedEof` and counts as EOF too.
pub fn relay(r: &mut impl Read, w: &mut impl Write, buf_size: usize) -> io::Result<u64> {
    let mut buf = vec![0u8; buf_size];
    let mut total = 0u64;
    loop {
        match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                w.write_all(&buf[..n])?;
                total += n as u64;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    w.flush()?;
    Ok(total)
}

/// Shuttle bytes both ways until either side closes or fails, then shut
/// both sockets down. Returns bytes moved `a → b` and `b → a`.
///
/// The two directions share a stop flag. Reads use `poll` as their timeout
/// so a loop parked in `read` re-checks the flag at least that often.
pub fn bidirectional_stream(a: TcpStream, b: TcpStream, buf_size: usize, poll: Duration) -> io::Result<(u64, u64)> {
    a.set_read_timeout(Some(poll))?;
    b.set_read_timeout(Some(poll))?;
    let (a_read, a_write) = (a.try_clone()?, a.try_clone()?);
    let (b_read, b_write) = (b.try_clone()?, b.try_clone()?);
    let stop = Arc::new(AtomicBool::new(false));

    let back = {
        let stop = Arc::clone(&stop);
        std::thread::Builder::new()
            .name("tunnel-down".into())
            .spawn(move || stream_copy(b_read, a_write, buf_size, &stop))
    };
    let back = match back {
        Ok(t) => t,
        Err(e) => {
            let _ = a.shutdown(Shutdown::Both);
            let _ = b.shutdown(Shutdown::Both);
            return Err(e);
        }
    };
    let up = stream_copy(a_read, b_write, buf_size, &stop);
    let down = back.join().unwrap_or(0);

    let _ = a.shutdown(Shutdown::Both);
    let _ = b.shutdown(Shutdown::Both);
    Ok((up, down))
}

fn stream_copy(mut r: TcpStream, mut w: TcpStream, buf_size: usize, stop: &AtomicBool) -> u64 {
    let mut buf = vec![0u8; buf_size];
    let mut total = 0u64;
    while !stop.load(Ordering::Acquire) {
        match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if w.write_all(&buf[..n]).is_err() { break; }
                total += n as u64;
            }
            Err(ref e) if matches!(e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => continue,
            Err(_) => break,
        }
    }
    stop.store(true, Ordering::Release);
    total
}
