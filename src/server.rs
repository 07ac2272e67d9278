// TCP acceptor: one thread per connection, first request decides everything
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Srv;
use crate::context::Context;
use crate::error::ReadError;
use crate::http::{HttpRequest, HttpResponse};
use crate::modules::Pipeline;

static ACTIVE_CONNS: AtomicUsize = AtomicUsize::new(0);

pub fn active_connections() -> usize {
    ACTIVE_CONNS.load(Ordering::Acquire)
}

struct ConnGuard;

impl ConnGuard {
    fn new() -> Self {
        ACTIVE_CONNS.fetch_add(1, Ordering::AcqRel);
        ConnGuard
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        ACTIVE_CONNS.fetch_sub(1, Ordering::AcqRel);
    }
}

/// IPv4 addresses first, so `localhost` listens where `127.0.0.1` clients
/// connect even when the resolver lists `::1` first.
pub fn prefer_ipv4(mut addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    addrs.sort_by_key(|a| !a.is_ipv4());
    addrs
}

pub struct Server {
    listener: TcpListener,
    pipe: Arc<Pipeline>,
    cfg: Arc<Srv>,
}

impl Server {
    /// Bind the listening socket. The caller decides what a failure means.
    pub fn bind(cfg: Srv, p: Pipeline) -> io::Result<Self> {
        let addrs = prefer_ipv4(cfg.listen_addr.to_socket_addrs()?.collect());
        let listener = TcpListener::bind(&addrs[..])?;
        Ok(Server { listener, pipe: Arc::new(p), cfg: Arc::new(cfg) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever. Accept errors are logged and skipped.
    pub fn run(&self) -> io::Result<()> {
        for conn in self.listener.incoming() {
            let stream = match conn {
                Ok(s) => s,
                Err(e) => {
                    log::error!("Accept error: {e}");
                    thread::sleep(Duration::from_millis(50));
                    continue;
                }
            };
            let pipe = Arc::clone(&self.pipe);
            let cfg = Arc::clone(&self.cfg);
            let spawned = thread::Builder::new()
                .name("conn".into())
                .spawn(move || {
                    let _guard = ConnGuard::new();
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handle_connection(stream, &pipe, &cfg);
                    }));
                    if result.is_err() {
                        log::error!("Panic in connection handler (recovered)");
                    }
                });
            if let Err(e) = spawned {
                log::error!("Cannot spawn connection thread: {e}");
            }
        }
        Ok(())
    }
}

fn reply(c: &mut TcpStream, resp: &HttpResponse) {
    if c.write_all(&resp.to_bytes()).and_then(|_| c.flush()).is_err() {
        log::debug!("client went away before the {} reply", resp.status_code);
    }
    let _ = c.shutdown(Shutdown::Write);
}

fn handle_connection(mut c: TcpStream, p: &Pipeline, cfg: &Srv) {
    let peer = c.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".into());
    let _ = c.set_read_timeout(Some(Duration::from_secs(cfg.client_timeout)));
    let _ = c.set_write_timeout(Some(Duration::from_secs(cfg.client_timeout)));
    let _ = c.set_nodelay(true);
    log::debug!("{peer} connected ({} active)", active_connections());

    let raw = match crate::http::read_http_message(&mut c, cfg.buffer_size) {
        Ok(d) => d,
        Err(e @ (ReadError::TimedOut | ReadError::Closed)) => {
            log::debug!("{peer}: {e}");
            let _ = c.shutdown(Shutdown::Both);
            return;
        }
        Err(e) => {
            let code = match e {
                ReadError::HeadersTooLarge => 431,
                ReadError::BodyTooLarge => 413,
                _ => 400,
            };
            log::warn!("{peer}: {e}, answering {code}");
            reply(&mut c, &HttpResponse::error(code, crate::http::reason(code)));
            return;
        }
    };

    let req = match HttpRequest::parse(&raw) {
        Some(r) => r,
        None => {
            log::warn!("{peer}: malformed request line");
            reply(&mut c, &HttpResponse::error(400, "Bad Request"));
            return;
        }
    };

    crate::logging::request(&req.method, &req.target, &peer);
    let mut ctx = Context::new(peer);

    if let Some(resp) = p.handle(&req, &mut ctx) {
        if let Some(at) = resp.get_header("Retry-After") {
            log::debug!("Retry-After: {at}");
        }
        reply(&mut c, &resp);
        crate::logging::response(resp.status_code, ctx.elapsed_ms());
        crate::logging::separator();
        return;
    }

    if req.is_connect() {
        match p.tunnel().open(&req, c) {
            Ok((up, down)) => log::info!(
                "Tunnel to {} closed: {up} bytes up, {down} bytes down ({}ms)",
                req.target, ctx.elapsed_ms()
            ),
            Err(e) => log::warn!("CONNECT {} from {} failed: {e}", req.target, ctx.peer),
        }
    } else {
        match p.forwarder().forward(&req, &mut c) {
            Ok(n) => log::info!("Relayed {n} bytes from {} ({}ms)", req.target, ctx.elapsed_ms()),
            Err(e) => log::warn!("Forwarding {} {} failed: {e}", req.method, req.target),
        }
        let _ = c.shutdown(Shutdown::Both);
    }
    crate::logging::separator();
}
