// CONNECT tunneling: raw bytes both ways, nothing inspected
use super::helpers as h;
use crate::config::Srv;
use crate::error::ProxyError;
use crate::http::{split_host_port, HttpRequest};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

pub struct Tunnel {
    connect_timeout: Duration,
    io_timeout: Duration,
    poll: Duration,
    buf: usize,
}

impl Tunnel {
    pub fn new(cfg: &Srv) -> Self {
        Tunnel {
            connect_timeout: Duration::from_secs(cfg.connect_timeout),
            io_timeout: Duration::from_secs(cfg.client_timeout),
            poll: Duration::from_millis(cfg.tunnel_poll_ms),
            buf: cfg.buffer_size,
        }
    }

    /// Connect to the `host:port` target, confirm to the client, then relay
    /// until either side is done. Any failure before the confirmation drops
    /// the client without a reply. Returns bytes moved (up, down).
    pub fn open(&self, req: &HttpRequest, mut client: TcpStream) -> Result<(u64, u64), ProxyError> {
        let (host, port) = split_host_port(&req.target)
            .ok_or_else(|| ProxyError::BadConnectTarget(req.target.clone()))?;
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ProxyError::Resolve { addr: req.target.clone(), source })?
            .collect();
        let mut remote = h::connect_any(&req.target, &addrs, self.connect_timeout)?;
        remote.set_write_timeout(Some(self.io_timeout))?;
        client.set_write_timeout(Some(self.io_timeout))?;

        client.write_all(ESTABLISHED)?;
        client.flush()?;
        if !req.body.is_empty() {
            remote.write_all(&req.body)?;
        }
        log::info!("Tunneling CONNECT request to {}", req.target);

        Ok(h::bidirectional_stream(client, remote, self.buf, self.poll)?)
    }
}
