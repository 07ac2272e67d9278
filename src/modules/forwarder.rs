// Plain HTTP forwarding: one fresh upstream connection per request
use super::helpers as h;
use crate::config::Srv;
use crate::error::ProxyError;
use crate::http::HttpRequest;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

enum Upstream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Read for Upstream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Upstream::Plain(s) => s.read(buf),
            Upstream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Upstream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Upstream::Plain(s) => s.write(buf),
            Upstream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Upstream::Plain(s) => s.flush(),
            Upstream::Tls(s) => s.flush(),
        }
    }
}

pub struct Forwarder {
    connect_timeout: Duration,
    io_timeout: Duration,
    buf: usize,
    tls: Arc<ClientConfig>,
}

impl Forwarder {
    /// Trusts the bundled webpki roots.
    pub fn new(cfg: &Srv) -> Result<Self, ProxyError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Forwarder::with_roots(cfg, roots)
    }

    pub fn with_roots(cfg: &Srv, roots: RootCertStore) -> Result<Self, ProxyError> {
        let tls = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Forwarder {
            connect_timeout: Duration::from_secs(cfg.connect_timeout),
            io_timeout: Duration::from_secs(cfg.upstream_timeout),
            buf: cfg.buffer_size,
            tls: Arc::new(tls),
        })
    }

    /// Replay `req` against the host named in its absolute target and relay
    /// the raw response bytes to `client`. Returns the number relayed.
    pub fn forward(&self, req: &HttpRequest, client: &mut TcpStream) -> Result<u64, ProxyError> {
        let url = url::Url::parse(&req.target)
            .map_err(|source| ProxyError::BadTarget { target: req.target.clone(), source })?;
        let secure = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(ProxyError::UnsupportedScheme(other.to_string())),
        };
        let host = url.host_str().ok_or_else(|| ProxyError::MissingHost(req.target.clone()))?;
        let port = url.port_or_known_default().unwrap_or(if secure { 443 } else { 80 });
        let label = format!("{host}:{port}");

        let addrs = url.socket_addrs(|| None)
            .map_err(|source| ProxyError::Resolve { addr: label.clone(), source })?;
        let tcp = h::connect_any(&label, &addrs, self.connect_timeout)?;
        tcp.set_read_timeout(Some(self.io_timeout))?;
        tcp.set_write_timeout(Some(self.io_timeout))?;

        let mut up = if secure {
            let bare = host.trim_start_matches('[').trim_end_matches(']').to_string();
            let name = ServerName::try_from(bare).map_err(|_| ProxyError::ServerName(host.to_string()))?;
            let conn = ClientConnection::new(Arc::clone(&self.tls), name)?;
            Upstream::Tls(Box::new(StreamOwned::new(conn, tcp)))
        } else {
            Upstream::Plain(tcp)
        };

        log::debug!("forwarding {} to {label}{}", req.method, if secure { " (tls)" } else { "" });
        up.write_all(&req.to_upstream_bytes(&url))?;
        up.flush()?;
        Ok(h::relay(&mut up, client, self.buf)?)
    }
}
