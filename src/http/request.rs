// HTTP request parsing and upstream rewriting
use super::{find_hdr_end, get_hdr};

/// The three request-target forms a forward proxy sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `host:port`, only meaningful for `CONNECT`.
    Authority,
    /// `/path?query`, addressed to the proxy itself.
    Origin,
    /// `scheme://host[:port]/path?query`, to be forwarded.
    Absolute,
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parse a raw HTTP request. Returns None for malformed or suspicious input.
    pub fn parse(r: &[u8]) -> Option<Self> {
        let e = find_hdr_end(r)?;
        let t = std::str::from_utf8(&r[..e]).ok()?;
        let mut l = t.split("\r\n");
        let rl = l.next()?;
        let mut p = rl.split(' ');
        let m = p.next()?.to_string();
        let target = p.next()?.to_string();
        let v = p.next()?.to_string();

        if p.next().is_some() { return None; }

        if m.is_empty() || !m.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }

        if target.is_empty() || target.bytes().any(|b| b <= 0x20 || b == 0x7F) {
            return None;
        }

        if v != "HTTP/1.0" && v != "HTTP/1.1" {
            return None;
        }

        let mut h = Vec::new();
        for ln in l {
            if ln.is_empty() { break; }
            if let Some((k, val)) = ln.split_once(':') {
                h.push((k.trim().to_string(), val.trim().to_string()));
            }
        }
        let s = e + 4;
        let cl: Option<usize> = get_hdr(&h, "Content-Length").and_then(|v| v.parse().ok());
        let b = match cl {
            Some(len) => r[s..r.len().min(s + len)].to_vec(),
            None => r[s..].to_vec(),
        };
        Some(HttpRequest { method: m, target, version: v, headers: h, body: b })
    }

    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }

    pub fn target_form(&self) -> Target {
        if self.is_connect() {
            Target::Authority
        } else if self.target.starts_with('/') {
            Target::Origin
        } else {
            Target::Absolute
        }
    }

    /// Origin-form path without its query string.
    pub fn path(&self) -> &str {
        self.target.split_once('?').map(|(p, _)| p).unwrap_or(&self.target)
    }

    pub fn get_header(&self, n: &str) -> Option<&str> {
        get_hdr(&self.headers, n)
    }

    /// Path and query of an absolute target exactly as the client wrote
    /// them, fragment dropped. No dot-segment or percent normalization.
    pub fn origin_form(&self) -> String {
        let rest = self.target.split_once("://").map(|(_, r)| r).unwrap_or(&self.target);
        let tail = &rest[rest.find(|c| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len())..];
        let tail = tail.split_once('#').map(|(p, _)| p).unwrap_or(tail);
        if tail.is_empty() {
            "/".to_string()
        } else if tail.starts_with('?') {
            format!("/{tail}")
        } else {
            tail.to_string()
        }
    }

    /// Serialize for the upstream: origin-form request line, the client's
    /// headers minus the hop-by-hop connection headers, a `Host` when the
    /// client sent none, and `Connection: close`.
    pub fn to_upstream_bytes(&self, url: &url::Url) -> Vec<u8> {
        let mut o = format!("{} {}", self.method, self.origin_form());
        o.push(' ');
        o.push_str(&self.version);
        o.push_str("\r\n");
        for (k, v) in &self.headers {
            if k.eq_ignore_ascii_case("Connection") || k.eq_ignore_ascii_case("Proxy-Connection") {
                continue;
            }
            o.push_str(k);
            o.push_str(": ");
            o.push_str(v);
            o.push_str("\r\n");
        }
        if self.get_header("Host").is_none() {
            if let Some(host) = url.host_str() {
                o.push_str("Host: ");
                o.push_str(host);
                if let Some(port) = url.port() {
                    o.push_str(&format!(":{port}"));
                }
                o.push_str("\r\n");
            }
        }
        o.push_str("Connection: close\r\n\r\n");
        let mut b = o.into_bytes();
        b.extend_from_slice(&self.body);
        b
    }
}

/// Split a `CONNECT` authority into host and port. IPv6 hosts come in
/// brackets (`[::1]:443`) and are returned without them.
pub fn split_host_port(s: &str) -> Option<(&str, u16)> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        (host, rest.strip_prefix(':')?)
    } else {
        s.rsplit_once(':')?
    };
    if host.is_empty() || host.contains(' ') {
        return None;
    }
    Some((host, port.parse().ok()?))
}
