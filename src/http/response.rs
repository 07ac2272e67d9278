// Literal HTTP response synthesis
use super::get_hdr;

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub fn reason(c: u16) -> &'static str {
    match c {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Error",
    }
}

impl HttpResponse {
    pub fn new(c: u16) -> Self {
        HttpResponse {
            version: "HTTP/1.1".to_string(),
            status_code: c,
            status_text: reason(c).to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Status line and blank line, nothing else.
    pub fn status_only(c: u16) -> Self {
        HttpResponse::new(c)
    }

    /// JSON reply with an exact `Content-Length` and `Connection: close`.
    pub fn json(c: u16, body: String) -> Self {
        let mut r = HttpResponse::new(c);
        r.headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];
        r.body = body.into_bytes();
        r
    }

    pub fn error(c: u16, m: &str) -> Self {
        let mut r = HttpResponse::new(c);
        r.headers = vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Content-Length".to_string(), m.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];
        r.body = m.as_bytes().to_vec();
        r
    }

    #[cfg(test)]
    pub fn parse(r: &[u8]) -> Option<Self> {
        let e = super::find_hdr_end(r)?;
        let t = std::str::from_utf8(&r[..e]).ok()?;
        let mut l = t.split("\r\n");
        let sl = l.next()?;
        let (v, rest) = sl.split_once(' ')?;
        let (cs, txt) = rest.split_once(' ').unwrap_or((rest, ""));
        let c: u16 = cs.parse().ok()?;
        let mut h = Vec::new();
        for ln in l {
            if ln.is_empty() { break; }
            if let Some((k, val)) = ln.split_once(':') {
                h.push((k.trim().to_string(), val.trim().to_string()));
            }
        }
        let b = r[e + 4..].to_vec();
        Some(HttpResponse { version: v.to_string(), status_code: c, status_text: txt.to_string(), headers: h, body: b })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut o = format!("{} {} {}\r\n", self.version, self.status_code, self.status_text);
        for (k, v) in &self.headers {
            o.push_str(k);
            o.push_str(": ");
            o.push_str(v);
            o.push_str("\r\n");
        }
        o.push_str("\r\n");
        let mut b = o.into_bytes();
        b.extend_from_slice(&self.body);
        b
    }

    pub fn get_header(&self, n: &str) -> Option<&str> {
        get_hdr(&self.headers, n)
    }
}
