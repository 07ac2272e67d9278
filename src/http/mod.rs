// Raw HTTP/1.x message reading
mod request;
mod response;
pub use request::{split_host_port, HttpRequest, Target};
pub use response::{reason, HttpResponse};
use std::io::Read;

use crate::error::ReadError;

pub const MAX_HEADER_SIZE: usize = 65_536;
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

pub fn find_hdr_end(d: &[u8]) -> Option<usize> {
    d.windows(4).position(|w| w == b"\r\n\r\n")
}

pub fn get_hdr<'a>(h: &'a [(String, String)], n: &str) -> Option<&'a str> {
    h.iter().find(|(k, _)| k.eq_ignore_ascii_case(n)).map(|(_, v)| v.as_str())
}

fn raw_hdr<'a>(t: &'a str, n: &str) -> Option<&'a str> {
    for l in t.lines().skip(1) {
        if let Some((k, v)) = l.split_once(':') {
            if k.trim().eq_ignore_ascii_case(n) { return Some(v.trim()); }
        }
    }
    None
}

/// Locate terminating zero-length chunk in chunked body data.
pub fn find_zero_chunk(d: &[u8]) -> Option<usize> {
    if d.len() < 3 { return None; }
    for i in (0..d.len().saturating_sub(2)).rev() {
        if d[i] == b'0' && d[i + 1] == b'\r' && d[i + 2] == b'\n'
            && (i == 0 || (i >= 2 && d[i - 2] == b'\r' && d[i - 1] == b'\n'))
        {
            return Some(i);
        }
    }
    None
}

/// The zero chunk is followed by optional trailer lines and one blank line.
fn chunked_complete(body: &[u8]) -> bool {
    match find_zero_chunk(body) {
        Some(pos) => {
            let rest = &body[pos + 3..];
            rest == b"\r\n" || rest.ends_with(b"\r\n\r\n")
        }
        None => false,
    }
}

/// Read one request: the header block, then the body announced by
/// `Content-Length` or terminated by a zero chunk. Without either, reading
/// stops at the end of the headers and whatever already arrived after them
/// is kept (a client may pipeline tunnel bytes right behind `CONNECT`).
pub fn read_http_message(r: &mut impl Read, buf_size: usize) -> Result<Vec<u8>, ReadError> {
    let mut d = Vec::with_capacity(buf_size);
    let mut b = vec![0u8; buf_size];
    let (mut hdr_done, mut body_start, mut content_len, mut chunked) = (false, 0usize, None::<usize>, false);
    let mut timed_out = false;

    loop {
        match r.read(&mut b) {
            Ok(0) => break,
            Ok(n) => {
                d.extend_from_slice(&b[..n]);

                if !hdr_done {
                    match find_hdr_end(&d) {
                        Some(p) => {
                            hdr_done = true;
                            body_start = p + 4;
                            let hdr_text = std::str::from_utf8(&d[..p]).map_err(|_| ReadError::InvalidEncoding)?;
                            content_len = raw_hdr(hdr_text, "Content-Length")
                                .and_then(|v| v.parse::<usize>().ok());
                            if content_len.is_some_and(|cl| cl > MAX_BODY_SIZE) {
                                return Err(ReadError::BodyTooLarge);
                            }
                            chunked = raw_hdr(hdr_text, "Transfer-Encoding")
                                .map(|v| v.eq_ignore_ascii_case("chunked"))
                                .unwrap_or(false);
                            if content_len.is_none() && !chunked {
                                break;
                            }
                        }
                        None if d.len() > MAX_HEADER_SIZE => return Err(ReadError::HeadersTooLarge),
                        None => continue,
                    }
                }

                let body_len = d.len() - body_start;
                if let Some(cl) = content_len {
                    if body_len >= cl { break; }
                } else if chunked {
                    if body_len > MAX_BODY_SIZE {
                        return Err(ReadError::BodyTooLarge);
                    }
                    if chunked_complete(&d[body_start..]) { break; }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut
                       || e.kind() == std::io::ErrorKind::WouldBlock => {
                timed_out = true;
                break;
            }
            Err(e) => return Err(ReadError::Io(e)),
        }
    }

    if d.is_empty() {
        return Err(if timed_out { ReadError::TimedOut } else { ReadError::Closed });
    }
    if !hdr_done {
        return Err(if timed_out { ReadError::TimedOut } else { ReadError::Closed });
    }
    if timed_out {
        if let Some(cl) = content_len {
            if d.len() - body_start < cl { return Err(ReadError::TimedOut); }
        }
    }
    Ok(d)
}
