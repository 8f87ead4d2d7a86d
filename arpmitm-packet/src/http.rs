//! HTTP/1.x message head parsing
//!
//! Works on a single TCP payload. Messages split across segments are not
//! reassembled: a head without its terminating blank line still yields the
//! request or status line and whatever header lines are present, with an
//! empty body.

use std::fmt;

/// Request methods recognised at the start of a payload
pub const METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

/// A parsed HTTP request head plus the body bytes seen in the same segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target as sent (usually an origin-form path)
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Value of the `Host` header, if any
    pub fn host(&self) -> Option<&str> {
        header(&self.headers, "host")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// `host` + `path`, the way a browser would show it
    pub fn url(&self) -> String {
        match self.host() {
            Some(host) => format!("{}{}", host, self.path),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url())
    }
}

/// A parsed HTTP response head plus the body bytes seen in the same segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status_code, self.reason)
    }
}

/// Either side of an HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMessage {
    Request(HttpRequest),
    Response(HttpResponse),
}

impl HttpMessage {
    /// Parse a TCP payload as the start of an HTTP/1.x message.
    ///
    /// Returns `None` for anything that does not begin with a valid request
    /// line or status line. Never panics.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let (head, body) = split_head(payload);

        let mut lines = head.split(|&b| b == b'\n').map(trim_cr);
        let first = std::str::from_utf8(lines.next()?).ok()?;
        let headers = parse_headers(lines);

        if first.starts_with("HTTP/") {
            let (version, status_code, reason) = parse_status_line(first)?;
            return Some(HttpMessage::Response(HttpResponse {
                version,
                status_code,
                reason,
                headers,
                body: body.to_vec(),
            }));
        }

        let (method, path, version) = parse_request_line(first)?;
        Some(HttpMessage::Request(HttpRequest {
            method,
            path,
            version,
            headers,
            body: body.to_vec(),
        }))
    }

    pub fn body(&self) -> &[u8] {
        match self {
            HttpMessage::Request(req) => &req.body,
            HttpMessage::Response(resp) => &resp.body,
        }
    }
}

/// Split at the first blank line; no blank line means "all head, no body"
fn split_head(payload: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find(payload, b"\r\n\r\n") {
        return (&payload[..pos], &payload[pos + 4..]);
    }
    if let Some(pos) = find(payload, b"\n\n") {
        return (&payload[..pos], &payload[pos + 2..]);
    }
    (payload, &payload[payload.len()..])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_request_line(line: &str) -> Option<(String, String, String)> {
    let mut parts = line.split(' ').filter(|p| !p.is_empty());
    let method = parts.next()?;
    let path = parts.next()?;
    let version = parts.next()?;

    if parts.next().is_some() || !METHODS.contains(&method) || !is_version(version) {
        return None;
    }

    Some((method.to_string(), path.to_string(), version.to_string()))
}

fn parse_status_line(line: &str) -> Option<(String, u16, String)> {
    let (version, rest) = line.split_once(' ')?;
    if !is_version(version) {
        return None;
    }

    let rest = rest.trim_start();
    let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((version.to_string(), code.parse().ok()?, reason.trim().to_string()))
}

fn is_version(token: &str) -> bool {
    match token.strip_prefix("HTTP/") {
        Some(v) => {
            let mut nums = v.split('.');
            matches!(
                (nums.next(), nums.next(), nums.next()),
                (Some(major), Some(minor), None)
                    if !major.is_empty()
                        && !minor.is_empty()
                        && major.bytes().all(|b| b.is_ascii_digit())
                        && minor.bytes().all(|b| b.is_ascii_digit())
            )
        }
        None => false,
    }
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a [u8]>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| {
            let line = String::from_utf8_lossy(line);
            let (name, value) = line.split_once(':')?;
            let name = name.trim();
            if name.is_empty() || name.contains(' ') {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
