use std::path::Path;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Upper bound on the request head (request line + headers). Reading stops
/// once this many bytes have arrived without a header terminator.
pub const MAX_REQUEST_SIZE: usize = 8192;

/// The blank-line marker ending the request headers.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

static MIME_TYPES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("html", "text/html; charset=utf-8"),
        ("htm", "text/html; charset=utf-8"),
        ("css", "text/css; charset=utf-8"),
        ("js", "text/javascript; charset=utf-8"),
        ("json", "application/json; charset=utf-8"),
        ("xml", "application/xml; charset=utf-8"),
        ("txt", "text/plain; charset=utf-8"),
        ("ico", "image/x-icon"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("svg", "image/svg+xml"),
        ("pdf", "application/pdf"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
        ("ttf", "font/ttf"),
        ("eot", "application/vnd.ms-fontobject"),
    ]
    .iter()
    .cloned()
    .collect()
});

pub fn get_mime_type(file_path: &str) -> &'static str {
    if let Some(extension) = Path::new(file_path).extension().and_then(|s| s.to_str()) {
        MIME_TYPES
            .get(extension.to_lowercase().as_str())
            .unwrap_or(&"application/octet-stream")
    } else {
        "application/octet-stream"
    }
}

/// Response status codes the server can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    RequestTimeout,
    TooLarge,
    NotImplemented,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::RequestTimeout => 408,
            Status::TooLarge => 413,
            Status::NotImplemented => 501,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::RequestTimeout => "Request Timeout",
            Status::TooLarge => "Request Entity Too Large",
            Status::NotImplemented => "Not Implemented",
        }
    }

    /// Status code and reason phrase, as written in the access log.
    pub fn phrase(self) -> String {
        format!("{} {}", self.code(), self.reason())
    }

    pub fn status_line(self) -> String {
        format!("HTTP/1.0 {} {}\r\n", self.code(), self.reason())
    }
}

/// The minimal HTML body carried by every error response.
pub fn error_body(status: Status) -> String {
    format!(
        "<html><body><h1>{} {}</h1></body></html>",
        status.code(),
        status.reason()
    )
}

/// A complete error response: status line, Date, Content-Type,
/// Content-Length, blank line, HTML body.
pub fn error_response(status: Status) -> Vec<u8> {
    let body = error_body(status);
    let mut out = status.status_line();
    out.push_str(&format!("Date: {}\r\n", httpdate::fmt_http_date(std::time::SystemTime::now())));
    out.push_str("Content-Type: text/html; charset=utf-8\r\n");
    out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    out.push_str("Connection: close\r\n\r\n");
    out.push_str(&body);
    out.into_bytes()
}

/// Header block for a 200 static-file response.
pub fn file_response_head(path: &str, len: u64) -> Vec<u8> {
    let mut out = Status::Ok.status_line();
    out.push_str(&format!("Date: {}\r\n", httpdate::fmt_http_date(std::time::SystemTime::now())));
    out.push_str(&format!("Content-Type: {}\r\n", get_mime_type(path)));
    out.push_str(&format!("Content-Length: {}\r\n", len));
    out.push_str("Connection: close\r\n\r\n");
    out.into_bytes()
}

/// Header block for a 200 response whose body is streamed from the backend.
/// No Content-Length is known; the connection close delimits the body.
pub fn stream_response_head() -> Vec<u8> {
    let mut out = Status::Ok.status_line();
    out.push_str(&format!("Date: {}\r\n", httpdate::fmt_http_date(std::time::SystemTime::now())));
    out.push_str("Connection: close\r\n\r\n");
    out.into_bytes()
}

/// A parsed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub version: String,
    /// The raw first request line, kept verbatim for the access log.
    pub first_line: String,
}

/// What came out of the request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The stream ended without a header terminator.
    Malformed,
    /// The size bound was hit without a header terminator.
    TooLarge,
    /// Terminator found, but the request line is not a GET we can serve.
    NotImplemented,
    Request(Request),
}

/// First request line of the buffer, lossy-decoded, for logging. Works even
/// on buffers that fail to parse.
pub fn first_line(buf: &[u8]) -> String {
    let end = buf
        .windows(2)
        .position(|w| w == b"\r\n")
        .or_else(|| buf.iter().position(|&b| b == b'\n'))
        .unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

pub fn has_header_terminator(buf: &[u8]) -> bool {
    buf.windows(HEADER_TERMINATOR.len())
        .any(|w| w == HEADER_TERMINATOR)
}

/// Parse the request head. `truncated` is true when the caller stopped
/// reading at the size bound rather than at EOF, which turns a missing
/// terminator into `TooLarge` instead of `Malformed`.
pub fn parse_request(buf: &[u8], truncated: bool) -> ParseOutcome {
    if !has_header_terminator(buf) {
        return if truncated {
            ParseOutcome::TooLarge
        } else {
            ParseOutcome::Malformed
        };
    }

    let line = first_line(buf);
    let mut tokens = line.splitn(3, ' ');
    let (method, url, version) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(m), Some(u), Some(v)) if !m.is_empty() && !u.is_empty() && !v.is_empty() => {
            (m, u, v)
        }
        _ => return ParseOutcome::NotImplemented,
    };

    if method != "GET" {
        return ParseOutcome::NotImplemented;
    }
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return ParseOutcome::NotImplemented;
    }

    ParseOutcome::Request(Request {
        method: method.to_string(),
        url: url.to_string(),
        version: version.to_string(),
        first_line: line,
    })
}

/// Where a URL is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClassification {
    /// Fails the traversal guard; answered with 400, never touches the
    /// filesystem or the backend.
    Rejected,
    StaticPath(String),
    SearchQuery(String),
}

/// Classify a raw URL token. Pure; rules apply in order, first match wins.
pub fn classify_url(url: &str) -> UrlClassification {
    if !url.starts_with('/') {
        return UrlClassification::Rejected;
    }
    if url.contains("/../") {
        return UrlClassification::Rejected;
    }
    if url.ends_with("/..") {
        return UrlClassification::Rejected;
    }
    if let Some(idx) = url.find('?') {
        return UrlClassification::SearchQuery(decode_query(&url[idx + 1..]));
    }
    UrlClassification::StaticPath(url.to_string())
}

/// Decode a form-style query: strip a leading `name=` prefix if present and
/// turn each `+` into a space. No percent-decoding.
pub fn decode_query(raw: &str) -> String {
    let value = match raw.split_once('=') {
        Some((_, v)) => v,
        None => raw,
    };
    value.replace('+', " ")
}
