//! Minimal HTTP/1.1 host for the dashboard.
//!
//! One request per connection; every connection runs in its own task.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::algorithm::Algorithm;
use crate::dashboard::{Dashboard, PageView};
use crate::error::DashError;
use crate::logging::{self, v_str, Domain};
use crate::params::{parse_form, FormValues};
use crate::router::Page;

/// Upper bound on accepted request bodies.
const MAX_BODY_BYTES: usize = 1 << 20;
/// Upper bound on the request line and on each header line.
const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 100;
/// How long a peer may take to send a complete request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

const SESSION_COOKIE: &str = "optidash_session";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: FormValues,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Read one line of at most `MAX_LINE_BYTES`, newline included.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(reader: &mut R, line: &mut String) -> Result<usize, DashError> {
    let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64);
    let read = limited.read_line(line).await?;
    if read == MAX_LINE_BYTES && !line.ends_with('\n') {
        return Err(DashError::Decode(format!("line longer than {} bytes", MAX_LINE_BYTES)));
    }
    Ok(read)
}

/// Read one request. `Ok(None)` when the peer closed before sending anything.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Request>, DashError> {
    let mut line = String::new();
    if read_bounded_line(reader, &mut line).await? == 0 {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(DashError::Decode(format!("bad request line: {}", line.trim_end())));
    };
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), parse_form(q)),
        None => (target.to_string(), FormValues::new()),
    };

    let mut headers = HashMap::new();
    let mut count = 0;
    loop {
        let mut header = String::new();
        if read_bounded_line(reader, &mut header).await? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        count += 1;
        if count > MAX_HEADERS {
            return Err(DashError::Decode(format!("more than {} headers", MAX_HEADERS)));
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if length > MAX_BODY_BYTES {
        return Err(DashError::Decode(format!("body too large: {} bytes", length)));
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    Ok(Some(Request {
        method: method.to_string(),
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

/// `read_request` bounded by `limit`; a peer that stalls gets a timeout error.
pub async fn read_request_within<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: Duration,
) -> Result<Option<Request>, DashError> {
    match tokio::time::timeout(limit, read_request(reader)).await {
        Ok(result) => result,
        Err(_) => Err(DashError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out reading request",
        ))),
    }
}

/// Viewer session from the request cookie, if it is one this host could have issued.
pub fn session_id(req: &Request) -> Option<String> {
    req.header("cookie")?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty() && v.len() <= 64 && v.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self { status, content_type, headers: Vec::new(), body: body.into() }
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/html; charset=utf-8", body)
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string())
    }

    pub fn not_found() -> Self {
        Self::new(404, "text/plain", "Not Found")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Connection: close\r\n\
             Content-Length: {}\r\n",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(self.body.as_bytes());
        bytes
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), DashError> {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

// =============================================================================
// Routing
// =============================================================================

async fn page_response(dashboard: &Dashboard, view: PageView) -> Response {
    match view {
        PageView::Page { page, html } => {
            let response = Response::html(200, html);
            match dashboard.router().cached_digest(page) {
                Some(digest) => response.with_header("X-Fragment-Digest", digest),
                None => response,
            }
        }
        PageView::Error { status, html } => Response::html(status, html),
        PageView::Stale => Response::new(409, "text/plain", "navigation superseded"),
    }
}

/// Route one request. Requests without a session cookie get a new session.
pub async fn handle(dashboard: &Dashboard, req: &Request) -> Response {
    match session_id(req) {
        Some(session) => route(dashboard, req, &session).await,
        None => {
            let session = new_session_id();
            route(dashboard, req, &session).await.with_header(
                "Set-Cookie",
                format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session),
            )
        }
    }
}

async fn route(dashboard: &Dashboard, req: &Request, session: &str) -> Response {
    let segments: Vec<&str> = req.path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let show_all = req.query.get("rows").map(String::as_str) == Some("all");

    match (req.method.as_str(), segments.as_slice()) {
        ("GET", []) => {
            page_response(dashboard, dashboard.navigate_as(session, Page::Home.name(), false).await).await
        }
        ("GET", ["page", name]) => {
            page_response(dashboard, dashboard.navigate_as(session, name, show_all).await).await
        }
        ("POST", ["page", "compare", "run"]) => {
            dashboard.run_all().await;
            page_response(dashboard, dashboard.navigate_as(session, Page::Compare.name(), false).await).await
        }
        ("POST", ["page", name, "run"]) => match Algorithm::parse(name) {
            Some(algorithm) => {
                dashboard.run_algorithm(algorithm, &parse_form(&req.body)).await;
                page_response(dashboard, dashboard.navigate_as(session, name, false).await).await
            }
            None => Response::not_found(),
        },
        ("GET", ["api", "charts", name]) => match Page::parse(name) {
            Some(page) => Response::json(200, &dashboard.charts_json(page).await),
            None => Response::not_found(),
        },
        ("GET", ["api", "notifications"]) => match serde_json::to_value(dashboard.notifications()) {
            Ok(value) => Response::json(200, &value),
            Err(err) => Response::json(500, &json!({"error": err.to_string()})),
        },
        ("GET", ["api", "health"]) => Response::json(200, &json!({"status": "ok"})),
        (_, ["page", ..]) | (_, ["api", ..]) | (_, []) => Response::new(405, "text/plain", "Method Not Allowed"),
        _ => Response::not_found(),
    }
}

async fn handle_connection(dashboard: Arc<Dashboard>, stream: TcpStream) -> Result<(), DashError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let Some(req) = read_request_within(&mut reader, READ_TIMEOUT).await? else {
        return Ok(());
    };
    let response = handle(&dashboard, &req).await;
    logging::info(
        Domain::Server,
        "request",
        &[
            ("method", v_str(&req.method)),
            ("path", v_str(&req.path)),
            ("status", json!(response.status)),
        ],
    );
    response.write_to(&mut write_half).await
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, dashboard: Arc<Dashboard>) -> Result<(), DashError> {
    let addr = listener.local_addr()?;
    logging::info(Domain::Server, "listening", &[("addr", v_str(&addr.to_string()))]);
    loop {
        let (stream, peer) = listener.accept().await?;
        let dashboard = dashboard.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(dashboard, stream).await {
                logging::warn(
                    Domain::Server,
                    "connection_error",
                    &[("peer", v_str(&peer.to_string())), ("error", v_str(&err.to_string()))],
                );
            }
        });
    }
}
