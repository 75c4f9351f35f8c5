//! One-shot php-cgi execution.
//!
//! The front controller descriptor is applied to a single child process:
//! working directory, CGI/1.1 variables and the env overlay all live and die
//! with that process, so concurrent requests never observe each other's
//! mutations.

use crate::context::FrontController;
use anyhow::Context as _;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Request metadata carried into the CGI environment
#[derive(Debug, Clone)]
pub struct CgiRequest {
    pub method: String,
    /// Original request target (path plus query) for REQUEST_URI
    pub request_uri: String,
    pub query: String,
    pub host: String,
    pub remote_addr: String,
    /// All request headers, exported as HTTP_* variables
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Runs front controllers through the configured php-cgi binary
#[derive(Debug, Clone)]
pub struct PhpRunner {
    binary: String,
    args: Vec<String>,
}

impl PhpRunner {
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    pub async fn execute(
        &self,
        fc: &FrontController,
        req: &CgiRequest,
    ) -> anyhow::Result<Response<BoxBody<Bytes, hyper::Error>>> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.current_dir(&fc.working_dir);

        // Fresh environment per request; only PATH leaks through so the
        // interpreter can find its own tooling
        cmd.env_clear();
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        cmd.env("GATEWAY_INTERFACE", "CGI/1.1");
        cmd.env("SERVER_PROTOCOL", "HTTP/1.1");
        cmd.env("SERVER_SOFTWARE", concat!("sitegate/", env!("CARGO_PKG_VERSION")));
        // php-cgi refuses direct invocation without this
        cmd.env("REDIRECT_STATUS", "200");
        cmd.env("REQUEST_METHOD", &req.method);
        cmd.env("SCRIPT_FILENAME", &fc.entry_path);
        cmd.env("SCRIPT_NAME", &fc.script_name);
        cmd.env("DOCUMENT_ROOT", &fc.document_root);
        cmd.env("REQUEST_URI", &req.request_uri);
        cmd.env("QUERY_STRING", &req.query);
        cmd.env("SERVER_NAME", &req.host);
        cmd.env("REMOTE_ADDR", &req.remote_addr);

        if !req.body.is_empty() {
            cmd.env("CONTENT_LENGTH", req.body.len().to_string());
        }
        for (name, value) in &req.headers {
            let lower = name.to_lowercase();
            match lower.as_str() {
                "content-type" => {
                    cmd.env("CONTENT_TYPE", value);
                }
                "content-length" => {}
                _ => {
                    let var = format!("HTTP_{}", lower.to_uppercase().replace('-', "_"));
                    cmd.env(var, value);
                }
            }
        }

        // The descriptor overlay goes last: driver rewrites (QUERY_STRING
        // stashing) and user overrides win over the defaults above
        for (key, value) in overlay_entries(&fc.env, &req.query) {
            cmd.env(key, value);
        }

        debug!(
            entry = %fc.entry_path.display(),
            method = %req.method,
            "Executing front controller"
        );

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.binary))?;

        if let Some(mut stdin) = child.stdin.take() {
            if !req.body.is_empty() {
                stdin.write_all(&req.body).await?;
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await?;

        if !output.stderr.is_empty() {
            warn!(
                entry = %fc.entry_path.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Front controller wrote to stderr"
            );
        }
        if output.stdout.is_empty() {
            anyhow::bail!(
                "front controller produced no output (exit status {})",
                output.status
            );
        }

        parse_cgi_response(&output.stdout)
    }
}

/// Descriptor overlay entries ready to apply. A `QUERY_STRING` stash from a
/// funnel driver keeps the client's own parameters appended after it, so
/// `/blog/entry?preview=1` loses neither the stashed path nor `preview=1`.
fn overlay_entries(env: &[(String, String)], query: &str) -> Vec<(String, String)> {
    env.iter()
        .map(|(key, value)| {
            if key == "QUERY_STRING" && !query.is_empty() {
                let merged = if value.is_empty() {
                    query.to_string()
                } else {
                    format!("{}&{}", value, query)
                };
                (key.clone(), merged)
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

/// Parse a CGI response: a header block terminated by a blank line, then the
/// body. The nonstandard `Status:` header sets the HTTP status code.
fn parse_cgi_response(raw: &[u8]) -> anyhow::Result<Response<BoxBody<Bytes, hyper::Error>>> {
    let (head_end, body_start) = find_header_end(raw)
        .ok_or_else(|| anyhow::anyhow!("malformed CGI response: no header terminator"))?;

    let head = std::str::from_utf8(&raw[..head_end])
        .map_err(|_| anyhow::anyhow!("malformed CGI response: non-UTF-8 headers"))?;

    let mut status = StatusCode::OK;
    let mut builder = Response::builder();
    let mut saw_content_type = false;

    for line in head.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("status") {
            if let Some(code) = value.split(' ').next().and_then(|c| c.parse::<u16>().ok()) {
                status = StatusCode::from_u16(code).unwrap_or(StatusCode::OK);
            }
            continue;
        }
        if name.eq_ignore_ascii_case("content-type") {
            saw_content_type = true;
        }
        builder = builder.header(name, value);
    }

    if !saw_content_type {
        builder = builder.header("Content-Type", "text/html; charset=utf-8");
    }

    let body = Bytes::copy_from_slice(&raw[body_start..]);
    builder
        .status(status)
        .body(Full::new(body).map_err(|e| match e {}).boxed())
        .map_err(|e| anyhow::anyhow!("invalid CGI response headers: {}", e))
}

/// Locate the blank line separating headers from body (CRLF or bare LF)
fn find_header_end(raw: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    raw.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}
