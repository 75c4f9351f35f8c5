//! The HTTP server: accepts connections, runs the dispatcher and turns
//! dispatch outcomes into responses.

use crate::context::{DispatchOutcome, Handoff};
use crate::dispatch::Dispatcher;
use crate::error::{json_error_response, DispatchErrorCode};
use crate::php::{CgiRequest, PhpRunner};
use crate::sites::sanitize_host;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Header name for request ID
const X_REQUEST_ID: &str = "x-request-id";

type HttpResponse = Response<BoxBody<Bytes, hyper::Error>>;

/// The main site server
pub struct SiteServer {
    bind_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    php: Arc<PhpRunner>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SiteServer {
    pub fn new(
        bind_addr: SocketAddr,
        dispatcher: Arc<Dispatcher>,
        php: Arc<PhpRunner>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            dispatcher,
            php,
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Site server listening (HTTP/1.1 and HTTP/2)");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            let php = Arc::clone(&self.php);

                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req: Request<Incoming>| {
                                    let dispatcher = Arc::clone(&dispatcher);
                                    let php = Arc::clone(&php);
                                    async move { handle_request(req, dispatcher, php, addr).await }
                                });

                                if let Err(e) = AutoBuilder::new(TokioExecutor::new())
                                    .http1()
                                    .preserve_header_case(true)
                                    .http2()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Site server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    php: Arc<PhpRunner>,
    client_addr: SocketAddr,
) -> Result<HttpResponse, hyper::Error> {
    let (parts, body) = req.into_parts();

    // Generate or propagate request ID
    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let hostname = match parts
        .headers
        .get(hyper::header::HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(sanitize_host)
    {
        Some(h) => h,
        None => {
            return Ok(json_error_response(
                DispatchErrorCode::MissingHostHeader,
                "Missing or invalid Host header",
            ));
        }
    };

    let raw_path = parts.uri.path().to_string();
    let path = match urlencoding::decode(&raw_path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw_path.clone(),
    };
    let query = parts.uri.query().unwrap_or("").to_string();

    debug!(hostname, method = %parts.method, path, request_id, "Incoming request");

    match dispatcher.dispatch(&hostname, &path) {
        DispatchOutcome::StaticFile(file) => Ok(serve_static(&file).await),
        DispatchOutcome::Handoff(Handoff::Execute(fc)) => {
            if !fc.is_php() {
                // An SPA shell or plain HTML entry streams as bytes
                return Ok(serve_static(&fc.entry_path).await);
            }

            let body = body.collect().await?.to_bytes();
            let request_uri = if query.is_empty() {
                raw_path.clone()
            } else {
                format!("{}?{}", raw_path, query)
            };
            let cgi = CgiRequest {
                method: parts.method.to_string(),
                request_uri,
                query,
                host: hostname.clone(),
                remote_addr: client_addr.ip().to_string(),
                headers: parts
                    .headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
                    })
                    .collect(),
                body,
            };

            match php.execute(&fc, &cgi).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    error!(hostname, request_id, error = %e, "Front controller execution failed");
                    Ok(json_error_response(
                        DispatchErrorCode::GatewayError,
                        "Front controller execution failed",
                    ))
                }
            }
        }
        DispatchOutcome::Handoff(Handoff::Redirect { location }) => {
            let mut response = Response::builder().status(StatusCode::FOUND);
            if let Ok(value) = HeaderValue::from_str(&location) {
                response = response.header(hyper::header::LOCATION, value);
            }
            Ok(response
                .body(empty_body())
                .expect("valid response builder"))
        }
        DispatchOutcome::DirectoryListing(dir) => Ok(directory_listing(&hostname, &dir)),
        DispatchOutcome::NotFound(code) => Ok(json_error_response(
            code,
            format!("No handler for {}{}", hostname, path),
        )),
    }
}

async fn serve_static(file: &Path) -> HttpResponse {
    match tokio::fs::read(file).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", content_type_for(file))
            .body(Full::new(Bytes::from(contents)).map_err(|e| match e {}).boxed())
            .expect("valid response builder"),
        Err(e) => {
            // The file existed at classification time; races resolve to 404
            debug!(file = %file.display(), error = %e, "Static file read failed");
            json_error_response(DispatchErrorCode::NotFound, "File not found")
        }
    }
}

/// Content type by file extension, covering the common web types.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Minimal HTML index of the site directory, sorted by name
fn directory_listing(hostname: &str, dir: &Path) -> HttpResponse {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let suffix = if entry.path().is_dir() { "/" } else { "" };
                format!("{}{}", name, suffix)
            })
            .collect(),
        Err(_) => {
            return json_error_response(DispatchErrorCode::NotFound, "Directory not readable")
        }
    };
    names.sort();

    let items: String = names
        .iter()
        .map(|name| format!("<li><a href=\"/{0}\">{0}</a></li>", name))
        .collect();
    let html = format!(
        "<!DOCTYPE html><html><head><title>Index of {0}</title></head>\
         <body><h1>Index of {0}</h1><ul>{1}</ul></body></html>",
        hostname, items
    );

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(html)).map_err(|e| match e {}).boxed())
        .expect("valid response builder")
}

fn empty_body() -> BoxBody<Bytes, hyper::Error> {
    Full::new(Bytes::new()).map_err(|e| match e {}).boxed()
}
