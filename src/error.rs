//! Error handling and JSON error responses for the dispatcher

use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Error codes for dispatch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchErrorCode {
    /// Missing Host header in request
    MissingHostHeader,
    /// No configured or parked site matches the hostname
    UnknownSite,
    /// No driver recognized the site layout
    NoDriver,
    /// Driver matched but could not resolve the request to a file or script
    NotFound,
    /// Front controller execution failed
    GatewayError,
    /// Internal server error
    InternalError,
}

impl DispatchErrorCode {
    /// Get the default HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchErrorCode::MissingHostHeader => StatusCode::BAD_REQUEST,
            DispatchErrorCode::UnknownSite => StatusCode::NOT_FOUND,
            DispatchErrorCode::NoDriver => StatusCode::NOT_FOUND,
            DispatchErrorCode::NotFound => StatusCode::NOT_FOUND,
            DispatchErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            DispatchErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code as a string for the X-Sitegate-Error header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            DispatchErrorCode::MissingHostHeader => "MISSING_HOST_HEADER",
            DispatchErrorCode::UnknownSite => "UNKNOWN_SITE",
            DispatchErrorCode::NoDriver => "NO_DRIVER",
            DispatchErrorCode::NotFound => "NOT_FOUND",
            DispatchErrorCode::GatewayError => "GATEWAY_ERROR",
            DispatchErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// The error code
    pub code: DispatchErrorCode,
    /// Human-readable error message
    pub message: String,
    /// HTTP status code (for reference)
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: DispatchErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code().as_u16(),
            code,
            message: message.into(),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"code":"{}","message":"{}","status":{}}}"#,
                self.code.as_header_value(),
                self.message.replace('\"', "\\\""),
                self.status
            )
        })
    }
}

/// Create a JSON error response with X-Sitegate-Error header
pub fn json_error_response(
    code: DispatchErrorCode,
    message: impl Into<String>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let error = ErrorResponse::new(code, message);
    let status = code.status_code();
    let body = error.to_json();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("X-Sitegate-Error", code.as_header_value())
        .body(Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed())
        .expect("valid response with StatusCode enum and static headers")
}
