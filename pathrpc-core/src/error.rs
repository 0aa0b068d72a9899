//! Error types for pathrpc
//!
//! Two families of errors live here:
//!
//! - **Error**: crate-level failures (setup, transport, serialization) used
//!   with `?` throughout the workspace
//! - **RpcError**: the protocol error value carried inside a JSON-RPC Error
//!   Response (`code`, `message`, `data`)
//!
//! # Error Taxonomy
//!
//! Every protocol failure belongs to exactly one [`ErrorKind`]:
//!
//! | Kind | Code | Message |
//! |------|------|---------|
//! | ParseError | -32700 | `Parse error.` |
//! | InvalidRequest | -32600 | `Invalid Request.` |
//! | MethodNotFound | -32601 | `Method not found.` |
//! | InvalidParams | -32602 | `Invalid params.` |
//! | InternalError | -32603 | `Internal Server Error.` |
//! | Application | -32000..=-32099 | declared per error |
//!
//! Applications declare their own codes with [`ApplicationError::declare`].
//! Declared errors pass through the dispatch engine unchanged.
//!
//! # Examples
//!
//! ```rust
//! use pathrpc_core::{ApplicationError, ErrorKind, RpcError};
//!
//! const OUT_OF_STOCK: ApplicationError =
//!     ApplicationError::declare(-32001, "Application exception.");
//!
//! let err = OUT_OF_STOCK.with_data("sku-42");
//! assert_eq!(err.code(), -32001);
//! assert_eq!(err.kind(), ErrorKind::Application);
//!
//! let not_found = RpcError::method_not_found();
//! assert_eq!(not_found.message(), "Method not found.");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for pathrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error type
///
/// Setup mistakes (duplicate method names, non-POST registrations on an RPC
/// router, conflicting paths) surface as [`Error::Config`] when the router or
/// application is being assembled, never at call time.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A protocol error value, typically decoded from a peer's response
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Serialization or deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output failure
    #[error("IO error: {0}")]
    Io(String),

    /// Invalid setup: routes, method names, bind addresses
    #[error("Configuration error: {0}")]
    Config(String),

    /// A url handed to the in-process transport was not absolute
    #[error("Invalid url '{0}': must start with '/'")]
    InvalidUrl(String),

    /// No route is registered at the given path
    #[error("No route for path: {0}")]
    NotFound(String),

    /// The channel or connection is no longer open
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Protocol error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Body was not valid JSON
    ParseError,
    /// Body was JSON but not a valid Request object
    InvalidRequest,
    /// Method name does not resolve to a registered method
    MethodNotFound,
    /// Method resolved but its parameters failed validation
    InvalidParams,
    /// Any other failure; detail is never returned to the caller
    InternalError,
    /// Declared application error in the -32000..=-32099 range
    Application,
}

impl ErrorKind {
    /// Fixed numeric code, `None` for application errors
    pub const fn code(self) -> Option<i32> {
        match self {
            ErrorKind::ParseError => Some(-32700),
            ErrorKind::InvalidRequest => Some(-32600),
            ErrorKind::MethodNotFound => Some(-32601),
            ErrorKind::InvalidParams => Some(-32602),
            ErrorKind::InternalError => Some(-32603),
            ErrorKind::Application => None,
        }
    }

    /// Fixed message text, `None` for application errors
    pub const fn message(self) -> Option<&'static str> {
        match self {
            ErrorKind::ParseError => Some("Parse error."),
            ErrorKind::InvalidRequest => Some("Invalid Request."),
            ErrorKind::MethodNotFound => Some("Method not found."),
            ErrorKind::InvalidParams => Some("Invalid params."),
            ErrorKind::InternalError => Some("Internal Server Error."),
            ErrorKind::Application => None,
        }
    }

    /// Classify a wire code
    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => ErrorKind::ParseError,
            -32600 => ErrorKind::InvalidRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            -32603 => ErrorKind::InternalError,
            _ => ErrorKind::Application,
        }
    }

    /// Short label used in logs and metric attributes
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "parse_error",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::MethodNotFound => "method_not_found",
            ErrorKind::InvalidParams => "invalid_params",
            ErrorKind::InternalError => "internal_error",
            ErrorKind::Application => "application",
        }
    }

    fn error(self) -> RpcError {
        RpcError {
            code: self.code().unwrap_or(ApplicationError::DEFAULT.code),
            message: self
                .message()
                .unwrap_or(ApplicationError::DEFAULT.message)
                .to_string(),
            data: None,
        }
    }
}

/// JSON-RPC error object
///
/// Immutable once built: the constructors fix `code` and `message` for each
/// kind, and [`RpcError::with_data`] returns a new value.
///
/// `data` is always serialized, as `null` when absent:
///
/// ```rust
/// use pathrpc_core::RpcError;
///
/// let json = serde_json::to_string(&RpcError::internal_error()).unwrap();
/// assert_eq!(json, r#"{"code":-32603,"message":"Internal Server Error.","data":null}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcError {
    /// Body could not be decoded as JSON; `detail` is the decoder's message
    pub fn parse_error(detail: impl Into<String>) -> Self {
        ErrorKind::ParseError.error().with_data(detail.into())
    }

    /// Body is JSON but not a valid Request object
    pub fn invalid_request(detail: impl Into<Value>) -> Self {
        ErrorKind::InvalidRequest.error().with_data(detail)
    }

    /// Method name did not resolve
    pub fn method_not_found() -> Self {
        ErrorKind::MethodNotFound.error()
    }

    /// Parameters failed validation; `detail` is the validator output
    pub fn invalid_params(detail: impl Into<Value>) -> Self {
        ErrorKind::InvalidParams.error().with_data(detail)
    }

    /// Unexpected failure. Carries no data unless one is attached explicitly.
    pub fn internal_error() -> Self {
        ErrorKind::InternalError.error()
    }

    /// Copy of this error with `data` replaced
    pub fn with_data(self, data: impl Into<Value>) -> Self {
        Self {
            data: Some(data.into()),
            ..self
        }
    }

    /// Numeric error code
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Optional additional data
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Category of this error, derived from its code
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(self.code)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " {}", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

/// A declared application error
///
/// Declarations are `const` so they can sit next to the code that raises
/// them. The code must lie in `-32099..=-32000`; anything else fails to
/// compile when used in a `const` item.
///
/// ```rust
/// use pathrpc_core::ApplicationError;
///
/// const INSUFFICIENT_FUNDS: ApplicationError =
///     ApplicationError::declare(-32010, "Insufficient funds.");
///
/// let err = INSUFFICIENT_FUNDS.with_data(serde_json::json!({"balance": 50}));
/// assert_eq!(err.message(), "Insufficient funds.");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationError {
    code: i32,
    message: &'static str,
}

impl ApplicationError {
    /// Base application error (-32000)
    pub const DEFAULT: ApplicationError = ApplicationError::declare(-32000, "An error occurred.");

    /// Declare an application error code and its fixed message
    pub const fn declare(code: i32, message: &'static str) -> Self {
        assert!(
            code <= -32000 && code >= -32099,
            "application error codes must lie in -32099..=-32000"
        );
        Self { code, message }
    }

    /// Declared code
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Declared message
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// Raise this error without data
    pub fn error(&self) -> RpcError {
        RpcError {
            code: self.code,
            message: self.message.to_string(),
            data: None,
        }
    }

    /// Raise this error with data
    pub fn with_data(&self, data: impl Into<Value>) -> RpcError {
        self.error().with_data(data)
    }
}

impl From<ApplicationError> for RpcError {
    fn from(err: ApplicationError) -> Self {
        err.error()
    }
}
