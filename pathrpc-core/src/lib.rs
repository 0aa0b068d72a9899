//! Core JSON-RPC 2.0 types for pathrpc
//!
//! This crate is transport-agnostic. It provides:
//!
//! - **Error taxonomy**: [`RpcError`], [`ErrorKind`], declared [`ApplicationError`]s
//!   and the crate-level [`Error`]
//! - **Message model**: requests, notifications, batches and the two response shapes
//! - **Classification**: [`codec::classify`] turns body bytes into a [`Message`]
//!   or the error to report
//! - **Validation detail**: the issue list carried by InvalidRequest/InvalidParams
//! - **Observability**: `tracing` + OpenTelemetry setup
//!
//! `pathrpc-server` builds the dispatcher, the envelope engine and the
//! transports on top of these.
//!
//! # Example
//!
//! ```rust
//! use pathrpc_core::{codec, Call, Message, SuccessResponse};
//!
//! let message = codec::classify(br#"{"jsonrpc":"2.0","method":"add","params":{"a":1,"b":2},"id":9}"#).unwrap();
//! let Message::Single(call) = message else { unreachable!() };
//!
//! let response = SuccessResponse::new(serde_json::json!(3), call.id());
//! let bytes = codec::encode(&response).unwrap();
//! assert_eq!(bytes, br#"{"jsonrpc":"2.0","result":3,"id":9}"#);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;
pub mod validation;

pub use error::{ApplicationError, Error, ErrorKind, Result, RpcError};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    Call, ErrorResponse, Message, Notification, Request, Response, SuccessResponse,
    JSONRPC_VERSION,
};
pub use validation::{Issue, ValidationError};
