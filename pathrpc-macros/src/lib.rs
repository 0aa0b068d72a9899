//! Procedural macros for pathrpc
//!
//! ## `#[method]`
//!
//! Turns an async fn into a factory returning a
//! `pathrpc_server::MethodDef`, ready for `RpcRouter::register_def`. The fn's
//! single argument is the params type (any `serde::Deserialize`); it may be
//! omitted for methods without params. The return type must be
//! `Result<T, E>` with `T: Serialize` and `E: Into<HandlerError>`.
//!
//! The method is registered under the fn's name unless `name = "..."` is
//! given.
//!
//! ```ignore
//! use pathrpc_macros::method;
//! use pathrpc_server::{HandlerError, RpcRouter};
//!
//! #[derive(serde::Deserialize)]
//! struct AddParams { a: i32, b: i32 }
//!
//! #[method]
//! async fn add(p: AddParams) -> Result<i32, HandlerError> {
//!     Ok(p.a + p.b)
//! }
//!
//! #[method(name = "server_time")]
//! async fn time() -> Result<u64, HandlerError> {
//!     Ok(0)
//! }
//!
//! let router = RpcRouter::new()
//!     .register_def(add())?
//!     .register_def(time())?;
//! ```

mod method;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn};

/// Declare an async fn as a JSON-RPC method
#[proc_macro_attribute]
pub fn method(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = method::MethodArgs::default();
    let parser = syn::meta::parser(|meta| args.parse_meta(meta));
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemFn);
    method::expand(args, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
