//! The JSON-RPC surface (§6.1): one typed request/response pair per
//! method, dispatched through a `#[rpc(server)]` trait rather than by
//! matching on a dynamic method-name string. The HTTP transport itself
//! is out of scope here — `bin/otc-broker` does the minimal binding.

#![warn(rust_2018_idioms)]

mod dto;
mod error;
mod server;

pub use dto::*;
pub use server::{OtcRpcApiServer, RpcConfig, RpcServerImpl};
