// Flowdeck — Schema-driven workflow input forms and execution console
// License: Apache-2.0

pub mod config;
pub mod console;
pub mod execution;
pub mod form;
pub mod logger;
pub mod notify;
pub mod rpc;
pub mod schema;
pub mod session;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
