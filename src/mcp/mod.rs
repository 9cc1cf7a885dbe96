//! MCP surface: a hand-rolled JSON-RPC 2.0 server exposing the Unity bridge
//! as a set of MCP tools. Grounded on `mcp/mod.rs`'s module layout.
//!
//! - [`types`]: JSON-RPC envelope and tool-calling types
//! - [`tools`]: the static tool catalog
//! - [`dispatcher`]: name resolution, timeouts, and the special-cased tools
//! - [`batch`]: the resumable sequential batch executor
//! - [`server`]: the stdio request loop

mod batch;
mod dispatcher;
mod server;
mod tools;
mod types;

pub use batch::BatchExecutor;
pub use dispatcher::ToolDispatcher;
pub use server::run as run_stdio_server;
