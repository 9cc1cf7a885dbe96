//! Unity Bridge
//!
//! Maintains a reconnecting WebSocket link to a running Unity Editor
//! process and exposes a request/response correlation surface plus a
//! broadcast latch for script-compilation events.
//!
//! ## Architecture
//!
//! ```text
//! this server --ws://host:port/bridge--> Unity Editor plugin
//!       |
//!   ReconnectSupervisor (dial/backoff)
//!       |
//!   BridgeManager ---- CommandRegistry (per-commandId correlation)
//!       |         \--- CompilationWaiters (broadcast latch)
//!       |
//!   BridgeSession (one attached socket: send mutex + recv loop)
//! ```
//!
//! ## Modules
//!
//! - [`types`]: wire protocol message types and the JSON codec
//! - [`session`]: the attached socket itself
//! - [`registry`]: per-command correlation
//! - [`compilation`]: the compilation-await broadcast latch
//! - [`manager`]: the seam tying the above together
//! - [`supervisor`]: the reconnect state machine

mod compilation;
mod manager;
mod registry;
mod session;
mod supervisor;
mod types;

pub use manager::BridgeManager;
pub use supervisor::ReconnectSupervisor;
pub use types::CompilationResult;
