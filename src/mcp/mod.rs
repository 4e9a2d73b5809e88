//! MCP tool surface.
//!
//! - `commands`: tool implementations over the session manager and vault
//! - `types`: serializable response types
//! - `schema`: JSON Schema helpers

pub mod commands;
pub(crate) mod schema;
pub mod types;

pub use commands::VpsCommands;
