//! Storage abstractions for sessions and credentials.
//!
//! This module provides trait-based storage abstractions that enable:
//! - Dependency injection for testability
//! - Lock-free concurrent access via DashMap implementations
//! - Clean separation between storage and business logic

mod credential;
mod session;
mod traits;

pub use credential::{FileCredentialRepository, InMemoryCredentialRepository};
pub use session::DashMapSessionStorage;
pub use traits::{CredentialRepository, SessionStorage};
