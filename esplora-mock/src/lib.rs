/// Esplora Mock Server Library
///
/// This crate provides both a standalone binary and library components
/// for mocking the Esplora API on top of an in-memory chain.

pub mod chain;
pub mod handlers;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use chain::{MockChain, MockError};
pub use server::{create_router, run_server, serve};
pub use types::*;
