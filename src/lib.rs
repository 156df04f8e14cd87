//! scopegate — resolves GraphQL access tokens to the schema scope they may use.
//!
//! Re-exports modules needed by integration tests in `tests/` and the CLI.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod resolver;
pub mod store;
