//! objval - batch validation of host-owned object graphs
//!
//! Walks objects against a declarative schema and reports every rule
//! violation (null references, empty collections, disallowed tags, duplicate
//! unique values, failing custom checks and so on) as a flat list of
//! diagnostics. Host access stays on the calling thread; traversal and
//! thread-safe checks run in the background.

pub mod cli;
pub mod host;
pub mod model;
pub mod observability;
pub mod schema;
pub mod snapshot;
pub mod validator;
