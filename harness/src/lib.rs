//! Snippet catalog runner.
//!
//! Loads a registry of independent, labeled example snippets, executes each
//! one in an isolated child process, and checks captured output against an
//! optional expectation. The architecture enforces a strict separation:
//!
//! - **[`verdict`] / [`report`]**: pure classification and aggregation.
//!   No I/O, fully testable in isolation.
//! - **[`executor`] / [`pool`]**: side-effecting process execution with
//!   timeouts and bounded output capture.
//! - **[`catalog`] / [`registry`]**: load-time parsing, validation, and
//!   registration. The registry is append-only and fixed per invocation.

pub mod catalog;
pub mod config;
pub mod executor;
pub mod exit_codes;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod report;
pub mod verdict;
