//! Stable exit codes for the run-snippets CLI.

/// Every snippet passed or ran without an expectation.
pub const OK: i32 = 0;
/// At least one snippet failed or timed out.
pub const FAILED: i32 = 1;
/// Startup failed: invalid catalog, config, or duplicate snippet id.
pub const INVALID: i32 = 2;
