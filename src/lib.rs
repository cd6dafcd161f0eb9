//! nrtest workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual nrtest functionality is in the workspace member crates:
//! - `nrtest-types`: Shared contracts and JSON schemas
//! - `nrtest-domain`: Deviation math and verdict policy
//! - `nrtest-diff`: Comparator registry and built-in comparators
//! - `nrtest-adapters`: Process supervision and other I/O adapters
//! - `nrtest-app`: Application use cases
//! - `nrtest` (nrtest-cli): CLI interface
