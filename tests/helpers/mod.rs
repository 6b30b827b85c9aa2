//! Shared helpers for the judger integration tests.
//!
//! Note: `helpers/mod.rs` rather than `tests/helpers.rs`, because Cargo would
//! compile a top-level `tests/helpers.rs` as its own test binary.

pub mod fake_dispatcher;
pub mod stub_backend;
