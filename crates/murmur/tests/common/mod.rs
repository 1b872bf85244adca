//! Shared test utilities for murmur integration tests.
//!
//! This module provides:
//! - `TestHarness` for running an orchestrator in a temp directory
//! - `FakeAdapter`, a scriptable inference adapter
//! - `FlakyStore`, a job store with injected update failures

pub mod fake;
pub mod flaky;
pub mod harness;

pub use fake::{silent_wav, FakeAdapter, Feed};
pub use flaky::FlakyStore;
pub use harness::{params, TestHarness};
