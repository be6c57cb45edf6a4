//! Shared test utilities for loancall integration tests.
//!
//! - `TestHarness` wires an in-memory database, a temp-dir artifact store and
//!   scripted adapters into the orchestrators
//! - Builders for uploads and config files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
