//! Testing utilities for the lifecycle engine
//!
//! An in-memory fake of the server catalog plus a deterministic naming
//! policy, so lifecycle code can be exercised without a live database.

pub mod fixtures;
pub mod mocks;

pub use self::fixtures::*;
pub use self::mocks::*;
