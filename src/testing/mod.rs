//! Testing utilities and mock implementations
//!
//! Provides a mock `Transport` so the lifecycle controller and publisher
//! can be tested without a broker.

pub mod mocks;

pub use mocks::*;
