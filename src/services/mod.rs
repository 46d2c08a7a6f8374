//! Service layer for business logic
//!
//! Provides unified business logic shared between the HTTP handlers
//! and integration tests.

mod ads;
mod stats;
mod track;

pub use ads::*;
pub use stats::*;
pub use track::*;
