//! # JSON:API Sample Library
//!
//! A blog and a car dealership served through `jsonapi-core`. The library exposes
//! its modules so integration tests can drive the same wiring as the binary.

pub mod definitions;
pub mod hooks;
pub mod lifecycle;
pub mod model;
