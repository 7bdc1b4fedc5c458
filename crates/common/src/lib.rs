//! Common types, protocol definitions, and errors shared across the practice API crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
