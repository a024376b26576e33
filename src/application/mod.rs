//! Application layer: repository contracts, pagination, and top-level errors.

pub mod error;
pub mod pagination;
pub mod repos;
