//! Concrete implementations of the domain's outward-facing seams.

pub mod dto;
pub mod store;
