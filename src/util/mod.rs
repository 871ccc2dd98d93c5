// Small container utilities shared by the input tables

pub mod handle;
pub mod sorted;

pub use handle::{Arena, Handle};
