//! Core data types used throughout the presentation stack.

pub mod geometry;

pub use geometry::Extent;
