//! Multi-bin 3D loading engine with an HTTP service front end.
//!
//! The engine packs rectangular items into bins chosen from a catalog of
//! bin types, minimizing either the number of bins or the cost per placed
//! volume. See [`optimizer::pack`] for the entry point.

pub mod api;
pub mod config;
pub mod geometry;
pub mod model;
pub mod optimizer;
pub mod types;
