//! core
//!
//! Core domain types and configuration.
//!
//! # Modules
//!
//! - [`ids`] - Object and allocation identifiers
//! - [`dtype`] - Primitive and marker dtypes
//! - [`item`] - Tagged values and slices
//! - [`errors`] - Crate-wide error type
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Ids and items are plain values with structural equality
//! - Closed enums instead of open hierarchies
//! - Configuration is strict and self-describing

pub mod config;
pub mod dtype;
pub mod errors;
pub mod ids;
pub mod item;
