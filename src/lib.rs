//! Koda store - the in-memory data layer of a schema-aware object store
//!
//! Values are immutable typed slices of items. Objects, lists, dicts and
//! schemas live in a triple store (the data bag) addressed by value-typed
//! ids, and a type lattice governs how heterogeneous schemas unify.
//!
//! # Architecture
//!
//! The codebase is layered, leaves first:
//!
//! - [`core`] - Ids, dtypes, items, errors and configuration
//! - [`schema`] - Schema items, the dtype lattice and common-schema folding
//! - [`bag`] - In-memory triple store with fallback-chain reads
//! - [`ops`] - Graph traversal, deep clone and extract
//! - [`logging`] - `tracing` subscriber setup
//!
//! # Correctness Invariants
//!
//! 1. Ids are values: nothing mutates an id after allocation
//! 2. Every reachable object is previsited before any content is emitted
//! 3. Each object's content is walked at most once per traversal
//! 4. Co-allocated objects clone to co-allocated objects at equal offsets

pub mod bag;
pub mod core;
pub mod logging;
pub mod ops;
pub mod schema;

pub use crate::bag::{BagView, DataBag};
pub use crate::core::dtype::DType;
pub use crate::core::errors::{Error, Result};
pub use crate::core::ids::{AllocationId, ObjectId};
pub use crate::core::item::{DataItem, DataSlice};
