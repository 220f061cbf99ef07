//! ops
//!
//! Graph operations over bags.
//!
//! # Modules
//!
//! - [`traverser`] - Generic two-phase walk and the [`Visitor`] trait
//! - [`deep_clone`] - Copy a subgraph under fresh identities
//! - [`extract`] - Copy a subgraph with identities unchanged

pub mod deep_clone;
pub mod extract;
pub mod traverser;

pub use deep_clone::DeepCloneOp;
pub use extract::ExtractOp;
pub use traverser::{TraverseOptions, Traverser, Visitor};

use crate::bag::DataBag;
use crate::core::errors::Result;
use crate::core::item::{DataItem, DataSlice};

/// Deep clone `slice` into a new bag.
///
/// Returns the new bag, the cloned slice and `schema` unchanged.
pub fn deep_clone(
    slice: &DataSlice,
    schema: &DataItem,
    bag: &DataBag,
    fallbacks: &[&DataBag],
) -> Result<(DataBag, DataSlice, DataItem)> {
    let mut new_bag = DataBag::new();
    let (cloned, schema) = DeepCloneOp::new(&mut new_bag).clone_slice(slice, schema, bag, fallbacks)?;
    Ok((new_bag, cloned, schema))
}
