//! schema
//!
//! Schema items, reserved attribute names and the dtype lattice.
//!
//! # Modules
//!
//! - [`lattice`] - Implicit widening order over dtypes and its joins
//! - [`aggregator`] - Common schema of a collection of schema items
//!
//! # Schema Items
//!
//! A schema item is either a [`DType`] value or a schema-kind [`ObjectId`].
//! Entity schemas are records in a bag mapping attribute names to schema
//! items; four names are reserved for structure:
//!
//! | Name | Meaning |
//! |---|---|
//! | `__schema__` | The schema of an object discovered under OBJECT |
//! | `__items__` | Item schema of a list schema |
//! | `__keys__` | Key schema of a dict schema |
//! | `__values__` | Value schema of a dict schema |

pub mod aggregator;
pub mod lattice;

pub use aggregator::{common_schema, CommonDTypeAggregator, CommonSchemaAggregator};
pub use lattice::{common_dtype, dtype_lattice, DTypeMatrix, LatticeError};

use crate::core::dtype::DType;
use crate::core::errors::{Error, Result};
use crate::core::ids::{ObjectId, NOFOLLOW_OBJECT_SCHEMA};
use crate::core::item::DataItem;

pub const SCHEMA_ATTR: &str = "__schema__";
pub const LIST_ITEMS_ATTR: &str = "__items__";
pub const DICT_KEYS_ATTR: &str = "__keys__";
pub const DICT_VALUES_ATTR: &str = "__values__";

/// Wrap a schema so that traversal treats references typed by it as leaves.
///
/// OBJECT maps to the reserved nofollow OBJECT id. Other dtypes, non-schema
/// ids and already wrapped schemas are rejected.
pub fn nofollow_schema_item(schema: &DataItem) -> Result<DataItem> {
    match schema {
        DataItem::DType(DType::Object) => Ok(NOFOLLOW_OBJECT_SCHEMA.into()),
        DataItem::DType(dtype) => Err(Error::invalid(format!(
            "calling nofollow on {dtype} slice is not allowed"
        ))),
        DataItem::ObjectId(id) if id.is_nofollow_schema() => Err(Error::invalid(
            "nofollow on a nofollow slice is not allowed",
        )),
        DataItem::ObjectId(id) if id.is_schema() => Ok(id.nofollow().into()),
        other => Err(Error::invalid(format!(
            "schema must be a schema item, got: {other}"
        ))),
    }
}

/// Recover the schema wrapped by [`nofollow_schema_item`].
pub fn get_nofollowed_schema_item(schema: &DataItem) -> Result<DataItem> {
    match schema.as_object_id() {
        Some(id) if id == NOFOLLOW_OBJECT_SCHEMA => Ok(DType::Object.into()),
        Some(id) if id.is_nofollow_schema() => Ok(id.nofollowed().into()),
        _ => Err(Error::invalid(format!(
            "schema must be a nofollow schema, got: {schema}"
        ))),
    }
}

/// Check whether `schema` may type a slice of object ids.
pub fn verify_schema_for_item_ids(schema: &DataItem) -> bool {
    match schema {
        DataItem::DType(dtype) => matches!(dtype, DType::Any | DType::ItemId | DType::Object),
        _ => false,
    }
}

/// Check that `schema` may type dict keys.
pub fn verify_dict_key_schema(schema: &DataItem) -> Result<()> {
    match schema.as_dtype() {
        Some(dtype @ (DType::None | DType::Float32 | DType::Float64 | DType::Expr)) => Err(
            Error::invalid(format!("dict keys cannot be {dtype}")),
        ),
        _ => Ok(()),
    }
}

/// Classify `schema` as an entity schema id.
///
/// Nofollow ids are not entity schemas: references typed by them are not
/// followed.
pub(crate) fn entity_schema_id(schema: &DataItem) -> Option<ObjectId> {
    schema
        .as_object_id()
        .filter(|id| id.is_schema() && !id.is_nofollow_schema())
}
