//! core::errors
//!
//! Crate-wide error type for store, schema and traversal operations.
//!
//! Every variant aborts the operation that produced it. None are retried
//! internally; a failed clone may leave a partially written destination
//! bag, which the caller discards.

use thiserror::Error;

use super::ids::ObjectId;
use super::item::DataItem;

/// Errors from store, schema and traversal operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no common schema: cannot find a common schema for {common} and {conflicting}")]
    NoCommonSchema {
        common: DataItem,
        conflicting: DataItem,
    },

    #[error("unsupported schema {schema} for item {item}")]
    UnsupportedSchema { schema: DataItem, item: DataItem },

    /// An item reached value mapping without having been previsited.
    #[error("allocation of {0} was not previsited")]
    AllocationNotFound(DataItem),

    #[error("object {object} has no {attr} attribute", attr = crate::schema::SCHEMA_ATTR)]
    MissingObjectSchema { object: ObjectId },

    #[error("schema {schema} has no {attr} attribute")]
    MissingSchemaAttribute { schema: ObjectId, attr: String },
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
