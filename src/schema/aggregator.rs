//! schema::aggregator
//!
//! Common schema of a collection of schema items.
//!
//! # Rules
//!
//! Dtypes join through the lattice. Entity schemas have no widening among
//! themselves: two distinct entity schemas never unify. NONE (all inputs
//! missing) unifies with any entity schema, and an empty collection yields
//! OBJECT.

use crate::core::dtype::DType;
use crate::core::errors::{Error, Result};
use crate::core::ids::ObjectId;
use crate::core::item::{DataItem, DataSlice};

use super::lattice::common_dtype;

/// Folds observed dtypes into their least upper bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonDTypeAggregator {
    seen: u16,
}

impl CommonDTypeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, dtype: DType) {
        self.seen |= 1 << dtype.id();
    }

    /// The join of every added dtype, `None` if nothing was added.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCommonSchema` with the accumulated type and the
    /// first dtype that could not be joined with it.
    pub fn get(&self) -> Result<Option<DType>> {
        let mut seen = DType::ALL
            .into_iter()
            .filter(|dtype| self.seen & (1 << dtype.id()) != 0);
        let Some(mut acc) = seen.next() else {
            return Ok(None);
        };
        for dtype in seen {
            acc = common_dtype(acc, dtype).ok_or_else(|| Error::NoCommonSchema {
                common: acc.into(),
                conflicting: dtype.into(),
            })?;
        }
        Ok(Some(acc))
    }
}

/// Folds a mix of dtypes and entity schema ids into one schema.
///
/// # Example
///
/// ```
/// use koda_store::core::dtype::DType;
/// use koda_store::schema::CommonSchemaAggregator;
///
/// let mut agg = CommonSchemaAggregator::new();
/// agg.add(&DType::Int32.into());
/// agg.add(&DType::Float32.into());
/// assert_eq!(agg.get().unwrap(), DType::Float32.into());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommonSchemaAggregator {
    dtypes: CommonDTypeAggregator,
    schema_id: Option<ObjectId>,
    error: Option<Error>,
}

impl CommonSchemaAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema item. Missing items are ignored.
    pub fn add(&mut self, schema: &DataItem) {
        match schema {
            DataItem::Missing => {}
            DataItem::DType(dtype) => self.add_dtype(*dtype),
            DataItem::ObjectId(id) => self.add_schema_id(*id),
            other => self.record(Error::invalid(format!(
                "expected Schema, got: {}",
                other.dtype()
            ))),
        }
    }

    pub fn add_dtype(&mut self, dtype: DType) {
        self.dtypes.add(dtype);
    }

    pub fn add_schema_id(&mut self, id: ObjectId) {
        if !id.is_schema() {
            self.record(Error::invalid(format!(
                "expected a schema ObjectId, got: {id}"
            )));
            return;
        }
        match self.schema_id {
            None => self.schema_id = Some(id),
            Some(seen) if seen == id => {}
            Some(seen) => self.record(Error::NoCommonSchema {
                common: seen.into(),
                conflicting: id.into(),
            }),
        }
    }

    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// The common schema of everything added.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while adding, otherwise
    /// `Error::NoCommonSchema` when dtypes do not join or a non-NONE dtype
    /// meets an entity schema.
    pub fn get(self) -> Result<DataItem> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let dtype = self.dtypes.get()?;
        match (dtype, self.schema_id) {
            (None, None) => Ok(DType::Object.into()),
            (Some(dtype), None) => Ok(dtype.into()),
            (None | Some(DType::None), Some(id)) => Ok(id.into()),
            (Some(dtype), Some(id)) => Err(Error::NoCommonSchema {
                common: dtype.into(),
                conflicting: id.into(),
            }),
        }
    }
}

/// Common schema of a slice of schema items.
///
/// Missing entries are skipped. Any value that is neither a dtype nor an
/// object id is rejected.
pub fn common_schema(schemas: &DataSlice) -> Result<DataItem> {
    let mut agg = CommonSchemaAggregator::new();
    for schema in schemas {
        match schema {
            DataItem::Missing => {}
            DataItem::DType(_) | DataItem::ObjectId(_) => agg.add(schema),
            other => {
                return Err(Error::invalid(format!(
                    "expected Schema, got: {}",
                    other.dtype()
                )))
            }
        }
    }
    agg.get()
}
