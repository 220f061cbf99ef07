//! ops::extract
//!
//! Copy the reachable subgraph of a slice with identities unchanged.
//!
//! The destination receives exactly the attributes, list items, dict
//! entries and schema records the walk reaches, plus the `__schema__` of
//! objects discovered under OBJECT. Missing values are not copied.

use crate::bag::DataBag;
use crate::core::dtype::DType;
use crate::core::errors::{Error, Result};
use crate::core::ids::ObjectId;
use crate::core::item::{DataItem, DataSlice};
use crate::schema::SCHEMA_ATTR;

use super::traverser::{TraverseOptions, Traverser, Visitor};

/// Extract into a caller-owned destination bag.
pub struct ExtractOp<'b> {
    new_bag: &'b mut DataBag,
    options: TraverseOptions,
}

impl<'b> ExtractOp<'b> {
    pub fn new(new_bag: &'b mut DataBag) -> Self {
        Self {
            new_bag,
            options: TraverseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TraverseOptions) -> Self {
        self.options = options;
        self
    }

    /// Copy everything reachable from `slice` under `schema`.
    pub fn extract_slice(
        &mut self,
        slice: &DataSlice,
        schema: &DataItem,
        bag: &DataBag,
        fallbacks: &[&DataBag],
    ) -> Result<()> {
        let before = self.new_bag.triple_count();
        let mut visitor = ExtractVisitor {
            new_bag: &mut *self.new_bag,
        };
        Traverser::new(bag.view(fallbacks), &mut visitor)
            .with_options(self.options)
            .traverse_slice(slice, schema)?;
        tracing::debug!(
            items = slice.len(),
            copied = self.new_bag.triple_count().saturating_sub(before),
            "extract finished"
        );
        Ok(())
    }
}

struct ExtractVisitor<'b> {
    new_bag: &'b mut DataBag,
}

impl ExtractVisitor<'_> {
    fn set_schema_attr(&mut self, item: ObjectId, schema: &DataItem) -> Result<()> {
        self.new_bag.set_attr(item, SCHEMA_ATTR, schema.clone())
    }
}

impl Visitor for ExtractVisitor<'_> {
    fn previsit(&mut self, item: &DataItem, schema: &DataItem) -> Result<()> {
        if schema.is_dtype(DType::Any) {
            return Err(Error::UnsupportedSchema {
                schema: schema.clone(),
                item: item.clone(),
            });
        }
        Ok(())
    }

    fn get_value(&self, item: &DataItem, _schema: &DataItem) -> Result<DataItem> {
        Ok(item.clone())
    }

    fn visit_list(
        &mut self,
        list: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        items: &[DataItem],
    ) -> Result<()> {
        if is_object_schema {
            self.set_schema_attr(list, schema)?;
        }
        self.new_bag.extend_list(list, items.iter().cloned())
    }

    fn visit_dict(
        &mut self,
        dict: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        keys: &[DataItem],
        values: &[DataItem],
    ) -> Result<()> {
        if is_object_schema {
            self.set_schema_attr(dict, schema)?;
        }
        for (key, value) in keys.iter().zip(values) {
            self.new_bag.set_in_dict(dict, key.clone(), value.clone())?;
        }
        Ok(())
    }

    fn visit_object(
        &mut self,
        object: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        attr_names: &[String],
        attr_values: &[DataItem],
    ) -> Result<()> {
        if is_object_schema {
            self.set_schema_attr(object, schema)?;
        }
        let is_schema_record = schema.is_dtype(DType::Schema);
        for (name, value) in attr_names.iter().zip(attr_values) {
            match value {
                DataItem::Missing => {}
                _ if is_schema_record => {
                    self.new_bag.set_schema_attr(object, name, value.clone())?
                }
                _ => self.new_bag.set_attr(object, name, value.clone())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::allocate_objects;

    #[test]
    fn extract_copies_only_declared_attributes() {
        let mut bag = DataBag::new();
        let schema = bag
            .create_entity_schema(&[("x", DType::Int32.into())])
            .unwrap();
        let obj = allocate_objects(1).object_by_offset(0);
        bag.set_attr(obj, "x", 1i32.into()).unwrap();
        bag.set_attr(obj, "undeclared", 2i32.into()).unwrap();

        let mut out = DataBag::new();
        ExtractOp::new(&mut out)
            .extract_slice(&DataSlice::new(vec![obj.into()]), &schema.into(), &bag, &[])
            .unwrap();

        assert_eq!(out.get_attr(obj, "x"), 1i32.into());
        assert_eq!(out.get_attr(obj, "undeclared"), DataItem::Missing);
        assert_eq!(out.get_schema_attr(schema, "x"), DType::Int32.into());
    }

    #[test]
    fn extract_refuses_any() {
        let bag = DataBag::new();
        let mut out = DataBag::new();
        let obj = allocate_objects(1).object_by_offset(0);
        let err = ExtractOp::new(&mut out)
            .extract_slice(&DataSlice::new(vec![obj.into()]), &DType::Any.into(), &bag, &[])
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchema { .. }));
    }
}
