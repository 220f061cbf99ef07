//! ops::deep_clone
//!
//! Copy the reachable subgraph of a slice under fresh identities.
//!
//! # Identity
//!
//! Every source allocation reached by the walk is mapped to one fresh
//! allocation of the same capacity and kind, on first sight. Objects that
//! shared an allocation in the source therefore share one in the copy, at
//! the same offsets, which is what lets cycles and shared references be
//! written without a second pass.
//!
//! # Schemas
//!
//! - Implicit schemas are always forked, as implicit schemas.
//! - Explicit schemas are forked only when the slice being cloned is itself
//!   a slice of schemas (declared schema SCHEMA). Otherwise they are shared
//!   by reference and their records are copied under the same id.
//! - Nofollow schemas are never followed: references typed by them are
//!   copied as they are.
//!
//! The schema passed to [`DeepCloneOp::clone_slice`] is returned unchanged,
//! even when nested occurrences of it are forked.

use std::collections::HashMap;

use crate::bag::DataBag;
use crate::core::dtype::DType;
use crate::core::errors::{Error, Result};
use crate::core::ids::{new_allocation_id_like, AllocationId, ObjectId};
use crate::core::item::{DataItem, DataSlice};
use crate::schema::{entity_schema_id, SCHEMA_ATTR};

use super::traverser::{TraverseOptions, Traverser, Visitor};

/// Deep clone into a caller-owned destination bag.
///
/// # Example
///
/// ```
/// use koda_store::bag::DataBag;
/// use koda_store::core::dtype::DType;
/// use koda_store::core::ids::allocate_objects;
/// use koda_store::ops::deep_clone::DeepCloneOp;
///
/// let mut bag = DataBag::new();
/// let schema = bag.create_entity_schema(&[("x", DType::Int32.into())]).unwrap();
/// let obj = allocate_objects(1).object_by_offset(0);
/// bag.set_attr(obj, "x", 7i32.into()).unwrap();
///
/// let mut out = DataBag::new();
/// let (copy, copy_schema) = DeepCloneOp::new(&mut out)
///     .clone_item(&obj.into(), &schema.into(), &bag, &[])
///     .unwrap();
///
/// let copy = copy.as_object_id().unwrap();
/// assert_ne!(copy, obj);
/// assert_eq!(copy_schema, schema.into());
/// assert_eq!(out.get_attr(copy, "x"), 7i32.into());
/// ```
pub struct DeepCloneOp<'b> {
    new_bag: &'b mut DataBag,
    options: TraverseOptions,
}

impl<'b> DeepCloneOp<'b> {
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

    /// Clone `slice` read through `bag` and `fallbacks`.
    ///
    /// Returns the cloned slice and `schema` unchanged.
    ///
    /// # Errors
    ///
    /// Any traversal error. On error the destination bag may hold a partial
    /// copy and should be discarded.
    pub fn clone_slice(
        &mut self,
        slice: &DataSlice,
        schema: &DataItem,
        bag: &DataBag,
        fallbacks: &[&DataBag],
    ) -> Result<(DataSlice, DataItem)> {
        tracing::debug!(
            items = slice.len(),
            schema = %schema,
            fallbacks = fallbacks.len(),
            "deep clone started"
        );
        let mut visitor = DeepCloneVisitor::new(self.new_bag, schema.is_dtype(DType::Schema));
        Traverser::new(bag.view(fallbacks), &mut visitor)
            .with_options(self.options)
            .traverse_slice(slice, schema)?;

        let cloned = slice
            .iter()
            .map(|item| visitor.get_value(item, schema))
            .collect::<Result<DataSlice>>()?;
        tracing::debug!(
            allocations = visitor.allocation_tracker.len(),
            "deep clone finished"
        );
        Ok((cloned, schema.clone()))
    }

    /// Clone a single item. See [`clone_slice`](Self::clone_slice).
    pub fn clone_item(
        &mut self,
        item: &DataItem,
        schema: &DataItem,
        bag: &DataBag,
        fallbacks: &[&DataBag],
    ) -> Result<(DataItem, DataItem)> {
        let (cloned, schema) =
            self.clone_slice(&DataSlice::new(vec![item.clone()]), schema, bag, fallbacks)?;
        let item = cloned.into_iter().next().unwrap_or_default();
        Ok((item, schema))
    }
}

struct DeepCloneVisitor<'b> {
    new_bag: &'b mut DataBag,
    is_schema_slice: bool,
    allocation_tracker: HashMap<AllocationId, AllocationId>,
}

impl<'b> DeepCloneVisitor<'b> {
    fn new(new_bag: &'b mut DataBag, is_schema_slice: bool) -> Self {
        Self {
            new_bag,
            is_schema_slice,
            allocation_tracker: HashMap::new(),
        }
    }

    fn fork(&mut self, id: ObjectId) {
        self.allocation_tracker
            .entry(id.allocation())
            .or_insert_with(|| new_allocation_id_like(id.allocation()));
    }

    fn previsit_object(&mut self, item: &DataItem) {
        if let Some(id) = item.as_object_id() {
            self.fork(id);
        }
    }

    fn previsit_schema(&mut self, item: &DataItem) {
        let Some(id) = item.as_object_id() else {
            return;
        };
        if id.is_nofollow_schema() {
            return;
        }
        if id.is_implicit_schema() || self.is_schema_slice {
            self.fork(id);
        }
    }

    fn mapped(&self, id: ObjectId) -> Result<ObjectId> {
        self.allocation_tracker
            .get(&id.allocation())
            .map(|alloc| alloc.object_by_offset(id.offset()))
            .ok_or_else(|| Error::AllocationNotFound(id.into()))
    }

    fn new_id(&self, id: ObjectId, schema: &DataItem) -> Result<ObjectId> {
        self.get_value(&id.into(), schema)?
            .as_object_id()
            .ok_or_else(|| Error::AllocationNotFound(id.into()))
    }

    fn set_schema_attr(&mut self, new_item: ObjectId, schema: &DataItem) -> Result<()> {
        let own_schema = self.get_value(schema, &DType::Schema.into())?;
        self.new_bag.set_attr(new_item, SCHEMA_ATTR, own_schema)
    }
}

impl Visitor for DeepCloneVisitor<'_> {
    fn previsit(&mut self, item: &DataItem, schema: &DataItem) -> Result<()> {
        match schema {
            DataItem::ObjectId(s) if s.is_nofollow_schema() => {}
            DataItem::ObjectId(_) | DataItem::DType(DType::Object) => self.previsit_object(item),
            DataItem::DType(DType::Any) => {
                return Err(Error::UnsupportedSchema {
                    schema: schema.clone(),
                    item: item.clone(),
                })
            }
            DataItem::DType(DType::Schema) => self.previsit_schema(item),
            DataItem::DType(_) => {}
            other => {
                return Err(Error::invalid(format!(
                    "unsupported schema type: {other}"
                )))
            }
        }
        Ok(())
    }

    fn get_value(&self, item: &DataItem, schema: &DataItem) -> Result<DataItem> {
        let Some(id) = item.as_object_id() else {
            return Ok(item.clone());
        };
        if id.is_schema() {
            let shared = id.is_nofollow_schema()
                || (!id.is_implicit_schema() && !self.is_schema_slice);
            return if shared {
                Ok(item.clone())
            } else {
                self.mapped(id).map(DataItem::from)
            };
        }
        if schema.is_dtype(DType::Object) || entity_schema_id(schema).is_some() {
            self.mapped(id).map(DataItem::from)
        } else {
            Ok(item.clone())
        }
    }

    fn visit_list(
        &mut self,
        list: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        items: &[DataItem],
    ) -> Result<()> {
        debug_assert!(list.is_list());
        let new_list = self.new_id(list, schema)?;
        if is_object_schema {
            self.set_schema_attr(new_list, schema)?;
        }
        self.new_bag.extend_list(new_list, items.iter().cloned())
    }

    fn visit_dict(
        &mut self,
        dict: ObjectId,
        schema: &DataItem,
        is_object_schema: bool,
        keys: &[DataItem],
        values: &[DataItem],
    ) -> Result<()> {
        debug_assert!(dict.is_dict());
        debug_assert_eq!(keys.len(), values.len());
        let new_dict = self.new_id(dict, schema)?;
        if is_object_schema {
            self.set_schema_attr(new_dict, schema)?;
        }
        for (key, value) in keys.iter().zip(values) {
            self.new_bag
                .set_in_dict(new_dict, key.clone(), value.clone())?;
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
        debug_assert_eq!(attr_names.len(), attr_values.len());
        let new_object = self.new_id(object, schema)?;
        if is_object_schema {
            self.set_schema_attr(new_object, schema)?;
        }
        let is_schema_record = schema.is_dtype(DType::Schema);
        for (name, value) in attr_names.iter().zip(attr_values) {
            if !value.is_present() {
                continue;
            }
            if is_schema_record {
                self.new_bag
                    .set_schema_attr(new_object, name, value.clone())?;
            } else {
                self.new_bag.set_attr(new_object, name, value.clone())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{allocate_explicit_schema, allocate_implicit_schemas, allocate_objects};

    #[test]
    fn previsit_forks_allocation_once() {
        let mut bag = DataBag::new();
        let mut visitor = DeepCloneVisitor::new(&mut bag, false);
        let objs = allocate_objects(3);
        let schema: DataItem = DType::Object.into();

        visitor.previsit(&objs.object_by_offset(0).into(), &schema).unwrap();
        visitor.previsit(&objs.object_by_offset(2).into(), &schema).unwrap();
        assert_eq!(visitor.allocation_tracker.len(), 1);

        let a = visitor.get_value(&objs.object_by_offset(0).into(), &schema).unwrap();
        let c = visitor.get_value(&objs.object_by_offset(2).into(), &schema).unwrap();
        let (a, c) = (a.as_object_id().unwrap(), c.as_object_id().unwrap());
        assert_eq!(a.allocation(), c.allocation());
        assert_ne!(a.allocation(), objs);
        assert_eq!(c.offset(), 2);
    }

    #[test]
    fn unprevisited_object_is_not_found() {
        let mut bag = DataBag::new();
        let visitor = DeepCloneVisitor::new(&mut bag, false);
        let obj: DataItem = allocate_objects(1).object_by_offset(0).into();
        assert_eq!(
            visitor.get_value(&obj, &DType::Object.into()).unwrap_err(),
            Error::AllocationNotFound(obj)
        );
    }

    #[test]
    fn explicit_schemas_are_shared_unless_cloning_schemas() {
        let schema: DataItem = allocate_explicit_schema().into();
        let marker: DataItem = DType::Schema.into();

        let mut bag = DataBag::new();
        let mut visitor = DeepCloneVisitor::new(&mut bag, false);
        visitor.previsit(&schema, &marker).unwrap();
        assert_eq!(visitor.get_value(&schema, &marker).unwrap(), schema);

        let mut bag = DataBag::new();
        let mut visitor = DeepCloneVisitor::new(&mut bag, true);
        visitor.previsit(&schema, &marker).unwrap();
        assert_ne!(visitor.get_value(&schema, &marker).unwrap(), schema);
    }

    #[test]
    fn implicit_schemas_fork_as_implicit() {
        let schema: DataItem = allocate_implicit_schemas(1).object_by_offset(0).into();
        let marker: DataItem = DType::Schema.into();
        let mut bag = DataBag::new();
        let mut visitor = DeepCloneVisitor::new(&mut bag, false);
        visitor.previsit(&schema, &marker).unwrap();

        let forked = visitor.get_value(&schema, &marker).unwrap();
        let forked = forked.as_object_id().unwrap();
        assert_ne!(DataItem::from(forked), schema);
        assert!(forked.is_implicit_schema());
    }

    #[test]
    fn leaves_pass_through() {
        let mut bag = DataBag::new();
        let visitor = DeepCloneVisitor::new(&mut bag, false);
        let obj: DataItem = allocate_objects(1).object_by_offset(0).into();
        let nofollow: DataItem = allocate_explicit_schema().nofollow().into();

        assert_eq!(visitor.get_value(&obj, &DType::ItemId.into()).unwrap(), obj);
        assert_eq!(visitor.get_value(&obj, &nofollow).unwrap(), obj);
        assert_eq!(visitor.get_value(&nofollow, &DType::Schema.into()).unwrap(), nofollow);
        assert_eq!(
            visitor.get_value(&3i32.into(), &DType::Int32.into()).unwrap(),
            3i32.into()
        );
    }

    #[test]
    fn any_is_unsupported() {
        let mut bag = DataBag::new();
        let mut visitor = DeepCloneVisitor::new(&mut bag, false);
        let err = visitor
            .previsit(&1i32.into(), &DType::Any.into())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchema { .. }));
    }
}
