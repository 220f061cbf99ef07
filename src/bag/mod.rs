//! bag
//!
//! In-memory triple store with fallback-chain reads.
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | attributes | object id, attribute name | item |
//! | lists | list id | ordered items |
//! | dicts | dict id, key item | item |
//!
//! Schema records live in the dict table, keyed by the attribute name as a
//! text item. Insertion order is preserved for iteration; equality ignores
//! it.
//!
//! # Fallbacks
//!
//! A [`BagView`] reads a main bag and then an ordered chain of read-only
//! fallback bags. Resolution is per key: the first bag that holds a key
//! answers for it, and a stored missing value shadows later bags. Nothing
//! is merged across bags except the name and key listings, which are the
//! union of the chain filtered to keys that resolve to a present value.
//!
//! # Example
//!
//! ```
//! use koda_store::bag::DataBag;
//! use koda_store::core::ids::allocate_objects;
//!
//! let obj = allocate_objects(1).object_by_offset(0);
//!
//! let mut base = DataBag::new();
//! base.set_attr(obj, "x", 1i32.into()).unwrap();
//! base.set_attr(obj, "y", 2i32.into()).unwrap();
//!
//! let mut overlay = DataBag::new();
//! overlay.set_attr(obj, "x", 10i32.into()).unwrap();
//!
//! let view = overlay.view(&[&base]);
//! assert_eq!(view.get_attr(obj, "x"), 10i32.into());
//! assert_eq!(view.get_attr(obj, "y"), 2i32.into());
//! ```

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::core::errors::{Error, Result};
use crate::core::ids::{allocate_explicit_schema, ObjectId};
use crate::core::item::DataItem;
use crate::schema::{verify_dict_key_schema, DICT_KEYS_ATTR, DICT_VALUES_ATTR, LIST_ITEMS_ATTR};

/// An in-memory store of attributes, lists, dicts and schema records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBag {
    attrs: HashMap<ObjectId, IndexMap<String, DataItem>>,
    lists: HashMap<ObjectId, Vec<DataItem>>,
    dicts: HashMap<ObjectId, IndexMap<DataItem, DataItem>>,
}

impl DataBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this bag followed by `fallbacks`.
    pub fn view<'a>(&'a self, fallbacks: &[&'a DataBag]) -> BagView<'a> {
        BagView {
            main: self,
            fallbacks: fallbacks.to_vec(),
        }
    }

    /// Check whether the bag holds no triples at all.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.lists.is_empty() && self.dicts.is_empty()
    }

    /// Number of stored triples (attributes, list items and dict entries).
    pub fn triple_count(&self) -> usize {
        self.attrs.values().map(IndexMap::len).sum::<usize>()
            + self.lists.values().map(Vec::len).sum::<usize>()
            + self.dicts.values().map(IndexMap::len).sum::<usize>()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Set or overwrite an attribute of an entity, list or dict.
    pub fn set_attr(&mut self, obj: ObjectId, name: &str, value: DataItem) -> Result<()> {
        if obj.is_schema() {
            return Err(Error::invalid(format!(
                "cannot set attribute '{name}' on schema {obj}; use set_schema_attr"
            )));
        }
        self.attrs
            .entry(obj)
            .or_default()
            .insert(name.to_string(), value);
        Ok(())
    }

    /// Declare the schema of attribute `name` in a schema record.
    pub fn set_schema_attr(&mut self, schema: ObjectId, name: &str, value: DataItem) -> Result<()> {
        if !schema.is_schema() || schema.is_nofollow_schema() {
            return Err(Error::invalid(format!(
                "cannot set schema attribute '{name}' on {schema}: not a schema"
            )));
        }
        if value.is_present() && !value.is_schema() {
            return Err(Error::invalid(format!(
                "schema attribute '{name}' must be a schema, got: {value}"
            )));
        }
        self.dicts
            .entry(schema)
            .or_default()
            .insert(DataItem::text(name), value);
        Ok(())
    }

    /// Append items to a list, creating it if needed.
    pub fn extend_list(
        &mut self,
        list: ObjectId,
        items: impl IntoIterator<Item = DataItem>,
    ) -> Result<()> {
        if !list.is_list() {
            return Err(Error::invalid(format!("{list} is not a list")));
        }
        self.lists.entry(list).or_default().extend(items);
        Ok(())
    }

    /// Insert or overwrite a dict entry.
    pub fn set_in_dict(&mut self, dict: ObjectId, key: DataItem, value: DataItem) -> Result<()> {
        if !dict.is_dict() {
            return Err(Error::invalid(format!("{dict} is not a dict")));
        }
        verify_dict_key_schema(&key.dtype().into())?;
        self.dicts.entry(dict).or_default().insert(key, value);
        Ok(())
    }

    /// Create an explicit entity schema declaring `attrs`.
    pub fn create_entity_schema(&mut self, attrs: &[(&str, DataItem)]) -> Result<ObjectId> {
        let schema = allocate_explicit_schema();
        for (name, value) in attrs {
            self.set_schema_attr(schema, name, value.clone())?;
        }
        Ok(schema)
    }

    /// Create an explicit list schema with the given item schema.
    pub fn create_list_schema(&mut self, item_schema: DataItem) -> Result<ObjectId> {
        self.create_entity_schema(&[(LIST_ITEMS_ATTR, item_schema)])
    }

    /// Create an explicit dict schema with the given key and value schemas.
    pub fn create_dict_schema(
        &mut self,
        key_schema: DataItem,
        value_schema: DataItem,
    ) -> Result<ObjectId> {
        verify_dict_key_schema(&key_schema)?;
        self.create_entity_schema(&[(DICT_KEYS_ATTR, key_schema), (DICT_VALUES_ATTR, value_schema)])
    }

    // =========================================================================
    // Local reads
    // =========================================================================

    fn local_attr(&self, obj: ObjectId, name: &str) -> Option<&DataItem> {
        self.attrs.get(&obj)?.get(name)
    }

    fn local_dict(&self, dict: ObjectId, key: &DataItem) -> Option<&DataItem> {
        self.dicts.get(&dict)?.get(key)
    }

    fn local_list(&self, list: ObjectId) -> Option<&[DataItem]> {
        self.lists.get(&list).map(Vec::as_slice)
    }

    pub fn get_attr(&self, obj: ObjectId, name: &str) -> DataItem {
        self.view(&[]).get_attr(obj, name)
    }

    pub fn get_schema_attr(&self, schema: ObjectId, name: &str) -> DataItem {
        self.view(&[]).get_schema_attr(schema, name)
    }

    pub fn get_from_dict(&self, dict: ObjectId, key: &DataItem) -> DataItem {
        self.view(&[]).get_from_dict(dict, key)
    }

    pub fn attr_names(&self, obj: ObjectId) -> Vec<String> {
        self.view(&[]).attr_names(obj)
    }

    pub fn schema_attr_names(&self, schema: ObjectId) -> Vec<String> {
        self.view(&[]).schema_attr_names(schema)
    }

    pub fn list_items(&self, list: ObjectId) -> &[DataItem] {
        self.local_list(list).unwrap_or_default()
    }

    pub fn dict_keys(&self, dict: ObjectId) -> Vec<DataItem> {
        self.view(&[]).dict_keys(dict)
    }
}

/// Read access to a main bag and its fallbacks.
#[derive(Debug, Clone)]
pub struct BagView<'a> {
    main: &'a DataBag,
    fallbacks: Vec<&'a DataBag>,
}

impl<'a> BagView<'a> {
    /// Bags in resolution order.
    pub fn chain(&self) -> impl Iterator<Item = &'a DataBag> + '_ {
        std::iter::once(self.main).chain(self.fallbacks.iter().copied())
    }

    pub fn get_attr(&self, obj: ObjectId, name: &str) -> DataItem {
        self.chain()
            .find_map(|bag| bag.local_attr(obj, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_schema_attr(&self, schema: ObjectId, name: &str) -> DataItem {
        self.get_from_dict(schema, &DataItem::text(name))
    }

    pub fn get_from_dict(&self, dict: ObjectId, key: &DataItem) -> DataItem {
        self.chain()
            .find_map(|bag| bag.local_dict(dict, key))
            .cloned()
            .unwrap_or_default()
    }

    /// Names of the present attributes of `obj`, in chain then insertion order.
    pub fn attr_names(&self, obj: ObjectId) -> Vec<String> {
        let names: IndexSet<&String> = self
            .chain()
            .filter_map(|bag| bag.attrs.get(&obj))
            .flat_map(IndexMap::keys)
            .collect();
        names
            .into_iter()
            .filter(|name| self.get_attr(obj, name).is_present())
            .cloned()
            .collect()
    }

    /// Names declared by a schema record, in chain then insertion order.
    pub fn schema_attr_names(&self, schema: ObjectId) -> Vec<String> {
        self.dict_keys(schema)
            .into_iter()
            .filter_map(|key| match key {
                DataItem::Text(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Items of a list, taken from the first bag that holds it.
    pub fn list_items(&self, list: ObjectId) -> &'a [DataItem] {
        self.chain()
            .find_map(|bag| bag.local_list(list))
            .unwrap_or_default()
    }

    pub fn get_from_list(&self, list: ObjectId, index: usize) -> DataItem {
        self.list_items(list)
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Keys of a dict with a present value, in chain then insertion order.
    pub fn dict_keys(&self, dict: ObjectId) -> Vec<DataItem> {
        let keys: IndexSet<&DataItem> = self
            .chain()
            .filter_map(|bag| bag.dicts.get(&dict))
            .flat_map(IndexMap::keys)
            .collect();
        keys.into_iter()
            .filter(|key| self.get_from_dict(dict, key).is_present())
            .cloned()
            .collect()
    }
}
