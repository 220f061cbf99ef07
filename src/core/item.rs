//! core::item
//!
//! Tagged scalar values and ordered slices of them.
//!
//! # Types
//!
//! - [`DataItem`] - Missing, a primitive scalar, an object id or a dtype marker
//! - [`DataSlice`] - An ordered sequence of items
//!
//! A [`DataItem`] doubles as a schema: a [`DType`] value or a schema-kind
//! [`ObjectId`]. Floats compare and hash by bit pattern so that items can
//! key dicts.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

use super::dtype::DType;
use super::ids::{AllocationId, ObjectId};

/// An immutable tagged value.
#[derive(Debug, Clone, Default)]
pub enum DataItem {
    #[default]
    Missing,
    /// The present unit value of a mask.
    Mask,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Opaque expression source, never evaluated here.
    Expr(String),
    ObjectId(ObjectId),
    DType(DType),
}

impl DataItem {
    pub fn is_present(&self) -> bool {
        !matches!(self, DataItem::Missing)
    }

    /// The dtype of the value itself.
    pub fn dtype(&self) -> DType {
        match self {
            DataItem::Missing => DType::None,
            DataItem::Mask => DType::Mask,
            DataItem::Bool(_) => DType::Bool,
            DataItem::Int32(_) => DType::Int32,
            DataItem::Int64(_) => DType::Int64,
            DataItem::Float32(_) => DType::Float32,
            DataItem::Float64(_) => DType::Float64,
            DataItem::Text(_) => DType::Text,
            DataItem::Bytes(_) => DType::Bytes,
            DataItem::Expr(_) => DType::Expr,
            DataItem::ObjectId(id) if id.is_schema() => DType::Schema,
            DataItem::ObjectId(_) => DType::ItemId,
            DataItem::DType(_) => DType::Schema,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            DataItem::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_dtype(&self) -> Option<DType> {
        match self {
            DataItem::DType(dtype) => Some(*dtype),
            _ => None,
        }
    }

    /// Check whether this item can be read as a schema.
    pub fn is_schema(&self) -> bool {
        match self {
            DataItem::DType(_) => true,
            DataItem::ObjectId(id) => id.is_schema(),
            _ => false,
        }
    }

    /// Check whether this item is the given dtype marker.
    pub fn is_dtype(&self, dtype: DType) -> bool {
        self.as_dtype() == Some(dtype)
    }

    /// Text shorthand for attribute-name keys.
    pub fn text(value: impl Into<String>) -> Self {
        DataItem::Text(value.into())
    }
}

impl PartialEq for DataItem {
    fn eq(&self, other: &Self) -> bool {
        use DataItem::*;
        match (self, other) {
            (Missing, Missing) | (Mask, Mask) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Float32(a), Float32(b)) => a.to_bits() == b.to_bits(),
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (Text(a), Text(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Expr(a), Expr(b)) => a == b,
            (ObjectId(a), ObjectId(b)) => a == b,
            (DType(a), DType(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataItem {}

impl Hash for DataItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            DataItem::Missing | DataItem::Mask => {}
            DataItem::Bool(v) => v.hash(state),
            DataItem::Int32(v) => v.hash(state),
            DataItem::Int64(v) => v.hash(state),
            DataItem::Float32(v) => v.to_bits().hash(state),
            DataItem::Float64(v) => v.to_bits().hash(state),
            DataItem::Text(v) | DataItem::Expr(v) => v.hash(state),
            DataItem::Bytes(v) => v.hash(state),
            DataItem::ObjectId(v) => v.hash(state),
            DataItem::DType(v) => v.hash(state),
        }
    }
}

impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataItem::Missing => f.write_str("None"),
            DataItem::Mask => f.write_str("present"),
            DataItem::Bool(v) => write!(f, "{v}"),
            DataItem::Int32(v) => write!(f, "{v}"),
            DataItem::Int64(v) => write!(f, "{v}"),
            DataItem::Float32(v) => write!(f, "{v}"),
            DataItem::Float64(v) => write!(f, "{v}"),
            DataItem::Text(v) => write!(f, "'{v}'"),
            DataItem::Bytes(v) => write!(f, "b'{}'", v.escape_ascii()),
            DataItem::Expr(v) => write!(f, "expr({v})"),
            DataItem::ObjectId(v) => write!(f, "{v}"),
            DataItem::DType(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for DataItem {
    fn from(v: bool) -> Self {
        DataItem::Bool(v)
    }
}

impl From<i32> for DataItem {
    fn from(v: i32) -> Self {
        DataItem::Int32(v)
    }
}

impl From<i64> for DataItem {
    fn from(v: i64) -> Self {
        DataItem::Int64(v)
    }
}

impl From<f32> for DataItem {
    fn from(v: f32) -> Self {
        DataItem::Float32(v)
    }
}

impl From<f64> for DataItem {
    fn from(v: f64) -> Self {
        DataItem::Float64(v)
    }
}

impl From<&str> for DataItem {
    fn from(v: &str) -> Self {
        DataItem::Text(v.to_string())
    }
}

impl From<String> for DataItem {
    fn from(v: String) -> Self {
        DataItem::Text(v)
    }
}

impl From<Vec<u8>> for DataItem {
    fn from(v: Vec<u8>) -> Self {
        DataItem::Bytes(v)
    }
}

impl From<ObjectId> for DataItem {
    fn from(v: ObjectId) -> Self {
        DataItem::ObjectId(v)
    }
}

impl From<DType> for DataItem {
    fn from(v: DType) -> Self {
        DataItem::DType(v)
    }
}

impl<T: Into<DataItem>> From<Option<T>> for DataItem {
    fn from(v: Option<T>) -> Self {
        v.map_or(DataItem::Missing, Into::into)
    }
}

/// An ordered sequence of [`DataItem`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSlice(Vec<DataItem>);

impl DataSlice {
    pub fn new(items: Vec<DataItem>) -> Self {
        Self(items)
    }

    /// The first `n` ids of `alloc`, as a slice.
    pub fn objects_from_allocation(alloc: AllocationId, n: usize) -> Self {
        alloc.ids().take(n).map(DataItem::ObjectId).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of items that are not missing.
    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|item| item.is_present()).count()
    }

    pub fn get(&self, i: usize) -> Option<&DataItem> {
        self.0.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataItem> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[DataItem] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<DataItem> {
        self.0
    }
}

impl Index<usize> for DataSlice {
    type Output = DataItem;

    fn index(&self, i: usize) -> &DataItem {
        &self.0[i]
    }
}

impl FromIterator<DataItem> for DataSlice {
    fn from_iter<I: IntoIterator<Item = DataItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DataSlice {
    type Item = DataItem;
    type IntoIter = std::vec::IntoIter<DataItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DataSlice {
    type Item = &'a DataItem;
    type IntoIter = std::slice::Iter<'a, DataItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<DataItem>> for DataSlice {
    fn from(items: Vec<DataItem>) -> Self {
        Self(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{allocate_explicit_schema, allocate_objects};
    use std::collections::HashSet;

    #[test]
    fn dtype_of_values() {
        assert_eq!(DataItem::Missing.dtype(), DType::None);
        assert_eq!(DataItem::from(1i32).dtype(), DType::Int32);
        assert_eq!(DataItem::from("a").dtype(), DType::Text);
        assert_eq!(DataItem::from(DType::Int32).dtype(), DType::Schema);

        let obj = allocate_objects(1).object_by_offset(0);
        assert_eq!(DataItem::from(obj).dtype(), DType::ItemId);
        assert_eq!(
            DataItem::from(allocate_explicit_schema()).dtype(),
            DType::Schema
        );
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(DataItem::from(f32::NAN), DataItem::from(f32::NAN));
        assert_ne!(DataItem::from(0.0f64), DataItem::from(-0.0f64));
        assert_ne!(DataItem::from(1i32), DataItem::from(1i64));
    }

    #[test]
    fn items_hash_consistently() {
        let mut set = HashSet::new();
        set.insert(DataItem::from(1.5f64));
        set.insert(DataItem::from(1.5f64));
        set.insert(DataItem::text("x"));
        set.insert(DataItem::Expr("x".into()));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn schema_items() {
        assert!(DataItem::from(DType::Object).is_schema());
        assert!(DataItem::from(allocate_explicit_schema()).is_schema());
        assert!(!DataItem::from(allocate_objects(1).object_by_offset(0)).is_schema());
        assert!(!DataItem::from(3i32).is_schema());
        assert!(DataItem::from(DType::Any).is_dtype(DType::Any));
    }

    #[test]
    fn option_converts_to_missing() {
        assert_eq!(DataItem::from(None::<i32>), DataItem::Missing);
        assert_eq!(DataItem::from(Some(2i32)), DataItem::Int32(2));
    }

    #[test]
    fn slice_helpers() {
        let alloc = allocate_objects(3);
        let slice = DataSlice::objects_from_allocation(alloc, 3);
        assert_eq!(slice.len(), 3);
        assert_eq!(slice[2], DataItem::from(alloc.object_by_offset(2)));

        let mixed = DataSlice::new(vec![1i32.into(), DataItem::Missing, "a".into()]);
        assert_eq!(mixed.present_count(), 2);
        assert!(!mixed.is_empty());
    }

    #[test]
    fn display_formats() {
        assert_eq!(DataItem::Missing.to_string(), "None");
        assert_eq!(DataItem::text("hi").to_string(), "'hi'");
        assert_eq!(DataItem::from(DType::Int64).to_string(), "INT64");
        assert_eq!(DataItem::from(b"ab".to_vec()).to_string(), "b'ab'");
    }
}
