//! core::ids
//!
//! Identity model: object and allocation identifiers.
//!
//! # Types
//!
//! - [`AllocationId`] - A contiguous block of ids created together
//! - [`ObjectId`] - One id inside an allocation (allocation + offset)
//!
//! # Kind Bits
//!
//! The kind of an id (list, dict, schema, ...) is carried by its allocation,
//! so every id of a block shares it. Ids are plain values: equality is
//! structural and nothing ever changes an id after it has been created.
//!
//! # Allocation
//!
//! Fresh bases come from a process-wide counter. UUID-derived ids are
//! instead computed from a SHA-256 hash of their inputs, so equal inputs
//! always yield equal ids.
//!
//! # Example
//!
//! ```
//! use koda_store::core::ids::{allocate_objects, new_allocation_id_like};
//!
//! let alloc = allocate_objects(3);
//! let a1 = alloc.object_by_offset(1);
//! assert!(alloc.contains(a1));
//!
//! // A "like" allocation keeps capacity and kind but gets a fresh base.
//! let copy = new_allocation_id_like(alloc);
//! assert_ne!(copy, alloc);
//! assert_eq!(copy.capacity(), alloc.capacity());
//! assert_eq!(copy.object_by_offset(1).offset(), a1.offset());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind bits stored on an allocation.
mod flags {
    pub const LIST: u8 = 1 << 0;
    pub const DICT: u8 = 1 << 1;
    pub const SCHEMA: u8 = 1 << 2;
    pub const IMPLICIT_SCHEMA: u8 = 1 << 3;
    pub const NOFOLLOW_SCHEMA: u8 = 1 << 4;
    pub const UUID: u8 = 1 << 5;
}

/// Base 0 is never handed out by the counter.
static NEXT_BASE: AtomicU64 = AtomicU64::new(1);

fn next_base() -> u64 {
    NEXT_BASE.fetch_add(1, Ordering::Relaxed)
}

/// A named contiguous block of object ids created together.
///
/// The block has a fixed capacity and a fixed kind. Allocating "like"
/// another block yields a new block of identical capacity and kind, which
/// lets a copy preserve the relative offsets of co-allocated objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId {
    base: u64,
    capacity: u32,
    flags: u8,
}

impl AllocationId {
    const fn with_flags(base: u64, capacity: u32, flags: u8) -> Self {
        Self {
            base,
            capacity,
            flags,
        }
    }

    fn fresh(capacity: usize, flags: u8) -> Self {
        let capacity = u32::try_from(capacity.max(1)).unwrap_or(u32::MAX);
        Self::with_flags(next_base(), capacity, flags)
    }

    /// Number of ids in this block.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// The `offset`-th id of this block.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not smaller than [`capacity`](Self::capacity).
    pub fn object_by_offset(&self, offset: usize) -> ObjectId {
        assert!(
            offset < self.capacity(),
            "offset {offset} out of range for capacity {}",
            self.capacity
        );
        ObjectId {
            allocation: *self,
            offset: offset as u32,
        }
    }

    /// Check whether `id` belongs to this block.
    pub fn contains(&self, id: ObjectId) -> bool {
        id.allocation == *self
    }

    /// Iterate over every id of this block in offset order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.capacity()).map(move |i| self.object_by_offset(i))
    }

    /// Check whether ids of this block are lists.
    pub fn is_list(&self) -> bool {
        self.flags & flags::LIST != 0
    }

    /// Check whether ids of this block are dicts.
    pub fn is_dict(&self) -> bool {
        self.flags & flags::DICT != 0
    }

    /// Check whether ids of this block are schemas.
    pub fn is_schema(&self) -> bool {
        self.flags & flags::SCHEMA != 0
    }

    /// Check whether this block was derived from a hash rather than the counter.
    pub fn is_uuid(&self) -> bool {
        self.flags & flags::UUID != 0
    }

    fn kind_name(&self) -> &'static str {
        if self.flags & flags::NOFOLLOW_SCHEMA != 0 {
            "nofollow"
        } else if self.flags & flags::IMPLICIT_SCHEMA != 0 {
            "implicit"
        } else if self.is_schema() {
            "schema"
        } else if self.is_list() {
            "list"
        } else if self.is_dict() {
            "dict"
        } else {
            "entity"
        }
    }
}

/// A globally unique, value-typed reference to an object.
///
/// An id is an allocation plus an offset inside it. Kind predicates read the
/// allocation's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    allocation: AllocationId,
    offset: u32,
}

/// Reserved id standing for the nofollowed OBJECT schema.
pub const NOFOLLOW_OBJECT_SCHEMA: ObjectId = ObjectId {
    allocation: AllocationId::with_flags(0, 1, flags::SCHEMA | flags::NOFOLLOW_SCHEMA),
    offset: 0,
};

impl ObjectId {
    /// The allocation this id belongs to.
    pub fn allocation(&self) -> AllocationId {
        self.allocation
    }

    /// Position of this id inside its allocation.
    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn is_list(&self) -> bool {
        self.allocation.is_list()
    }

    pub fn is_dict(&self) -> bool {
        self.allocation.is_dict()
    }

    pub fn is_schema(&self) -> bool {
        self.allocation.is_schema()
    }

    /// An entity: neither a list, a dict nor a schema.
    pub fn is_entity(&self) -> bool {
        self.allocation.flags & (flags::LIST | flags::DICT | flags::SCHEMA) == 0
    }

    pub fn is_implicit_schema(&self) -> bool {
        self.is_schema() && self.allocation.flags & flags::IMPLICIT_SCHEMA != 0
    }

    pub fn is_nofollow_schema(&self) -> bool {
        self.is_schema() && self.allocation.flags & flags::NOFOLLOW_SCHEMA != 0
    }

    /// A schema that is neither implicit nor a nofollow wrapper.
    pub fn is_explicit_schema(&self) -> bool {
        self.is_schema() && !self.is_implicit_schema() && !self.is_nofollow_schema()
    }

    pub fn is_uuid(&self) -> bool {
        self.allocation.is_uuid()
    }

    /// Wrap a schema id into its nofollow form.
    ///
    /// Callers are expected to check [`is_schema`](Self::is_schema) first;
    /// see [`crate::schema::nofollow_schema_item`] for the validated form.
    pub fn nofollow(self) -> ObjectId {
        let mut id = self;
        id.allocation.flags |= flags::NOFOLLOW_SCHEMA;
        id
    }

    /// Recover the schema wrapped by a nofollow id.
    pub fn nofollowed(self) -> ObjectId {
        let mut id = self;
        id.allocation.flags &= !flags::NOFOLLOW_SCHEMA;
        id
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}:{:016x}:{}",
            self.allocation.kind_name(),
            self.allocation.base,
            self.offset
        )
    }
}

/// Allocate `size` fresh entity ids.
pub fn allocate_objects(size: usize) -> AllocationId {
    AllocationId::fresh(size, 0)
}

/// Allocate `size` fresh list ids.
pub fn allocate_lists(size: usize) -> AllocationId {
    AllocationId::fresh(size, flags::LIST)
}

/// Allocate `size` fresh dict ids.
pub fn allocate_dicts(size: usize) -> AllocationId {
    AllocationId::fresh(size, flags::DICT)
}

/// Allocate `size` fresh explicit schema ids.
pub fn allocate_explicit_schemas(size: usize) -> AllocationId {
    AllocationId::fresh(size, flags::SCHEMA)
}

/// Allocate `size` fresh implicit schema ids.
pub fn allocate_implicit_schemas(size: usize) -> AllocationId {
    AllocationId::fresh(size, flags::SCHEMA | flags::IMPLICIT_SCHEMA)
}

/// Allocate a single explicit schema id.
pub fn allocate_explicit_schema() -> ObjectId {
    allocate_explicit_schemas(1).object_by_offset(0)
}

/// Allocate a block with the same capacity and kind as `alloc`.
///
/// The result is never UUID-derived, even when `alloc` is.
pub fn new_allocation_id_like(alloc: AllocationId) -> AllocationId {
    AllocationId::fresh(alloc.capacity(), alloc.flags & !flags::UUID)
}

fn uuid_base(parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

fn uuid_id(kind: u8, parts: &[&[u8]]) -> ObjectId {
    AllocationId::with_flags(uuid_base(parts), 1, kind | flags::UUID).object_by_offset(0)
}

/// Create a deterministic entity id from a seed and named parts.
///
/// # Example
///
/// ```
/// use koda_store::core::ids::create_uuid_object;
///
/// let a = create_uuid_object("point", &[("x", "1"), ("y", "2")]);
/// let b = create_uuid_object("point", &[("x", "1"), ("y", "2")]);
/// assert_eq!(a, b);
/// assert!(a.is_uuid());
/// ```
pub fn create_uuid_object(seed: &str, parts: &[(&str, &str)]) -> ObjectId {
    let mut bytes: Vec<&[u8]> = vec![seed.as_bytes()];
    for (name, value) in parts {
        bytes.push(name.as_bytes());
        bytes.push(value.as_bytes());
    }
    uuid_id(0, &bytes)
}

/// Create a deterministic explicit schema id from a seed and attribute names.
///
/// Attribute order does not matter.
pub fn create_uu_schema(seed: &str, attr_names: &[&str]) -> ObjectId {
    let mut names = attr_names.to_vec();
    names.sort_unstable();
    let mut bytes: Vec<&[u8]> = vec![b"uu_schema", seed.as_bytes()];
    bytes.extend(names.iter().map(|n| n.as_bytes()));
    uuid_id(flags::SCHEMA, &bytes)
}

/// Create the implicit schema id owned by `main_object`.
pub fn create_implicit_schema(main_object: ObjectId, salt: &str) -> ObjectId {
    let base = main_object.allocation.base.to_be_bytes();
    let offset = main_object.offset.to_be_bytes();
    uuid_id(
        flags::SCHEMA | flags::IMPLICIT_SCHEMA,
        &[b"implicit_schema", &base, &offset, salt.as_bytes()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_allocation() {
        let obj = allocate_objects(2).object_by_offset(1);
        assert!(obj.is_entity());
        assert!(!obj.is_list() && !obj.is_dict() && !obj.is_schema());

        let list = allocate_lists(1).object_by_offset(0);
        assert!(list.is_list());
        assert!(!list.is_entity());

        let dict = allocate_dicts(1).object_by_offset(0);
        assert!(dict.is_dict());

        let schema = allocate_explicit_schema();
        assert!(schema.is_schema());
        assert!(schema.is_explicit_schema());
        assert!(!schema.is_implicit_schema());

        let implicit = allocate_implicit_schemas(1).object_by_offset(0);
        assert!(implicit.is_implicit_schema());
        assert!(!implicit.is_explicit_schema());
    }

    #[test]
    fn fresh_allocations_are_distinct() {
        let a = allocate_objects(4);
        let b = allocate_objects(4);
        assert_ne!(a, b);
        assert_ne!(a.object_by_offset(0), b.object_by_offset(0));
    }

    #[test]
    fn zero_size_allocation_has_one_slot() {
        assert_eq!(allocate_objects(0).capacity(), 1);
    }

    #[test]
    fn like_allocation_keeps_shape() {
        let lists = allocate_lists(7);
        let like = new_allocation_id_like(lists);
        assert_ne!(like, lists);
        assert_eq!(like.capacity(), 7);
        assert!(like.object_by_offset(3).is_list());
        assert_eq!(like.object_by_offset(3).offset(), 3);
    }

    #[test]
    fn like_allocation_drops_uuid_bit() {
        let implicit = create_implicit_schema(allocate_objects(1).object_by_offset(0), "s");
        assert!(implicit.is_uuid());
        let like = new_allocation_id_like(implicit.allocation());
        assert!(!like.is_uuid());
        assert!(like.object_by_offset(0).is_implicit_schema());
    }

    #[test]
    fn contains_and_ids() {
        let alloc = allocate_dicts(3);
        let ids: Vec<_> = alloc.ids().collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| alloc.contains(*id)));
        assert!(!alloc.contains(allocate_dicts(1).object_by_offset(0)));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn offset_past_capacity_panics() {
        allocate_objects(2).object_by_offset(2);
    }

    #[test]
    fn uuid_ids_are_deterministic() {
        let a = create_uu_schema("seed", &["x", "y"]);
        let b = create_uu_schema("seed", &["y", "x"]);
        let c = create_uu_schema("other", &["x", "y"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_explicit_schema());
    }

    #[test]
    fn implicit_schema_depends_on_main_object() {
        let objs = allocate_objects(2);
        let s0 = create_implicit_schema(objs.object_by_offset(0), "");
        let s1 = create_implicit_schema(objs.object_by_offset(1), "");
        assert_ne!(s0, s1);
        assert_eq!(s0, create_implicit_schema(objs.object_by_offset(0), ""));
    }

    #[test]
    fn nofollow_round_trip() {
        let schema = allocate_explicit_schema();
        let wrapped = schema.nofollow();
        assert!(wrapped.is_nofollow_schema());
        assert!(!wrapped.is_explicit_schema());
        assert_ne!(wrapped, schema);
        assert_eq!(wrapped.nofollowed(), schema);
        assert!(NOFOLLOW_OBJECT_SCHEMA.is_nofollow_schema());
    }

    #[test]
    fn display_names_kind() {
        let list = allocate_lists(1).object_by_offset(0);
        assert!(list.to_string().starts_with("$list:"));
        let schema = allocate_explicit_schema();
        assert!(schema.to_string().starts_with("$schema:"));
    }
}
