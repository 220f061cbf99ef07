//! core::dtype
//!
//! Primitive and marker types of the value model.
//!
//! Every [`DType`] has a stable numeric id in `0..DType::COUNT`, which the
//! lattice uses as a bit position. `OBJECT`, `ANY`, `SCHEMA`, `ITEMID` and
//! `NONE` are markers rather than storage types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A primitive DType or a dynamic schema marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DType {
    None,
    ItemId,
    Schema,
    Int32,
    Int64,
    Float32,
    Float64,
    Mask,
    #[serde(rename = "BOOLEAN")]
    Bool,
    Bytes,
    #[serde(rename = "STRING")]
    Text,
    Expr,
    Object,
    Any,
}

impl DType {
    /// Number of distinct dtypes.
    pub const COUNT: usize = 14;

    /// All dtypes in id order.
    pub const ALL: [DType; DType::COUNT] = [
        DType::None,
        DType::ItemId,
        DType::Schema,
        DType::Int32,
        DType::Int64,
        DType::Float32,
        DType::Float64,
        DType::Mask,
        DType::Bool,
        DType::Bytes,
        DType::Text,
        DType::Expr,
        DType::Object,
        DType::Any,
    ];

    /// Stable id of this dtype.
    pub fn id(self) -> usize {
        self as usize
    }

    /// Look up a dtype by id.
    pub fn from_id(id: usize) -> Option<DType> {
        Self::ALL.get(id).copied()
    }

    /// Upper-case display name.
    pub fn name(self) -> &'static str {
        match self {
            DType::None => "NONE",
            DType::ItemId => "ITEMID",
            DType::Schema => "SCHEMA",
            DType::Int32 => "INT32",
            DType::Int64 => "INT64",
            DType::Float32 => "FLOAT32",
            DType::Float64 => "FLOAT64",
            DType::Mask => "MASK",
            DType::Bool => "BOOLEAN",
            DType::Bytes => "BYTES",
            DType::Text => "STRING",
            DType::Expr => "EXPR",
            DType::Object => "OBJECT",
            DType::Any => "ANY",
        }
    }

    /// Check whether values of this dtype are stored scalars.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            DType::Int32
                | DType::Int64
                | DType::Float32
                | DType::Float64
                | DType::Mask
                | DType::Bool
                | DType::Bytes
                | DType::Text
                | DType::Expr
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
