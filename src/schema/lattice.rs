//! schema::lattice
//!
//! The implicit widening order over dtypes.
//!
//! # Structure
//!
//! [`dtype_lattice`] lists, for every dtype, the dtypes it widens to
//! directly. [`DTypeMatrix::build`] closes that relation transitively and
//! precomputes the least upper bound of every pair, so [`common_dtype`] is a
//! table lookup.
//!
//! # Invariant
//!
//! Every pair with a non-empty set of common upper bounds has exactly one
//! least member. A table that breaks this is rejected by
//! [`DTypeMatrix::build`]; for the built-in table that is a fatal bug.

use std::sync::OnceLock;

use thiserror::Error;

use crate::core::dtype::DType;

/// Errors from building a dtype matrix.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LatticeError {
    #[error("dtype lattice is misconfigured: {a} and {b} have no unique common upper bound")]
    Misconfigured { a: DType, b: DType },
}

/// Set of dtypes, one bit per dtype id.
type DTypeSet = u16;

const fn bit(dtype: DType) -> DTypeSet {
    1 << dtype as usize
}

/// Direct widening edges of the built-in lattice.
pub fn dtype_lattice() -> Vec<(DType, Vec<DType>)> {
    use DType::*;
    vec![
        (
            None,
            vec![ItemId, Schema, Int32, Mask, Bool, Bytes, Text, Expr],
        ),
        (ItemId, vec![]),
        (Schema, vec![]),
        (Int32, vec![Int64]),
        (Int64, vec![Float32]),
        (Float32, vec![Float64]),
        (Float64, vec![Object]),
        (Mask, vec![Object]),
        (Bool, vec![Object]),
        (Bytes, vec![Object]),
        (Text, vec![Object]),
        (Expr, vec![Object]),
        (Object, vec![Any]),
        (Any, vec![]),
    ]
}

/// Reachability and least-upper-bound tables of a dtype lattice.
#[derive(Debug, Clone)]
pub struct DTypeMatrix {
    /// `reachable[a]` holds every dtype `a` widens to, `a` included.
    reachable: [DTypeSet; DType::COUNT],
    join: [[Option<DType>; DType::COUNT]; DType::COUNT],
}

impl DTypeMatrix {
    /// Build the tables for `adjacency`.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Misconfigured` for the first pair whose common
    /// upper bounds have no unique least member.
    pub fn build(adjacency: &[(DType, Vec<DType>)]) -> Result<Self, LatticeError> {
        let mut reachable = [0 as DTypeSet; DType::COUNT];
        for dtype in DType::ALL {
            reachable[dtype.id()] = bit(dtype);
        }
        for (from, tos) in adjacency {
            for to in tos {
                reachable[from.id()] |= bit(*to);
            }
        }

        // Floyd-Warshall over bitsets.
        for k in 0..DType::COUNT {
            for i in 0..DType::COUNT {
                if reachable[i] & (1 << k) != 0 {
                    reachable[i] |= reachable[k];
                }
            }
        }

        let mut join = [[None; DType::COUNT]; DType::COUNT];
        for a in DType::ALL {
            for b in DType::ALL {
                let common = reachable[a.id()] & reachable[b.id()];
                if common == 0 {
                    continue;
                }
                let mut lub = DType::ALL
                    .into_iter()
                    .filter(|c| common & bit(*c) != 0 && reachable[c.id()] == common);
                match (lub.next(), lub.next()) {
                    (Some(c), None) => join[a.id()][b.id()] = Some(c),
                    _ => return Err(LatticeError::Misconfigured { a, b }),
                }
            }
        }

        Ok(Self { reachable, join })
    }

    /// Least upper bound of `a` and `b`, if they have any upper bound.
    pub fn common_dtype(&self, a: DType, b: DType) -> Option<DType> {
        self.join[a.id()][b.id()]
    }

    /// Check whether `from` implicitly widens to `to`.
    pub fn can_widen(&self, from: DType, to: DType) -> bool {
        self.reachable[from.id()] & bit(to) != 0
    }
}

static MATRIX: OnceLock<DTypeMatrix> = OnceLock::new();

fn matrix() -> &'static DTypeMatrix {
    MATRIX.get_or_init(|| match DTypeMatrix::build(&dtype_lattice()) {
        Ok(matrix) => matrix,
        Err(err) => panic!("{err}"),
    })
}

/// Least upper bound of `a` and `b` in the built-in lattice.
///
/// `None` means the two dtypes have no common type.
///
/// # Example
///
/// ```
/// use koda_store::core::dtype::DType;
/// use koda_store::schema::common_dtype;
///
/// assert_eq!(common_dtype(DType::Int32, DType::Float32), Some(DType::Float32));
/// assert_eq!(common_dtype(DType::Int32, DType::Text), Some(DType::Object));
/// assert_eq!(common_dtype(DType::ItemId, DType::Int32), None);
/// ```
pub fn common_dtype(a: DType, b: DType) -> Option<DType> {
    matrix().common_dtype(a, b)
}

/// Check whether `from` implicitly widens to `to` in the built-in lattice.
pub fn can_widen(from: DType, to: DType) -> bool {
    matrix().can_widen(from, to)
}
