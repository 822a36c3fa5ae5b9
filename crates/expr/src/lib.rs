//! symex-expr: the hash-consed expression, array, and update-list DAG.
//!
//! This crate is the language-agnostic foundation shared by the rest of the
//! symbolic execution engine (`symex-engine`). It owns:
//!
//! - `width`: bit-width helpers and masking arithmetic.
//! - `rounding`: IEEE-754 rounding modes for float terms.
//! - `arena`: thread-local interning arenas with stable indices.
//! - `expr`: the `Expr` DAG - canonical builders, constant folding, hashing.
//! - `visitor`: the depth-first rewrite framework used to implement
//!   `ConstantFoldingVisitor`, `ReplaceVisitor`, and the `AlphaBuilder`.
//! - `sparse_storage`: the sparse index -> value mapping backing constant
//!   arrays and concrete memory stores.
//! - `array`: symbolic arrays and their source tags.
//! - `update_list`: persistent write-chains over an array root, and the
//!   `ReadExpr` forwarding/constant-folding rules.
//! - `alpha`: deterministic array-renaming for cache-friendly solver queries.

pub mod alpha;
pub mod arena;
pub mod array;
pub mod expr;
pub mod rounding;
pub mod sparse_storage;
pub mod update_list;
pub mod visitor;
pub mod width_ops;

pub use alpha::AlphaBuilder;
pub use array::{Array, ArrayId, ArraySource};
pub use expr::{
    ArithOp, BitwiseOp, CastOp, CmpOp, ConstantValue, Expr, ExprId, ExprKind, FloatOp, InvalidOperandWidth,
};
pub use rounding::RoundingMode;
pub use sparse_storage::SparseStorage;
pub use update_list::{UpdateList, UpdateListId, UpdateNode};
pub use visitor::{Action, ReplaceVisitor, Visitor};

/// Bit width of an expression, array index, or array element.
pub type Width = u32;

/// Widths used throughout the engine for common integer sizes.
pub mod widths {
    use super::Width;
    pub const BOOL: Width = 1;
    pub const INT8: Width = 8;
    pub const INT16: Width = 16;
    pub const INT32: Width = 32;
    pub const INT64: Width = 64;
}
