//! Symbolic arrays (component C2).
//!
//! An `Array` is a hash-consed tuple `(size, domain width, range width,
//! source)`. The `source` tag records *why* the array exists - a constant
//! table, a fresh symbolic name, an uninitialized allocation, a lazily
//! initialized pointer target, a call-site argument/return value, a mock
//! function's result, an alpha-renamed placeholder, or an array KLEE calls
//! "irreproducible" (depends on environment state no replay can recover).

use crate::arena::thread_local_arena;
use crate::expr::ExprId;
use crate::sparse_storage::SparseStorage;
use crate::Width;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub(crate) u32);

impl ArrayId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyInitKind {
    Address,
    Size,
    Content,
}

/// Identifies the call site a value was pulled from (used by
/// `Argument`/`Instruction`/`Global` sources). These are opaque handles the
/// (excluded) IR front-end assigns; the core never interprets them beyond
/// equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArraySource {
    Constant(SparseStorage<u8>),
    MakeSymbolic { name: String, version: u32 },
    Uninitialized,
    SymbolicSizeConstantAddress,
    LazyInitialization { kind: LazyInitKind, pointer: ExprId },
    Argument { call_site: CallSiteId, index: u32 },
    Instruction { call_site: CallSiteId },
    Global { name: String },
    MockNaive { function: String, args: Vec<ExprId> },
    MockDeterministic { function: String, args: Vec<ExprId> },
    Alpha { index: u32 },
    Irreproducible { tag: String },
}

impl ArraySource {
    /// Two `MockDeterministic` sources with the same function and argument
    /// vector intern to the *same* array id - this is what makes repeated
    /// calls to a mocked function with identical arguments evaluate equal
    /// (testable scenario S5).
    pub fn is_deterministic_mock(&self) -> bool {
        matches!(self, ArraySource::MockDeterministic { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ArrayKey {
    size: ExprId,
    domain_width: Width,
    range_width: Width,
    source: ArraySource,
}

#[derive(Debug, Clone)]
struct ArrayNode {
    size: ExprId,
    domain_width: Width,
    range_width: Width,
    source: ArraySource,
}

thread_local_arena!(ARRAY_ARENA, ArrayKey, ArrayNode);

#[derive(Debug, Clone)]
pub struct Array {
    pub id: ArrayId,
    pub size: ExprId,
    pub domain_width: Width,
    pub range_width: Width,
    pub source: ArraySource,
}

impl Array {
    pub fn create(size: ExprId, domain_width: Width, range_width: Width, source: ArraySource) -> ArrayId {
        let key = ArrayKey {
            size,
            domain_width,
            range_width,
            source: source.clone(),
        };
        ARRAY_ARENA.with(|arena| {
            let mut arena = arena.borrow_mut();
            ArrayId(arena.intern(key, || ArrayNode {
                size,
                domain_width,
                range_width,
                source,
            }))
        })
    }

    pub fn get(id: ArrayId) -> Array {
        ARRAY_ARENA.with(|arena| {
            let arena = arena.borrow();
            let node = arena.get(id.0);
            Array {
                id,
                size: node.size,
                domain_width: node.domain_width,
                range_width: node.range_width,
                source: node.source.clone(),
            }
        })
    }
}

pub fn reset_arena() {
    ARRAY_ARENA.with(|arena| arena.borrow_mut().reset());
}

pub fn arena_len() -> usize {
    ARRAY_ARENA.with(|arena| arena.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::constant_u64;
    use serial_test::serial;

    fn setup() {
        crate::expr::reset_arena();
        reset_arena();
    }

    #[test]
    #[serial]
    fn create_interns_on_full_tuple() {
        setup();
        let size = constant_u64(32, 16);
        let a = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "n".into(), version: 0 });
        let b = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "n".into(), version: 0 });
        assert_eq!(a, b);
    }

    #[test]
    #[serial]
    fn different_version_is_distinct_array() {
        setup();
        let size = constant_u64(32, 16);
        let a = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "n".into(), version: 0 });
        let b = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "n".into(), version: 1 });
        assert_ne!(a, b);
    }

    #[test]
    #[serial]
    fn deterministic_mock_same_args_same_array() {
        setup();
        let size = constant_u64(32, 8);
        let args = vec![constant_u64(32, 42)];
        let a = Array::create(
            size,
            32,
            8,
            ArraySource::MockDeterministic { function: "age".into(), args: args.clone() },
        );
        let b = Array::create(
            size,
            32,
            8,
            ArraySource::MockDeterministic { function: "age".into(), args },
        );
        assert_eq!(a, b);
    }
}
