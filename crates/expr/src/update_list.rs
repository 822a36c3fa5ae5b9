//! Persistent update chains over an array, and the `Read` forwarding rules
//! (component C2's other half).
//!
//! An `UpdateList` is a singly-linked, hash-consed chain of `(index, value)`
//! writes rooted at an `Array`. `extend` appends in O(1) with full
//! structural sharing: two states that wrote the same prefix of updates
//! share that prefix's node, which is what makes `ExecutionState::fork`
//! cheap - forking never copies a memory object's write history.
//!
//! `read` is where the payoff shows up. Reading through a long update chain
//! at a constant index does not have to build a `ReadExpr` and hand it to
//! the solver: walking the chain backward either finds the write that last
//! touched that exact index (forwarding), proves every intervening write
//! was at a different constant index and falls through to the array's
//! constant table, or gives up and builds a `Read` node once it hits a
//! write it cannot resolve (a symbolic index on either side).

use crate::arena::thread_local_arena;
use crate::array::{Array, ArrayId, ArraySource};
use crate::expr::{constant, intern_read, ConstantValue, Expr, ExprId};
use crate::Width;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateListId(pub(crate) u32);

impl UpdateListId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum UpdateListKey {
    Root(ArrayId),
    Write { index: ExprId, value: ExprId, rest: UpdateListId },
}

#[derive(Debug, Clone, Copy)]
pub enum UpdateNode {
    Root(ArrayId),
    Write { index: ExprId, value: ExprId, rest: UpdateListId },
}

thread_local_arena!(UPDATE_ARENA, UpdateListKey, UpdateListKey);

/// A snapshot view of one node in an update chain, plus how many writes
/// separate it from the array root.
#[derive(Debug, Clone, Copy)]
pub struct UpdateList {
    pub id: UpdateListId,
    pub node: UpdateNode,
}

impl UpdateList {
    /// The empty update list directly over `array` - no writes yet.
    pub fn root(array: ArrayId) -> UpdateListId {
        UPDATE_ARENA.with(|arena| {
            let mut arena = arena.borrow_mut();
            UpdateListId(arena.intern(UpdateListKey::Root(array), || UpdateListKey::Root(array)))
        })
    }

    /// Append a write `index <- value` to `list`, returning the id of the
    /// new (longer) chain. `list` itself is untouched and remains valid -
    /// other readers of it see none of this write.
    pub fn extend(list: UpdateListId, index: ExprId, value: ExprId) -> UpdateListId {
        let key = UpdateListKey::Write { index, value, rest: list };
        UPDATE_ARENA.with(|arena| {
            let mut arena = arena.borrow_mut();
            UpdateListId(arena.intern(key, || key))
        })
    }

    pub fn get(id: UpdateListId) -> UpdateList {
        let node = UPDATE_ARENA.with(|arena| {
            let arena = arena.borrow();
            match *arena.get(id.0) {
                UpdateListKey::Root(a) => UpdateNode::Root(a),
                UpdateListKey::Write { index, value, rest } => UpdateNode::Write { index, value, rest },
            }
        });
        UpdateList { id, node }
    }

    /// Walk to the array this chain is ultimately rooted at.
    pub fn root_array(mut id: UpdateListId) -> ArrayId {
        loop {
            match UpdateList::get(id).node {
                UpdateNode::Root(array) => return array,
                UpdateNode::Write { rest, .. } => id = rest,
            }
        }
    }

    /// Number of writes between `id` and the array root.
    pub fn depth(mut id: UpdateListId) -> usize {
        let mut n = 0;
        loop {
            match UpdateList::get(id).node {
                UpdateNode::Root(_) => return n,
                UpdateNode::Write { rest, .. } => {
                    n += 1;
                    id = rest;
                }
            }
        }
    }
}

pub fn reset_arena() {
    UPDATE_ARENA.with(|arena| arena.borrow_mut().reset());
}

pub fn arena_len() -> usize {
    UPDATE_ARENA.with(|arena| arena.borrow().len())
}

fn constant_index(id: ExprId) -> Option<u128> {
    Expr::get(id).as_constant().map(|c| c.value)
}

/// Build (or fold away) a read of `updates` at `index`, of `range_width`
/// bits.
///
/// - If `index` is constant and a write with that same constant index is
///   found before any write whose index cannot be proven distinct from it,
///   returns that write's value directly (forwarding).
/// - If every intervening write is provably at a different constant index,
///   and the chain bottoms out at a `Constant` array source with a known
///   byte at `index`, returns that constant.
/// - Otherwise (a symbolic index is encountered on either side, or the
///   source isn't a fully-known constant table) builds a `Read` node over
///   the *original* update list - forwarding never truncates the chain a
///   `Read` node remembers, since a later write could still invalidate a
///   value read before it was applied.
pub fn read(updates: UpdateListId, index: ExprId, range_width: Width) -> ExprId {
    let want = constant_index(index);
    let mut cur = updates;
    loop {
        match UpdateList::get(cur).node {
            UpdateNode::Write { index: wi, value: wv, rest } => {
                if wi == index {
                    return wv;
                }
                match (want, constant_index(wi)) {
                    (Some(a), Some(b)) if a != b => {
                        cur = rest;
                        continue;
                    }
                    _ => break,
                }
            }
            UpdateNode::Root(array) => {
                if let Some(idx) = want {
                    let arr = Array::get(array);
                    if let ArraySource::Constant(storage) = &arr.source {
                        let byte = *storage.load(idx as u64);
                        return constant(ConstantValue::new(range_width, byte as u128));
                    }
                }
                break;
            }
        }
    }
    intern_read(updates, index, range_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArraySource;
    use crate::expr::{constant_u64, reset_arena as reset_expr_arena};
    use crate::sparse_storage::SparseStorage;
    use crate::Width;
    use serial_test::serial;

    fn setup() {
        reset_expr_arena();
        crate::array::reset_arena();
        reset_arena();
    }

    fn symbolic_array(domain: Width, range: Width, name: &str) -> ArrayId {
        let size = constant_u64(32, 256);
        Array::create(size, domain, range, ArraySource::MakeSymbolic { name: name.into(), version: 0 })
    }

    #[test]
    #[serial]
    fn read_forwards_through_matching_constant_write() {
        setup();
        let array = symbolic_array(32, 8, "buf");
        let base = UpdateList::root(array);
        let idx = constant_u64(32, 4);
        let val = constant_u64(8, 0x42);
        let chain = UpdateList::extend(base, idx, val);

        let result = read(chain, idx, 8);
        assert_eq!(result, val);
    }

    #[test]
    #[serial]
    fn read_skips_provably_distinct_constant_writes() {
        setup();
        let array = symbolic_array(32, 8, "buf");
        let base = UpdateList::root(array);
        let idx0 = constant_u64(32, 0);
        let idx1 = constant_u64(32, 1);
        let v0 = constant_u64(8, 0xAA);
        let v1 = constant_u64(8, 0xBB);
        let chain = UpdateList::extend(base, idx0, v0);
        let chain = UpdateList::extend(chain, idx1, v1);

        let result = read(chain, idx0, 8);
        assert_eq!(result, v0);
    }

    #[test]
    #[serial]
    fn read_falls_back_to_constant_array_source() {
        setup();
        let mut storage: SparseStorage<u8> = SparseStorage::new(0);
        storage.store(2, 0x7F);
        let size = constant_u64(32, 16);
        let array = Array::create(size, 32, 8, ArraySource::Constant(storage));
        let base = UpdateList::root(array);

        let idx = constant_u64(32, 2);
        let result = read(base, idx, 8);
        match Expr::get(result).as_constant() {
            Some(c) => assert_eq!(c.value, 0x7F),
            None => panic!("expected constant fold from constant array source"),
        }
    }

    #[test]
    #[serial]
    fn read_builds_node_when_symbolic_write_blocks_forwarding() {
        setup();
        let array = symbolic_array(32, 8, "buf");
        let base = UpdateList::root(array);
        let sym_idx = intern_read(UpdateList::root(symbolic_array(32, 32, "idx")), constant_u64(32, 0), 32);
        let chain = UpdateList::extend(base, sym_idx, constant_u64(8, 1));

        let query_idx = constant_u64(32, 5);
        let result = read(chain, query_idx, 8);
        match Expr::get(result).kind {
            crate::expr::ExprKind::Read { .. } => {}
            other => panic!("expected Read node, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn extend_is_interned_and_shares_prefixes() {
        setup();
        let array = symbolic_array(32, 8, "buf");
        let base = UpdateList::root(array);
        let idx = constant_u64(32, 0);
        let val = constant_u64(8, 9);
        let a = UpdateList::extend(base, idx, val);
        let b = UpdateList::extend(base, idx, val);
        assert_eq!(a, b);
        assert_eq!(UpdateList::depth(a), 1);
    }
}
