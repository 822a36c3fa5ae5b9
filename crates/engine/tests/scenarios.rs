//! Cross-module scenario tests mirroring the six end-to-end scenarios
//! (S1-S6): not literal C/LLVM programs (the IR front-end is excluded),
//! but the same sequence of core API calls a driver stepping that program
//! would issue.

use symex_engine::forest::StateId;
use symex_engine::ir::{BlockId, FunctionId, InstructionId};
use symex_engine::memory::{Endianness, MemoryObject, ObjectId, ObjectState};
use symex_engine::path::Transition;
use symex_engine::searcher::MergingSearcher;
use symex_engine::searcher::{DfsSearcher, Searcher};
use symex_engine::state::ExecutionState;
use symex_expr::expr::{cmp, constant_u64, RequestedCmpOp};
use symex_expr::RoundingMode;

fn reset_arenas() {
    symex_expr::expr::reset_arena();
    symex_expr::array::reset_arena();
    symex_expr::update_list::reset_arena();
}

fn entry() -> InstructionId {
    InstructionId { block: BlockId(0), index: 0 }
}

/// S1 - branch fork: a 32-bit symbolic `n`, then `if (n > 0) A else B`.
/// Exactly two feasible states, each carrying the matching half of the
/// disjunction in its own constraint set.
#[test]
#[serial_test::serial]
fn s1_branch_fork_splits_constraints_between_siblings() {
    reset_arenas();

    let mut object = ObjectState::new_symbolic(ObjectId(0), 4, "n", 0);
    let n = object.read(0, 32, Endianness::Little);
    let zero = constant_u64(32, 0);

    let parent = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
    let mut a = parent.branch(1);
    let mut b = parent.branch(2);

    let gt = cmp(RequestedCmpOp::Slt, zero, n).unwrap();
    let le = cmp(RequestedCmpOp::Sle, n, zero).unwrap();
    a.add_constraint(gt, symex_engine::config::RewriteEqualities::None);
    b.add_constraint(le, symex_engine::config::RewriteEqualities::None);

    assert!(a.path_constraints().constraint_set().constraints().contains(&gt));
    assert!(!a.path_constraints().constraint_set().constraints().contains(&le));
    assert!(b.path_constraints().constraint_set().constraints().contains(&le));
    assert!(!b.path_constraints().constraint_set().constraints().contains(&gt));
    assert_ne!(a.id(), b.id());
}

/// S2 - memory re-read: `arr[2]` is written symbolically, then `arr[1] = 0`
/// (a disjoint concrete write), then `arr[2]` is read again. The two reads
/// of `arr[2]` must be identical and must not have observed the unrelated
/// write.
#[test]
#[serial_test::serial]
fn s2_disjoint_write_does_not_perturb_an_unrelated_byte() {
    reset_arenas();

    let source = ObjectState::new_symbolic(ObjectId(1), 1, "sym_byte", 0);
    let sym_value = source.read8_const(0);

    let mut object = ObjectState::new_uninitialized(ObjectId(0), 4);
    object.write8_const(2, sym_value);
    let before = object.read8_const(2);

    let zero = constant_u64(8, 0);
    object.write8_const(1, zero);
    let after = object.read8_const(2);

    assert_eq!(before, after, "arr[2] must read identically before and after the arr[1] write");
    assert_eq!(before, sym_value, "arr[2] still reads back the symbolic byte it was written, untouched by arr[1]");
}

/// S3 - fixed-object definition: `defineFixedObject(0x80, 4)`, write `10` to
/// the returned pointer, read it back as the constant.
#[test]
#[serial_test::serial]
fn s3_fixed_object_round_trips_its_constant() {
    reset_arenas();

    let mo = MemoryObject::define_fixed(ObjectId(7), 0x80, 4);
    assert!(mo.is_user_specified);

    let mut object = ObjectState::new_uninitialized(ObjectId(7), 4);
    let ten = constant_u64(32, 10);
    object.write(0, ten, Endianness::Little);
    let read_back = object.read(0, 32, Endianness::Little);

    let expr = symex_expr::expr::Expr::get(read_back);
    let constant = expr.as_constant().expect("constant write materializes to a ConstantExpr on read-back");
    assert_eq!(constant.value, 10);
}

/// S4 - symbolic alignment: a symbolic `int16_t array[2]`, read `array[1]`,
/// no misalignment error, and a store at `array[1]` reads back equal.
#[test]
#[serial_test::serial]
fn s4_symbolic_array_element_round_trips_under_alignment() {
    reset_arenas();

    let mut object = ObjectState::new_symbolic(ObjectId(0), 4, "array", 0);
    let element = object.read(2, 16, Endianness::Little);

    let replacement = constant_u64(16, 0x1234);
    object.write(2, replacement, Endianness::Little);
    let read_back = object.read(2, 16, Endianness::Little);

    assert_ne!(element, replacement, "original symbolic element and the new constant are different exprs");
    assert_eq!(read_back, replacement, "store at array[1] reads back the value just written");
}

/// S5 - deterministic mock equality: two calls to `age()` with identical
/// arguments must intern to the same symbolic source, so `age() == age()`
/// is the only satisfiable reading of the comparison.
#[test]
#[serial_test::serial]
fn s5_deterministic_mock_same_args_same_identity() {
    reset_arenas();

    let size = constant_u64(32, 8);
    let args = vec![constant_u64(32, 42)];
    let a = symex_expr::array::Array::create(
        size,
        32,
        8,
        symex_expr::array::ArraySource::MockDeterministic { function: "age".into(), args: args.clone() },
    );
    let b = symex_expr::array::Array::create(
        size,
        32,
        8,
        symex_expr::array::ArraySource::MockDeterministic { function: "age".into(), args },
    );

    assert_eq!(a, b, "identical MockDeterministic calls must intern to the same array");
}

/// S6 - path-merge bounds: three states fork under a `klee_open_merge`
/// bracket; two reach the matching `close_merge` block and become
/// candidates for a single merged state, the third exits early (never
/// postponed) - exactly two outcomes.
#[test]
fn s6_merge_bracket_yields_one_merged_group_and_one_early_exit() {
    let base = DfsSearcher::new();
    let mut searcher = MergingSearcher::new(Box::new(base));
    searcher.update(None, &[StateId(0), StateId(1), StateId(2)], &[]);

    let close_merge = BlockId(9);
    searcher.postpone(0, StateId(0), close_merge);
    searcher.postpone(0, StateId(1), close_merge);
    // StateId(2) exits early: it terminates without ever being postponed
    // into the merge group.

    let groups: Vec<_> = searcher.mergeable_groups().collect();
    assert_eq!(groups.len(), 1, "exactly one group has reached the close_merge point with more than one member");
    let (_, group) = groups[0];
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.close_merge, Some(close_merge));

    let resolved = searcher.resolve_group(0);
    assert_eq!(resolved.len(), 2);
    assert_eq!(searcher.mergeable_groups().count(), 0, "the group is gone once resolved");

    searcher.update(None, &[], &[StateId(2)]);
    assert_eq!(searcher.mergeable_groups().count(), 0, "removing the early-exit state leaves merge bookkeeping untouched");
}

/// A smoke test that the forward/backward path transitions a branch fork
/// would drive through `PathConstraints::advance_path` keep the two
/// siblings on distinct blocks, matching universal property 9 (path stack
/// reconstruction) at the component boundary this crate owns.
#[test]
#[serial_test::serial]
fn path_advances_independently_per_sibling() {
    reset_arenas();
    let mut parent = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
    parent.step(InstructionId { block: BlockId(1), index: 0 }, BlockId(1), Transition::In, false);
    let mut a = parent.branch(1);
    let mut b = parent.branch(2);

    a.step(InstructionId { block: BlockId(2), index: 0 }, BlockId(2), Transition::In, false);
    b.step(InstructionId { block: BlockId(3), index: 0 }, BlockId(3), Transition::In, false);

    assert_eq!(a.pc().block, BlockId(2));
    assert_eq!(b.pc().block, BlockId(3));
    assert_eq!(a.prev_pc().map(|p| p.block), Some(BlockId(1)));
    assert_eq!(b.prev_pc().map(|p| p.block), Some(BlockId(1)));
}
