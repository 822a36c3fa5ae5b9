//! `Path` and `PathConstraints` (C6): the block-indexed record of how a
//! state got where it is, paired with the constraint set gathered along
//! the way.
//!
//! Grounded on KLEE's `Path`/`PathConstraints` (`include/klee/Expr/Path.h`,
//! `Constraints.h`, `lib/Expr/Constraints.cpp`'s `PathConstraints::
//! addConstraint`/`advancePath`/`concat`).

use crate::config::RewriteEqualities;
use crate::constraints::ConstraintSet;
use crate::ir::BlockId;
use symex_expr::ExprId;

/// How a block transition relates to the call stack: a branch within the
/// current function, a call into a new frame, or a return out of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    In,
    Out,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub block: BlockId,
    pub transition: Transition,
}

/// An immutable, append-only sequence of block transitions. Two states
/// that took the same branches so far share nothing here (this is a flat
/// `Vec`, not interned) - the expense of a `Path` is paid once per state,
/// not per comparison, so sharing isn't worth the hash-consing overhead
/// `History` needs for per-node equality checks in hot searcher loops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, block: BlockId, transition: Transition) {
        self.steps.push(PathStep { block, transition });
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The call-stack block sequence, optionally reversed (innermost
    /// frame first) - used when a searcher needs to walk outward from the
    /// current frame toward the entry point.
    pub fn call_stack(&self, reversed: bool) -> Vec<BlockId> {
        let mut depth = 0i64;
        let mut stack = Vec::new();
        for step in &self.steps {
            match step.transition {
                Transition::In => {
                    depth += 1;
                    stack.push(step.block);
                }
                Transition::Out => {
                    depth -= 1;
                    stack.pop();
                }
                Transition::None => {}
            }
        }
        debug_assert!(depth >= 0, "Path has more returns than calls");
        if reversed {
            stack.reverse();
        }
        stack
    }
}

/// A `Path` paired with the `ConstraintSet` gathered while walking it.
#[derive(Debug, Clone, Default)]
pub struct PathConstraints {
    path: Path,
    constraints: ConstraintSet,
}

impl PathConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn constraint_set(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn advance_path(&mut self, block: BlockId, transition: Transition) {
        self.path.advance(block, transition);
    }

    /// Adds `expr`, returning the conjuncts actually inserted (after
    /// simplification and And-splitting) so a caller that needs to know
    /// exactly what changed - e.g. a solver cache invalidation - doesn't
    /// have to diff the whole set.
    pub fn add_constraint(&mut self, expr: ExprId, policy: RewriteEqualities) -> Vec<ExprId> {
        let before = self.constraints.constraints().len();
        self.constraints.add_constraint(expr, policy);
        self.constraints.constraints()[before..].to_vec()
    }

    /// Concatenates another `PathConstraints` onto `self`, used when a
    /// proof obligation's propagation needs to splice a proven suffix path
    /// onto the state that originated it.
    pub fn concat(&mut self, other: &PathConstraints, policy: RewriteEqualities) {
        for &step in other.path.steps() {
            self.path.advance(step.block, step.transition);
        }
        for &c in other.constraints.constraints() {
            self.constraints.add_constraint(c, policy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_stack_tracks_in_out_transitions() {
        let mut p = Path::new();
        p.advance(BlockId(1), Transition::None);
        p.advance(BlockId(2), Transition::In);
        p.advance(BlockId(3), Transition::None);
        p.advance(BlockId(4), Transition::Out);
        assert_eq!(p.call_stack(false), vec![]);
    }

    #[test]
    fn call_stack_keeps_unreturned_frame() {
        let mut p = Path::new();
        p.advance(BlockId(1), Transition::In);
        p.advance(BlockId(2), Transition::In);
        assert_eq!(p.call_stack(false), vec![BlockId(1), BlockId(2)]);
        assert_eq!(p.call_stack(true), vec![BlockId(2), BlockId(1)]);
    }

    #[test]
    fn add_constraint_reports_only_new_conjuncts() {
        use symex_expr::array::{Array, ArraySource};
        use symex_expr::expr::{cmp, constant_u64, RequestedCmpOp};
        use symex_expr::update_list::{self, UpdateList};

        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        symex_expr::update_list::reset_arena();

        let size = constant_u64(32, 16);
        let array = Array::create(size, 32, 32, ArraySource::MakeSymbolic { name: "x".into(), version: 0 });
        let root = UpdateList::root(array);
        let x = update_list::read(root, constant_u64(32, 0), 32);

        let mut pc = PathConstraints::new();
        let c1 = cmp(RequestedCmpOp::Ult, x, constant_u64(32, 10)).unwrap();
        let added = pc.add_constraint(c1, RewriteEqualities::None);
        assert_eq!(added, vec![c1]);
    }
}
