//! Depth-first rewrite framework (component C1's "visitor framework").
//!
//! A `Visitor` drives a traversal of the expression DAG via an action
//! algebra: `DoChildren` recurses and rebuilds from rewritten children
//! (running them back through the canonical builders, so rewrites can't
//! produce non-canonical nodes), `SkipChildren` leaves the node as-is,
//! `ChangeTo` substitutes a whole new subexpression, and
//! `ChangeChildrenTo` recurses with caller-supplied replacement children
//! instead of the node's own operands. `post` is a hook that runs after
//! children have landed, letting a visitor rewrite based on the
//! already-rewritten node (used by `ConstantFoldingVisitor`-style passes
//! that want one more pass of folding after substitution).
//!
//! Visitors memoize per source node within one `rewrite` call, so a DAG
//! with shared subexpressions is visited once per distinct node rather
//! than once per path to it.

use crate::expr::{
    arith, bitwise, bitwise_unary, cast, concat, create_canonical_cmp, extract, float, intern_read,
    pointer, select, CmpOp, Expr, ExprId, ExprKind,
};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Action {
    /// Recurse into children, then rebuild this node from their (possibly
    /// rewritten) results via the canonical builders.
    DoChildren,
    /// Leave this node exactly as it is; do not recurse.
    SkipChildren,
    /// Replace this node wholesale; do not recurse into its children.
    ChangeTo(ExprId),
    /// Recurse, but substitute the given children for this node's own
    /// operands before rebuilding. Length must match the node's arity.
    ChangeChildrenTo(Vec<ExprId>),
}

pub trait Visitor {
    fn visit(&mut self, id: ExprId) -> Action {
        let _ = id;
        Action::DoChildren
    }

    /// Runs after the (possibly rewritten) node has been rebuilt. Default
    /// is a no-op; override to fold/rewrite post-children.
    fn post(&mut self, rebuilt: ExprId) -> Option<ExprId> {
        let _ = rebuilt;
        None
    }
}

/// Run `visitor` over `id` and return the rewritten root.
pub fn rewrite<V: Visitor>(visitor: &mut V, id: ExprId) -> ExprId {
    let mut memo = HashMap::new();
    rewrite_inner(visitor, id, &mut memo)
}

fn rewrite_inner<V: Visitor>(visitor: &mut V, id: ExprId, memo: &mut HashMap<ExprId, ExprId>) -> ExprId {
    if let Some(&cached) = memo.get(&id) {
        return cached;
    }
    let action = visitor.visit(id);
    let result = match action {
        Action::ChangeTo(new_id) => new_id,
        Action::SkipChildren => id,
        Action::DoChildren => {
            let node = Expr::get(id);
            let children = children_of(node.kind);
            let rewritten: Vec<ExprId> = children
                .iter()
                .map(|&c| rewrite_inner(visitor, c, memo))
                .collect();
            rebuild(node.kind, node.width, &rewritten)
        }
        Action::ChangeChildrenTo(new_children) => {
            let node = Expr::get(id);
            let rewritten: Vec<ExprId> = new_children
                .iter()
                .map(|&c| rewrite_inner(visitor, c, memo))
                .collect();
            rebuild(node.kind, node.width, &rewritten)
        }
    };
    let result = visitor.post(result).unwrap_or(result);
    memo.insert(id, result);
    result
}

/// The operand list of a node, in a fixed order matching `rebuild`'s
/// expectations.
fn children_of(kind: ExprKind) -> Vec<ExprId> {
    match kind {
        ExprKind::Constant(_) => vec![],
        ExprKind::Read { index, .. } => vec![index],
        ExprKind::Concat(hi, lo) => vec![hi, lo],
        ExprKind::Extract { child, .. } => vec![child],
        ExprKind::Select { cond, t, f } => vec![cond, t, f],
        ExprKind::Arith(_, a, b) => vec![a, b],
        ExprKind::Bitwise(_, a, Some(b)) => vec![a, b],
        ExprKind::Bitwise(_, a, None) => vec![a],
        ExprKind::Cmp(_, a, b) => vec![a, b],
        ExprKind::Cast { child, .. } => vec![child],
        ExprKind::Float { a, b: Some(b), .. } => vec![a, b],
        ExprKind::Float { a, b: None, .. } => vec![a],
        ExprKind::Pointer { base, value } => vec![base, value],
    }
}

/// Rebuild a node of the given (original) `kind`, with `children`
/// (already rewritten, in `children_of` order) substituted in. Routes
/// through the canonical builders so a rewrite can never desync from the
/// interning/canonicalization invariants.
fn rebuild(kind: ExprKind, width: crate::Width, children: &[ExprId]) -> ExprId {
    match kind {
        ExprKind::Constant(c) => crate::expr::constant(c),
        ExprKind::Read { updates, .. } => {
            let index = children[0];
            // A Read's width is fixed by its array's range width, carried
            // on the original node untouched by rewriting the index.
            intern_read(updates, index, width)
        }
        ExprKind::Concat(_, _) => concat(children[0], children[1]),
        ExprKind::Extract { offset, width, .. } => {
            extract(children[0], offset, width).expect("rewrite preserved width invariants")
        }
        ExprKind::Select { .. } => {
            select(children[0], children[1], children[2]).expect("rewrite preserved width invariants")
        }
        ExprKind::Arith(op, _, _) => arith(op, children[0], children[1]).expect("rewrite preserved width invariants"),
        ExprKind::Bitwise(op, _, Some(_)) => {
            bitwise(op, children[0], children[1]).expect("rewrite preserved width invariants")
        }
        ExprKind::Bitwise(op, _, None) => bitwise_unary(op, children[0]).expect("rewrite preserved width invariants"),
        ExprKind::Cmp(op, _, _) => {
            create_canonical_cmp(canonical_cmp_kind(op), children[0], children[1])
                .expect("rewrite preserved width invariants")
        }
        ExprKind::Cast { op, target_width, .. } => {
            cast(op, children[0], target_width).expect("rewrite preserved width invariants")
        }
        ExprKind::Float { op, rounding, b, .. } => {
            let new_b = b.map(|_| children[1]);
            float(op, rounding, children[0], new_b).expect("rewrite preserved width invariants")
        }
        ExprKind::Pointer { .. } => pointer(children[0], children[1]).expect("rewrite preserved width invariants"),
    }
}

fn canonical_cmp_kind(op: CmpOp) -> CmpOp {
    op
}

/// A simple post-order rewrite: substitute every occurrence of `from` with
/// `to`, re-canonicalizing ancestors.
pub struct ReplaceVisitor {
    pub from: ExprId,
    pub to: ExprId,
}

impl ReplaceVisitor {
    pub fn new(from: ExprId, to: ExprId) -> Self {
        Self { from, to }
    }
}

impl Visitor for ReplaceVisitor {
    fn visit(&mut self, id: ExprId) -> Action {
        if id == self.from {
            Action::ChangeTo(self.to)
        } else {
            Action::DoChildren
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Array, ArraySource};
    use crate::expr::{arith, constant_u64, reset_arena as reset_expr_arena, ArithOp, ExprKind};
    use crate::update_list::UpdateList;
    use serial_test::serial;

    fn setup() {
        reset_expr_arena();
        crate::array::reset_arena();
        crate::update_list::reset_arena();
    }

    #[test]
    #[serial]
    fn replace_visitor_substitutes_leaf_and_refolds() {
        setup();
        let size = constant_u64(32, 4);
        let arr = Array::create(size, 32, 8, ArraySource::MakeSymbolic { name: "x".into(), version: 0 });
        let x = intern_read(UpdateList::root(arr), constant_u64(32, 0), 8);
        let c1 = constant_u64(8, 5);
        let expr = arith(ArithOp::Add, x, c1).unwrap();

        let replacement = constant_u64(8, 10);
        let mut visitor = ReplaceVisitor::new(x, replacement);
        let rewritten = rewrite(&mut visitor, expr);

        // x + 5 with x -> 10 should fold to the constant 15.
        match Expr::get(rewritten).kind {
            ExprKind::Constant(c) => assert_eq!(c.value, 15),
            other => panic!("expected folded constant, got {other:?}"),
        }
    }
}
