//! Equality-rewriting constraint simplifier (C5).
//!
//! Grounded on KLEE's `Simplificator`/`ExprReplaceVisitor2`/`3`
//! (`lib/Expr/Constraints.cpp`): gather a `x -> c` replacement for every
//! equality-with-a-constant constraint (and `p -> true` for every other
//! constraint, `Not(q) -> q -> false` for negations), substitute those
//! replacements through every constraint via the expr crate's rewrite
//! framework, and iterate to a fixed point for the `Full` policy. Each
//! rewritten constraint records which original constraints' replacements
//! actually fired - its dependency set - composed across passes so the
//! final map can explain any transformed constraint by its original
//! predecessors (testable property "Simplification laws").

use crate::config::RewriteEqualities;
use std::collections::{HashMap, HashSet};
use symex_expr::expr::{false_, true_, BitwiseOp, CmpOp, Expr, ExprKind};
use symex_expr::visitor::{rewrite, Action, Visitor};
use symex_expr::ExprId;

/// Top-level conjunction split: `And(a, b)` (width 1, i.e. boolean) splits
/// recursively into its conjuncts; anything else is a single-element
/// result. Used both by `ConstraintSet::add_constraint` (§4.4 step 2) and
/// by `simplify`'s per-pass re-split.
pub fn split_ands(expr: ExprId) -> Vec<ExprId> {
    let e = Expr::get(expr);
    if e.width == 1 {
        if let ExprKind::Bitwise(BitwiseOp::And, a, Some(b)) = e.kind {
            let mut parts = split_ands(a);
            parts.extend(split_ands(b));
            return parts;
        }
    }
    vec![expr]
}

#[derive(Debug, Default, Clone)]
struct Replacements {
    equalities: HashMap<ExprId, ExprId>,
    parents: HashMap<ExprId, ExprId>,
}

fn gather_replacements(constraints: impl IntoIterator<Item = ExprId>) -> Replacements {
    let mut result = Replacements::default();
    for c in constraints {
        add_replacement(&mut result, c);
    }
    result
}

fn add_replacement(result: &mut Replacements, c: ExprId) {
    if let ExprKind::Cmp(CmpOp::Eq, left, right) = Expr::get(c).kind {
        if Expr::get(left).is_constant() {
            result.equalities.insert(right, left);
            result.parents.insert(right, c);
            return;
        }
    }
    result.equalities.insert(c, true_());
    result.parents.insert(c, c);
    if let ExprKind::Bitwise(BitwiseOp::Not, inner, None) = Expr::get(c).kind {
        result.equalities.insert(inner, false_());
        result.parents.insert(inner, c);
    }
}

fn remove_replacement(result: &mut Replacements, c: ExprId) {
    if let ExprKind::Cmp(CmpOp::Eq, left, right) = Expr::get(c).kind {
        if Expr::get(left).is_constant() {
            result.equalities.remove(&right);
            result.parents.remove(&right);
            return;
        }
    }
    result.equalities.remove(&c);
    result.parents.remove(&c);
    if let ExprKind::Bitwise(BitwiseOp::Not, inner, None) = Expr::get(c).kind {
        result.equalities.remove(&inner);
        result.parents.remove(&inner);
    }
}

/// Substitutes `equalities` through an expression. `chain_through` is the
/// `Simple`/`Full` policy distinction: `Full` follows `x -> y -> c` chains
/// to their end before substituting (matching `ExprReplaceVisitor2`);
/// `Simple` substitutes one level only (`ExprReplaceVisitor3`).
struct EqualityReplaceVisitor<'a> {
    equalities: &'a HashMap<ExprId, ExprId>,
    parents: &'a HashMap<ExprId, ExprId>,
    chain_through: bool,
    fired: HashSet<ExprId>,
}

impl<'a> Visitor for EqualityReplaceVisitor<'a> {
    fn visit(&mut self, id: ExprId) -> Action {
        let Some(&first) = self.equalities.get(&id) else {
            return Action::DoChildren;
        };
        self.fired.insert(self.parents[&id]);
        let mut replacement = first;
        if self.chain_through {
            let mut seen = HashSet::new();
            seen.insert(replacement);
            while let Some(&next) = self.equalities.get(&replacement) {
                if !seen.insert(next) {
                    break;
                }
                self.fired.insert(self.parents[&replacement]);
                replacement = next;
            }
        }
        Action::ChangeTo(replacement)
    }
}

pub struct ExprResult {
    pub simplified: ExprId,
    pub dependencies: HashSet<ExprId>,
}

/// One pass, no fixed point: used by `ConstraintSet::add_constraint`'s
/// simplify-before-insert step and by a validity-core feature that wants
/// to know which constraints a query touched.
pub fn simplify_expr(constraints: impl IntoIterator<Item = ExprId>, expr: ExprId) -> ExprResult {
    if Expr::get(expr).is_constant() {
        return ExprResult { simplified: expr, dependencies: HashSet::new() };
    }
    let replacements = gather_replacements(constraints);
    let mut visitor = EqualityReplaceVisitor {
        equalities: &replacements.equalities,
        parents: &replacements.parents,
        chain_through: true,
        fired: HashSet::new(),
    };
    let simplified = rewrite(&mut visitor, expr);
    ExprResult { simplified, dependencies: visitor.fired }
}

pub struct SetResult {
    pub simplified: HashSet<ExprId>,
    pub dependencies: HashMap<ExprId, HashSet<ExprId>>,
    pub was_simplified: bool,
}

/// Iterates `simplify_once` to a fixed point (§4.5's Full policy); `Simple`
/// runs the same loop but with one-level-only substitution per pass.
pub fn simplify(constraints: &HashSet<ExprId>, policy: RewriteEqualities) -> SetResult {
    assert_ne!(policy, RewriteEqualities::None, "simplify is only called under Simple/Full");
    let chain_through = policy == RewriteEqualities::Full;

    let mut simplified: HashSet<ExprId> = constraints.iter().copied().collect();
    let mut dependencies: HashMap<ExprId, HashSet<ExprId>> =
        constraints.iter().map(|&c| (c, HashSet::from([c]))).collect();

    let mut actually_changed = false;
    loop {
        let replacements = gather_replacements(simplified.iter().copied());
        let mut current_simplified = HashSet::new();
        let mut current_dependencies: HashMap<ExprId, HashSet<ExprId>> = HashMap::new();
        let mut changed = false;

        for &constraint in &simplified {
            let mut local = replacements.clone();
            remove_replacement(&mut local, constraint);
            let mut visitor = EqualityReplaceVisitor {
                equalities: &local.equalities,
                parents: &local.parents,
                chain_through,
                fired: HashSet::new(),
            };
            let rewritten = rewrite(&mut visitor, constraint);
            let parts = split_ands(rewritten);
            if rewritten != constraint || parts.len() > 1 {
                actually_changed = true;
                changed = true;
            }
            for part in parts {
                let mut dep = visitor.fired.clone();
                dep.insert(constraint);
                current_dependencies.entry(part).or_default().extend(dep);
                current_simplified.insert(part);
            }
        }

        if !changed {
            break;
        }
        dependencies = compose_dependencies(&dependencies, &current_dependencies);
        simplified = current_simplified;
    }

    simplified.remove(&true_());
    dependencies.remove(&true_());

    SetResult { simplified, dependencies, was_simplified: actually_changed }
}

fn compose_dependencies(
    upper: &HashMap<ExprId, HashSet<ExprId>>,
    lower: &HashMap<ExprId, HashSet<ExprId>>,
) -> HashMap<ExprId, HashSet<ExprId>> {
    let mut result: HashMap<ExprId, HashSet<ExprId>> = HashMap::new();
    for (dependent, deps) in lower {
        for dep in deps {
            if let Some(upper_deps) = upper.get(dep) {
                result.entry(*dependent).or_default().extend(upper_deps.iter().copied());
            } else {
                result.entry(*dependent).or_default().insert(*dep);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use symex_expr::array::{Array, ArraySource};
    use symex_expr::expr::{arith, cmp, constant_u64, ArithOp, RequestedCmpOp};
    use symex_expr::update_list::{self, UpdateList};
    use symex_expr::Width;

    fn setup() {
        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        symex_expr::update_list::reset_arena();
    }

    fn sym(width: Width) -> ExprId {
        let size = constant_u64(32, 256);
        let array = Array::create(size, 32, width, ArraySource::MakeSymbolic { name: "x".into(), version: 0 });
        let root = UpdateList::root(array);
        update_list::read(root, constant_u64(32, 0), width)
    }

    #[test]
    #[serial]
    fn equality_constraint_folds_a_use_of_the_variable() {
        setup();
        let x = sym(32);
        let five = constant_u64(32, 5);
        let eq = cmp(RequestedCmpOp::Eq, five, x).unwrap();

        let plus_one = arith(ArithOp::Add, x, constant_u64(32, 1)).unwrap();
        let result = simplify_expr([eq], plus_one);
        assert_eq!(Expr::get(result.simplified).as_constant().unwrap().value, 6);
        assert!(result.dependencies.contains(&eq));
    }

    #[test]
    #[serial]
    fn split_ands_flattens_nested_conjunctions() {
        setup();
        let a = cmp(RequestedCmpOp::Eq, constant_u64(8, 1), sym(8)).unwrap();
        let b = cmp(RequestedCmpOp::Eq, constant_u64(8, 2), sym(8)).unwrap();
        let conj = symex_expr::expr::bitwise(BitwiseOp::And, a, b).unwrap();
        let parts = split_ands(conj);
        assert_eq!(parts.len(), 2);
    }

    #[test]
    #[serial]
    fn full_simplify_is_idempotent_at_fixed_point() {
        setup();
        let x = sym(32);
        let eq = cmp(RequestedCmpOp::Eq, constant_u64(32, 5), x).unwrap();
        let set: HashSet<ExprId> = [eq].into_iter().collect();
        let once = simplify(&set, RewriteEqualities::Full);
        let twice = simplify(&once.simplified, RewriteEqualities::Full);
        assert_eq!(once.simplified, twice.simplified);
        assert!(!twice.was_simplified);
    }

    #[test]
    #[serial]
    fn every_output_constraint_has_a_dependency() {
        setup();
        let x = sym(32);
        let eq = cmp(RequestedCmpOp::Eq, constant_u64(32, 5), x).unwrap();
        let plus_one = arith(ArithOp::Add, x, constant_u64(32, 1)).unwrap();
        let user_constraint = cmp(RequestedCmpOp::Ult, plus_one, constant_u64(32, 100)).unwrap();
        let set: HashSet<ExprId> = [eq, user_constraint].into_iter().collect();
        let result = simplify(&set, RewriteEqualities::Full);
        for c in &result.simplified {
            assert!(!result.dependencies.get(c).map(|d| d.is_empty()).unwrap_or(true));
        }
    }
}
