//! The path's constraint store (C4): an ordered, deduplicated set of
//! boolean expressions plus the symcrete bookkeeping that lets a
//! concretization manager pin a subset of symbolic bytes to concrete
//! values without losing the symbolic constraint that justified it.
//!
//! Grounded on KLEE's `ConstraintSet`/`PathConstraints`
//! (`include/klee/Expr/Constraints.h`, `lib/Expr/Constraints.cpp`):
//! ordered insertion, copy-on-write via an owner stamp bumped on clone,
//! independence partitioning by shared array symbols, and periodic full
//! resimplification gated by a counter (every 1024th addition).

use crate::simplificator::{self, split_ands};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use symex_expr::array::ArrayId;
use symex_expr::expr::{true_, Expr, ExprKind};
use symex_expr::ExprId;

use crate::config::RewriteEqualities;

/// A binding from a symbolic array to the bytes a concretization manager
/// has pinned it to, so solver queries involving a symcrete can be
/// answered without re-deriving the concrete assignment every time.
pub type Assignment = HashMap<ArrayId, Vec<u8>>;

#[derive(Debug, Clone, Default)]
struct ConstraintSetData {
    constraints: Vec<ExprId>,
    symcretes: HashSet<ArrayId>,
    concretization: Assignment,
}

/// An ordered, deduplicated constraint store with copy-on-write sharing.
/// Cloning is O(1) (an `Rc` bump); the first mutation after a clone does
/// the actual copy, mirroring `ConstraintSet`'s `cowKey` bump on its own
/// copy constructor.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    data: Rc<ConstraintSetData>,
    seen: Rc<HashSet<ExprId>>,
    adding_counter: u32,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self {
            data: Rc::new(ConstraintSetData::default()),
            seen: Rc::new(HashSet::new()),
            adding_counter: 0,
        }
    }
}

/// Every 1024th addition triggers a full resimplification pass, matching
/// KLEE's `0x3FFU` bitmask gate on `addingCounter`.
const RESIMPLIFY_PERIOD_MASK: u32 = 0x3FF;

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraints(&self) -> &[ExprId] {
        &self.data.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.data.constraints.is_empty()
    }

    fn mutate(&mut self) -> &mut ConstraintSetData {
        Rc::make_mut(&mut self.data)
    }

    /// Adds `expr` to the set, simplifying it against the existing
    /// constraints first and splitting any resulting top-level conjunction
    /// into separate entries (§4.4 step 2). Constant-`true` constraints
    /// (after simplification) are dropped rather than stored; a constant
    /// `false` indicates the caller reached an infeasible path and should
    /// have checked satisfiability before calling this.
    pub fn add_constraint(&mut self, expr: ExprId, policy: RewriteEqualities) {
        let simplified = if policy == RewriteEqualities::None {
            expr
        } else {
            simplificator::simplify_expr(self.data.constraints.iter().copied(), expr).simplified
        };

        for part in split_ands(simplified) {
            if part == true_() {
                continue;
            }
            if self.seen.contains(&part) {
                continue;
            }
            Rc::make_mut(&mut self.seen).insert(part);
            self.mutate().constraints.push(part);
        }

        self.adding_counter = self.adding_counter.wrapping_add(1);
        if policy == RewriteEqualities::Full && self.adding_counter & RESIMPLIFY_PERIOD_MASK == 0 {
            self.resimplify(policy);
        }
    }

    /// Runs `Simplificator::simplify` over the whole set and replaces the
    /// stored constraints with its fixed point.
    fn resimplify(&mut self, policy: RewriteEqualities) {
        let current: HashSet<ExprId> = self.data.constraints.iter().copied().collect();
        let result = simplificator::simplify(&current, policy);
        let constraints: Vec<ExprId> = result.simplified.into_iter().collect();
        let seen: HashSet<ExprId> = constraints.iter().copied().collect();
        self.mutate().constraints = constraints;
        self.seen = Rc::new(seen);
    }

    pub fn add_symcrete(&mut self, array: ArrayId, concrete_bytes: Vec<u8>) {
        let data = self.mutate();
        data.symcretes.insert(array);
        data.concretization.insert(array, concrete_bytes);
    }

    pub fn is_symcretized(&self, array: ArrayId) -> bool {
        self.data.symcretes.contains(&array)
    }

    pub fn concretization(&self) -> &Assignment {
        &self.data.concretization
    }

    /// Replaces the concretization wholesale, e.g. after a concretization
    /// manager resolves a fresh set of symcretes for a state that forked.
    pub fn rewrite_concretization(&mut self, assignment: Assignment) {
        self.mutate().concretization = assignment;
    }

    /// Builds a new set identical to `self` but with `expr` conjoined,
    /// without touching `self` - used when exploring a branch speculatively
    /// before committing to it.
    pub fn with_expr(&self, expr: ExprId, policy: RewriteEqualities) -> Self {
        let mut clone = self.clone();
        clone.add_constraint(expr, policy);
        clone
    }

    /// Partitions the constraints into maximal subsets that share no
    /// symbolic array, so a solver query against one subset never needs
    /// the others - this is what makes per-target incremental solving
    /// cheap on large states with many unrelated symbolic inputs.
    pub fn independent_constraint_sets(&self) -> Vec<Vec<ExprId>> {
        let mut parent: HashMap<ArrayId, ArrayId> = HashMap::new();
        let mut constraint_arrays: Vec<(ExprId, HashSet<ArrayId>)> = Vec::new();

        fn find(parent: &mut HashMap<ArrayId, ArrayId>, a: ArrayId) -> ArrayId {
            let p = *parent.entry(a).or_insert(a);
            if p == a {
                a
            } else {
                let root = find(parent, p);
                parent.insert(a, root);
                root
            }
        }
        fn union(parent: &mut HashMap<ArrayId, ArrayId>, a: ArrayId, b: ArrayId) {
            let (ra, rb) = (find(parent, a), find(parent, b));
            if ra != rb {
                parent.insert(ra, rb);
            }
        }

        for &c in &self.data.constraints {
            let arrays = referenced_arrays(c);
            let mut it = arrays.iter().copied();
            if let Some(first) = it.next() {
                for other in it {
                    union(&mut parent, first, other);
                }
            }
            constraint_arrays.push((c, arrays));
        }

        let mut groups: HashMap<ArrayId, Vec<ExprId>> = HashMap::new();
        let mut no_array_group: Vec<ExprId> = Vec::new();
        for (c, arrays) in constraint_arrays {
            match arrays.iter().next() {
                Some(&any) => {
                    let root = find(&mut parent, any);
                    groups.entry(root).or_default().push(c);
                }
                None => no_array_group.push(c),
            }
        }
        let mut result: Vec<Vec<ExprId>> = groups.into_values().collect();
        if !no_array_group.is_empty() {
            result.push(no_array_group);
        }
        result
    }

    /// The dual of `independent_constraint_sets`: every constraint that
    /// shares at least one array with `query_arrays`, transitively.
    pub fn dependent_constraint_set(&self, query_arrays: &HashSet<ArrayId>) -> Vec<ExprId> {
        self.independent_constraint_sets()
            .into_iter()
            .filter(|group| {
                group.iter().any(|&c| !referenced_arrays(c).is_disjoint(query_arrays))
            })
            .flatten()
            .collect()
    }
}

fn referenced_arrays(expr: ExprId) -> HashSet<ArrayId> {
    let mut out = HashSet::new();
    let mut stack = vec![expr];
    let mut visited = HashSet::new();
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let e = Expr::get(id);
        match e.kind {
            ExprKind::Constant(_) => {}
            ExprKind::Read { updates, index } => {
                out.insert(symex_expr::UpdateList::root_array(updates));
                stack.push(index);
            }
            ExprKind::Concat(a, b) => {
                stack.push(a);
                stack.push(b);
            }
            ExprKind::Extract { child, .. } => stack.push(child),
            ExprKind::Select { cond, t, f } => {
                stack.push(cond);
                stack.push(t);
                stack.push(f);
            }
            ExprKind::Arith(_, a, b) => {
                stack.push(a);
                stack.push(b);
            }
            ExprKind::Bitwise(_, a, b) => {
                stack.push(a);
                if let Some(b) = b {
                    stack.push(b);
                }
            }
            ExprKind::Cmp(_, a, b) => {
                stack.push(a);
                stack.push(b);
            }
            ExprKind::Cast { child, .. } => stack.push(child),
            ExprKind::Float { a, b, .. } => {
                stack.push(a);
                if let Some(b) = b {
                    stack.push(b);
                }
            }
            ExprKind::Pointer { base, value } => {
                stack.push(base);
                stack.push(value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use symex_expr::array::{Array, ArraySource};
    use symex_expr::expr::{arith, bitwise, cmp, constant_u64, ArithOp, BitwiseOp as Bw, RequestedCmpOp};
    use symex_expr::update_list::{self, UpdateList};
    use symex_expr::Width;

    fn setup() {
        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        symex_expr::update_list::reset_arena();
    }

    fn sym(width: Width, name: &str) -> ExprId {
        let size = constant_u64(32, 256);
        let array = Array::create(size, 32, width, ArraySource::MakeSymbolic { name: name.into(), version: 0 });
        let root = UpdateList::root(array);
        update_list::read(root, constant_u64(32, 0), width)
    }

    #[test]
    #[serial]
    fn adding_true_after_simplification_is_a_no_op() {
        setup();
        let mut set = ConstraintSet::new();
        let x = sym(32, "x");
        let eq = cmp(RequestedCmpOp::Eq, constant_u64(32, 1), x).unwrap();
        set.add_constraint(eq, RewriteEqualities::Full);
        assert_eq!(set.constraints().len(), 1);

        set.add_constraint(eq, RewriteEqualities::Full);
        assert_eq!(set.constraints().len(), 1, "duplicate constraint should not grow the set");
    }

    #[test]
    #[serial]
    fn conjunction_is_split_into_two_constraints() {
        setup();
        let mut set = ConstraintSet::new();
        let x = sym(8, "x");
        let a = cmp(RequestedCmpOp::Ult, x, constant_u64(8, 100)).unwrap();
        let b = cmp(RequestedCmpOp::Ult, constant_u64(8, 0), x).unwrap();
        let conj = bitwise(Bw::And, a, b).unwrap();
        set.add_constraint(conj, RewriteEqualities::None);
        assert_eq!(set.constraints().len(), 2);
    }

    #[test]
    #[serial]
    fn clone_is_copy_on_write() {
        setup();
        let mut base = ConstraintSet::new();
        let x = sym(32, "x");
        base.add_constraint(cmp(RequestedCmpOp::Ult, x, constant_u64(32, 10)).unwrap(), RewriteEqualities::None);

        let mut forked = base.clone();
        forked.add_constraint(cmp(RequestedCmpOp::Ult, x, constant_u64(32, 20)).unwrap(), RewriteEqualities::None);

        assert_eq!(base.constraints().len(), 1);
        assert_eq!(forked.constraints().len(), 2);
    }

    #[test]
    #[serial]
    fn unrelated_constraints_land_in_different_independent_sets() {
        setup();
        let mut set = ConstraintSet::new();
        let x = sym(32, "x");
        let y = sym(32, "y");
        set.add_constraint(cmp(RequestedCmpOp::Ult, x, constant_u64(32, 10)).unwrap(), RewriteEqualities::None);
        set.add_constraint(cmp(RequestedCmpOp::Ult, y, constant_u64(32, 10)).unwrap(), RewriteEqualities::None);

        let groups = set.independent_constraint_sets();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    #[serial]
    fn constraints_sharing_an_array_land_in_the_same_independent_set() {
        setup();
        let mut set = ConstraintSet::new();
        let x = sym(32, "x");
        set.add_constraint(cmp(RequestedCmpOp::Ult, x, constant_u64(32, 10)).unwrap(), RewriteEqualities::None);
        let x_plus_one = arith(ArithOp::Add, x, constant_u64(32, 1)).unwrap();
        set.add_constraint(cmp(RequestedCmpOp::Ult, x_plus_one, constant_u64(32, 20)).unwrap(), RewriteEqualities::None);

        let groups = set.independent_constraint_sets();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }
}
