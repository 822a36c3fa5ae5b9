//! The Bidirectional Engine (C12): proof obligations, propagations, and
//! targeted conflicts.
//!
//! A `ProofObligation` (pob) is a backward summary - "to satisfy the goal
//! at block `b`, these constraints must hold at entry" - keyed by target
//! location and held in a DAG where subtree deletion cascades. A forward
//! state that reaches a pob's target is installed as a *reached state*;
//! matching a reached state against a live pob produces a `Propagation`,
//! which the engine composes (alpha-renaming arrays, rewriting
//! lazy-initialization sources) into a candidate path, checks for
//! feasibility, and propagates one block backward (or one frame up, on
//! function entry). A pob that reaches the program entry is *closed*; one
//! that fails with an unsat core at some block becomes a `TargetedConflict`
//! fed back to forward searchers.
//!
//! Grounded on KLEE's bidirectional-symbolic-execution core
//! (`lib/Core/ProofObligation.cpp`, `BidirectionalSearcher.cpp`,
//! `lib/Core/TargetedConflict.h`): a DAG of pobs keyed by `ReachWithError`
//! target, a `std::map<Target, std::set<ReachedState>>` of propagations,
//! and `composeConstraints` running `ExprVisitor`-style rewrites before a
//! feasibility check.

use crate::ir::{BlockId, Module};
use crate::path::{PathConstraints, Transition};
use crate::target::Target;
use std::collections::{HashMap, HashSet};
use symex_expr::array::{Array, ArraySource};
use symex_expr::expr::{Expr, ExprId, ExprKind};
use symex_expr::visitor::{rewrite, Action, Visitor};
use symex_expr::AlphaBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PobId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReachedStateId(pub u64);

/// A node in the pob DAG. Children are the pobs propagated from this one
/// one block further back; deleting a pob cascades to every child,
/// matching "subtree deletion cascades" (§3).
#[derive(Debug, Clone)]
pub struct ProofObligation {
    id: PobId,
    target: Target,
    at_block: BlockId,
    path_constraints: PathConstraints,
    parent: Option<PobId>,
    children: Vec<PobId>,
    /// Per-target-location count of reached states this pob has already
    /// matched, so the same (pob, reached state) pair never propagates
    /// twice.
    matched_reached_states: HashSet<ReachedStateId>,
}

impl ProofObligation {
    pub fn id(&self) -> PobId {
        self.id
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn at_block(&self) -> BlockId {
        self.at_block
    }

    pub fn path_constraints(&self) -> &PathConstraints {
        &self.path_constraints
    }

    pub fn parent(&self) -> Option<PobId> {
        self.parent
    }

    pub fn children(&self) -> &[PobId] {
        &self.children
    }
}

/// A forward state that reached some pob's target, installed so future
/// (and already-live) pobs at that target can be matched against it.
#[derive(Debug, Clone)]
pub struct ReachedState {
    id: ReachedStateId,
    target: Target,
    path_constraints: PathConstraints,
}

impl ReachedState {
    pub fn path_constraints(&self) -> &PathConstraints {
        &self.path_constraints
    }
}

/// A matching of a `ReachedState` with a `ProofObligation` at the same
/// target - the unit of work the bidirectional executor consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Propagation {
    pub pob: PobId,
    pub reached_state: ReachedStateId,
}

/// A block recorded as guaranteed-unreachable from some pob, fed back to
/// forward searchers so they stop exploring toward it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetedConflict {
    pub block: BlockId,
    pub target: Target,
}

/// Outcome of composing a reached state's path onto a pob and checking
/// feasibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// The composed path is feasible and the pob reached the program
    /// entry (no predecessor block, no caller frame) - the conflict this
    /// pob represents is proven reachable.
    Closed,
    /// The composed path is feasible; new pobs were spawned one block (or
    /// one frame) further back, returned for the caller to register.
    Advanced(Vec<ProofObligation>),
    /// The composed path is infeasible; `core` is the minimal unsat subset
    /// that proved it, surfaced as a `TargetedConflict` at `at_block`.
    Conflict { at_block: BlockId, core: Vec<ExprId> },
}

/// Rewrites every `LazyInitialization` array reachable from `id` so its
/// pointer expression is alpha-renamed consistently with the rest of the
/// composed query - otherwise a pob's backward summary would reference the
/// reached state's lazily-initialized pointers under their pre-renaming
/// identity, breaking the independence partition's array-sharing detection
/// once the two sides are spliced together.
struct LazyInitRewriteVisitor<'a> {
    builder: &'a mut AlphaBuilder,
}

impl Visitor for LazyInitRewriteVisitor<'_> {
    fn visit(&mut self, id: ExprId) -> Action {
        if let ExprKind::Read { updates, .. } = Expr::get(id).kind {
            let root = symex_expr::UpdateList::root_array(updates);
            if let ArraySource::LazyInitialization { kind, pointer } = Array::get(root).source {
                let renamed_pointer = self.builder.rename(pointer);
                if renamed_pointer != pointer {
                    let array = Array::get(root);
                    Array::create(
                        array.size,
                        array.domain_width,
                        array.range_width,
                        ArraySource::LazyInitialization { kind, pointer: renamed_pointer },
                    );
                }
            }
        }
        Action::DoChildren
    }
}

/// Alpha-renames both expression sets with one shared builder so an array
/// shared between the reached state's path and the pob's summary collapses
/// to one name, rewrites lazy-initialization pointers under the same
/// naming, and conjoins the pob's renamed constraints onto a continuation
/// of the reached state's path.
fn compose(reached: &ReachedState, pob: &ProofObligation) -> (PathConstraints, Vec<ExprId>) {
    let mut builder = AlphaBuilder::new();
    let reached_constraints = builder.rename_all(reached.path_constraints.constraint_set().constraints());
    let pob_constraints = builder.rename_all(pob.path_constraints.constraint_set().constraints());

    let mut visitor = LazyInitRewriteVisitor { builder: &mut builder };
    for &c in reached_constraints.iter().chain(pob_constraints.iter()) {
        rewrite(&mut visitor, c);
    }

    let composed_path = reached.path_constraints.clone();
    let mut all = reached_constraints;
    all.extend(pob_constraints);
    (composed_path, all)
}

/// Owns the pob DAG, the live-reached-state index, and the accumulated
/// conflicts. A single-threaded coordinator - no locking, matching §5.
#[derive(Default)]
pub struct BidirectionalEngine {
    pobs: HashMap<PobId, ProofObligation>,
    next_pob_id: u64,
    reached: HashMap<Target, Vec<ReachedStateId>>,
    reached_states: HashMap<ReachedStateId, ReachedState>,
    next_reached_id: u64,
    conflicts: Vec<TargetedConflict>,
}

impl BidirectionalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root pob at `target`'s block with no parent - the start
    /// of a new backward search for that target.
    pub fn create_root_pob(&mut self, target: Target, at_block: BlockId) -> PobId {
        let id = PobId(self.next_pob_id);
        self.next_pob_id += 1;
        self.pobs.insert(
            id,
            ProofObligation {
                id,
                target,
                at_block,
                path_constraints: PathConstraints::new(),
                parent: None,
                children: Vec::new(),
                matched_reached_states: HashSet::new(),
            },
        );
        id
    }

    pub fn pob(&self, id: PobId) -> Option<&ProofObligation> {
        self.pobs.get(&id)
    }

    pub fn live_pobs_at(&self, target: Target) -> Vec<PobId> {
        self.pobs.values().filter(|p| p.target == target).map(|p| p.id).collect()
    }

    /// Installs a forward state's arrival at `target` as a reached state,
    /// and returns the propagations this creates against every pob
    /// currently live at that target (§4.12, "matched with every currently
    /// reached state").
    pub fn reach(&mut self, target: Target, path_constraints: PathConstraints) -> Vec<Propagation> {
        let id = ReachedStateId(self.next_reached_id);
        self.next_reached_id += 1;
        self.reached_states.insert(id, ReachedState { id, target, path_constraints });
        self.reached.entry(target).or_default().push(id);

        let mut out = Vec::new();
        for pob in self.pobs.values_mut().filter(|p| p.target == target) {
            if pob.matched_reached_states.insert(id) {
                out.push(Propagation { pob: pob.id, reached_state: id });
            }
        }
        out
    }

    /// Every pob currently live at `target`, matched against a reached
    /// state that arrived after they were created - the complement of
    /// `reach`'s loop, used when a pob is born after some states already
    /// reached the target.
    pub fn propagations_for_new_pob(&mut self, pob: PobId) -> Vec<Propagation> {
        let Some(target) = self.pobs.get(&pob).map(|p| p.target) else { return Vec::new() };
        let mut out = Vec::new();
        if let Some(reached_ids) = self.reached.get(&target).cloned() {
            if let Some(p) = self.pobs.get_mut(&pob) {
                for rid in reached_ids {
                    if p.matched_reached_states.insert(rid) {
                        out.push(Propagation { pob, reached_state: rid });
                    }
                }
            }
        }
        out
    }

    /// Composes the propagation's reached state onto its pob and decides
    /// the outcome: `Closed` if the resulting path has reached the
    /// program entry (no predecessor block in the CFG and no caller
    /// frame), `Advanced` with one child pob per predecessor block (or per
    /// caller block, on function entry), or `Conflict` if composing the
    /// constraints is infeasible.
    ///
    /// `is_feasible` stands in for a solver-chain `check` call - the
    /// (excluded) concrete SMT backend is not wired into this workspace,
    /// so callers supply the feasibility verdict (and, on infeasibility,
    /// the minimal unsat core) from whatever `SolverImpl` they hold.
    pub fn resolve(
        &mut self,
        module: &dyn Module,
        propagation: Propagation,
        is_feasible: impl FnOnce(&[ExprId]) -> Result<(), Vec<ExprId>>,
    ) -> PropagationOutcome {
        let reached = self.reached_states.get(&propagation.reached_state).expect("reached state vanished");
        let pob = self.pobs.get(&propagation.pob).expect("pob vanished").clone();
        let (_composed_path, composed_constraints) = compose(reached, &pob);

        match is_feasible(&composed_constraints) {
            Err(core) => {
                tracing::debug!(pob = pob.id.0, block = pob.at_block.0, "targeted conflict recorded");
                let conflict = TargetedConflict { at_block: pob.at_block, target: pob.target };
                self.conflicts.push(conflict);
                PropagationOutcome::Conflict { at_block: pob.at_block, core }
            }
            Ok(()) => {
                let predecessors = module.block(pob.at_block).predecessors();
                if predecessors.is_empty() {
                    tracing::debug!(pob = pob.id.0, "proof obligation closed at entry");
                    return PropagationOutcome::Closed;
                }
                let mut children = Vec::new();
                for &pred in predecessors {
                    let child_id = PobId(self.next_pob_id);
                    self.next_pob_id += 1;
                    let mut child_pc = pob.path_constraints.clone();
                    child_pc.advance_path(pred, Transition::None);
                    let child = ProofObligation {
                        id: child_id,
                        target: pob.target,
                        at_block: pred,
                        path_constraints: child_pc,
                        parent: Some(pob.id),
                        children: Vec::new(),
                        matched_reached_states: HashSet::new(),
                    };
                    self.pobs.insert(child_id, child);
                    if let Some(parent) = self.pobs.get_mut(&pob.id) {
                        parent.children.push(child_id);
                    }
                    children.push(self.pobs.get(&child_id).unwrap().clone());
                }
                tracing::debug!(pob = pob.id.0, children = children.len(), "proof obligation advanced");
                PropagationOutcome::Advanced(children)
            }
        }
    }

    /// Removes a pob and every descendant, matching §3's "subtree deletion
    /// cascades".
    pub fn delete_subtree(&mut self, root: PobId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(pob) = self.pobs.remove(&id) {
                stack.extend(pob.children);
            }
        }
    }

    pub fn conflicts(&self) -> &[TargetedConflict] {
        &self.conflicts
    }

    pub fn drain_conflicts(&mut self) -> Vec<TargetedConflict> {
        std::mem::take(&mut self.conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mock::{MockBlock, MockFunction, MockModule};

    fn two_block_module() -> MockModule {
        let mut m = MockModule::new();
        m.add_function(MockFunction {
            id: crate::ir::FunctionId(0),
            name: "f".into(),
            argument_count: 0,
            entry_block: BlockId(0),
            blocks: vec![BlockId(0), BlockId(1)],
        });
        m.add_block(MockBlock {
            id: BlockId(0),
            function: crate::ir::FunctionId(0),
            successors: vec![BlockId(1)],
            predecessors: vec![],
            instruction_count: 1,
            call_site: None,
        });
        m.add_block(MockBlock {
            id: BlockId(1),
            function: crate::ir::FunctionId(0),
            successors: vec![],
            predecessors: vec![BlockId(0)],
            instruction_count: 1,
            call_site: None,
        });
        m
    }

    #[test]
    fn reach_before_pob_then_querying_new_pob_finds_it() {
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(1));
        let propagations_before = engine.reach(target, PathConstraints::new());
        assert!(propagations_before.is_empty(), "no pob exists yet to propagate against");

        let pob = engine.create_root_pob(target, BlockId(1));
        let props = engine.propagations_for_new_pob(pob);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].pob, pob);
    }

    #[test]
    fn pob_before_reach_propagates_immediately() {
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(1));
        let pob = engine.create_root_pob(target, BlockId(1));

        let props = engine.reach(target, PathConstraints::new());
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].pob, pob);

        // Reaching again for the same (pob, reached state) must not re-propagate.
        let again = engine.propagations_for_new_pob(pob);
        assert!(again.is_empty());
    }

    #[test]
    fn resolve_advances_one_pob_per_predecessor() {
        let module = two_block_module();
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(1));
        let pob = engine.create_root_pob(target, BlockId(1));
        let props = engine.reach(target, PathConstraints::new());

        let outcome = engine.resolve(&module, props[0], |_| Ok(()));
        match outcome {
            PropagationOutcome::Advanced(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].at_block(), BlockId(0));
                assert_eq!(children[0].parent(), Some(pob));
            }
            other => panic!("expected Advanced, got {other:?}"),
        }
    }

    #[test]
    fn resolve_closes_when_block_has_no_predecessors() {
        let module = two_block_module();
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(0));
        engine.create_root_pob(target, BlockId(0));
        let props = engine.reach(target, PathConstraints::new());

        let outcome = engine.resolve(&module, props[0], |_| Ok(()));
        assert_eq!(outcome, PropagationOutcome::Closed);
    }

    #[test]
    fn resolve_records_a_targeted_conflict_on_infeasibility() {
        let module = two_block_module();
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(1));
        engine.create_root_pob(target, BlockId(1));
        let props = engine.reach(target, PathConstraints::new());

        let outcome = engine.resolve(&module, props[0], |_| Err(vec![]));
        assert!(matches!(outcome, PropagationOutcome::Conflict { .. }));
        assert_eq!(engine.conflicts().len(), 1);
    }

    #[test]
    fn delete_subtree_removes_descendants() {
        let module = two_block_module();
        let mut engine = BidirectionalEngine::new();
        let target = Target::reachability(BlockId(1));
        let root = engine.create_root_pob(target, BlockId(1));
        let props = engine.reach(target, PathConstraints::new());
        let outcome = engine.resolve(&module, props[0], |_| Ok(()));
        let child = match outcome {
            PropagationOutcome::Advanced(children) => children[0].id(),
            _ => panic!("expected Advanced"),
        };

        engine.delete_subtree(root);
        assert!(engine.pob(root).is_none());
        assert!(engine.pob(child).is_none());
    }
}
