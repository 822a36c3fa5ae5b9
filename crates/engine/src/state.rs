//! `ExecutionState` (C8): one point in the cloud of states a symbolic run
//! maintains. Holds everything that must fork copy-on-write - the address
//! space, the path constraints, the call stack, the active-target set and
//! history - plus the bookkeeping a searcher needs to rank it (stepped
//! memory instruction count, solver-query metadata).
//!
//! Grounded on KLEE's `ExecutionState.h`/`.cpp`: `pc`/`prevPC`, `stack`
//! (frames of `caller` + `kf`), `addressSpace`, `constraints`, the
//! `targets_`/`history_` pair pruned on `stepTo`, and `forkDisabled`.

use crate::config::RewriteEqualities;
use crate::ir::{BlockId, FunctionId, InstructionId};
use crate::memory::AddressSpace;
use crate::path::{PathConstraints, Transition};
use crate::target::{self, History, Target};
use std::collections::HashSet;
use symex_expr::{ExprId, RoundingMode};

/// `Regular` states explore forward from the entry point; `Isolated`
/// states are backward summaries driven by the bidirectional engine
/// (§4.12's proof obligations run their composed state through the same
/// stepper, tagged `Isolated` so a searcher can tell the two apart).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Regular,
    Isolated,
}

/// Why a state stopped being steppable. `terminate` does not itself remove
/// the state from searchers or the process forest - that is the object
/// manager's job once it publishes the `States` event carrying this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Exit,
    EarlyUser,
    Assert,
    ExecError,
    Ptr,
    OutOfMemory,
    Abort,
    ReportError,
}

/// One call-stack frame: the instruction that made the call (`None` for
/// the entry function) and the function now executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub caller: Option<InstructionId>,
    pub function: FunctionId,
}

/// Running totals a solver-chain wrapper updates after every query this
/// state issues - feeds `WeightedRandom`'s `1/queryCost` weight (§4.11).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverQueryMetadata {
    pub queries_issued: u64,
    pub total_cost_ms: u64,
}

impl SolverQueryMetadata {
    pub fn record_query(&mut self, cost_ms: u64) {
        self.queries_issued += 1;
        self.total_cost_ms += cost_ms;
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionState {
    id: u64,
    kind: StateKind,
    pc: InstructionId,
    prev_pc: Option<InstructionId>,
    initial_pc: InstructionId,
    stack: Vec<Frame>,
    address_space: AddressSpace,
    path_constraints: PathConstraints,
    rounding_mode: RoundingMode,
    history: History,
    active_targets: HashSet<Target>,
    solver_query_metadata: SolverQueryMetadata,
    stepped_memory_instructions: u64,
    fork_disabled: bool,
    assumptions: HashSet<ExprId>,
    termination: Option<TerminationKind>,
}

impl ExecutionState {
    pub fn new(id: u64, entry_function: FunctionId, entry_pc: InstructionId, rounding_mode: RoundingMode) -> Self {
        Self {
            id,
            kind: StateKind::Regular,
            pc: entry_pc,
            prev_pc: None,
            initial_pc: entry_pc,
            stack: vec![Frame { caller: None, function: entry_function }],
            address_space: AddressSpace::new(),
            path_constraints: PathConstraints::new(),
            rounding_mode,
            history: target::history_root(),
            active_targets: HashSet::new(),
            solver_query_metadata: SolverQueryMetadata::default(),
            stepped_memory_instructions: 0,
            fork_disabled: false,
            assumptions: HashSet::new(),
            termination: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn pc(&self) -> InstructionId {
        self.pc
    }

    pub fn prev_pc(&self) -> Option<InstructionId> {
        self.prev_pc
    }

    pub fn initial_pc(&self) -> InstructionId {
        self.initial_pc
    }

    pub fn call_stack(&self) -> &[Frame] {
        &self.stack
    }

    pub fn current_function(&self) -> FunctionId {
        self.stack.last().expect("a state always has at least one frame").function
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    pub fn address_space_mut(&mut self) -> &mut AddressSpace {
        &mut self.address_space
    }

    pub fn path_constraints(&self) -> &PathConstraints {
        &self.path_constraints
    }

    pub fn rounding_mode(&self) -> RoundingMode {
        self.rounding_mode
    }

    pub fn set_rounding_mode(&mut self, mode: RoundingMode) {
        self.rounding_mode = mode;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn active_targets(&self) -> &HashSet<Target> {
        &self.active_targets
    }

    pub fn add_target(&mut self, target: Target) {
        self.active_targets.insert(target);
    }

    pub fn remove_target(&mut self, target: &Target) {
        self.active_targets.remove(target);
    }

    /// Marks `target` satisfied: folds it into `history` and drops it from
    /// the active set, re-rooting the state's view of the target forest
    /// per §4.8 ("the target forest prunes itself as targets are
    /// satisfied and re-roots on stepTo").
    pub fn reach_target(&mut self, target: Target) {
        self.history = target::history_add(&self.history, target);
        self.active_targets.remove(&target);
    }

    pub fn solver_query_metadata(&self) -> SolverQueryMetadata {
        self.solver_query_metadata
    }

    pub fn record_query(&mut self, cost_ms: u64) {
        self.solver_query_metadata.record_query(cost_ms);
    }

    pub fn stepped_memory_instructions(&self) -> u64 {
        self.stepped_memory_instructions
    }

    pub fn fork_disabled(&self) -> bool {
        self.fork_disabled
    }

    pub fn set_fork_disabled(&mut self, disabled: bool) {
        self.fork_disabled = disabled;
    }

    pub fn assumptions(&self) -> &HashSet<ExprId> {
        &self.assumptions
    }

    pub fn add_assumption(&mut self, expr: ExprId) {
        self.assumptions.insert(expr);
    }

    pub fn termination(&self) -> Option<TerminationKind> {
        self.termination
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    /// Advances `pc`/`prevPC` to `next_pc` and records the transition on
    /// the path. `touches_memory` bumps `steppedMemoryInstructions`, which
    /// feeds both C10's weight formula and the Batching searcher's
    /// instruction budget.
    pub fn step(&mut self, next_pc: InstructionId, block: BlockId, transition: Transition, touches_memory: bool) {
        self.prev_pc = Some(self.pc);
        self.pc = next_pc;
        self.path_constraints.advance_path(block, transition);
        if touches_memory {
            self.stepped_memory_instructions += 1;
        }
    }

    /// Pushes a new call frame and records an `In` transition - the call
    /// site's caller instruction becomes the new frame's return address.
    pub fn call(&mut self, callee_entry: InstructionId, callee_block: BlockId, function: FunctionId) {
        let caller = Some(self.pc);
        self.prev_pc = Some(self.pc);
        self.pc = callee_entry;
        self.stack.push(Frame { caller, function });
        self.path_constraints.advance_path(callee_block, Transition::In);
    }

    /// Pops the current frame and records an `Out` transition, resuming at
    /// `return_pc` in the caller.
    pub fn ret(&mut self, return_pc: InstructionId, return_block: BlockId) {
        self.prev_pc = Some(self.pc);
        self.pc = return_pc;
        self.stack.pop();
        debug_assert!(!self.stack.is_empty(), "returned out of the entry frame");
        self.path_constraints.advance_path(return_block, Transition::Out);
    }

    /// Adds `expr` to the path constraints, forwarding to
    /// `PathConstraints::add_constraint` and reporting the same
    /// newly-inserted conjuncts.
    pub fn add_constraint(&mut self, expr: ExprId, policy: RewriteEqualities) -> Vec<ExprId> {
        self.path_constraints.add_constraint(expr, policy)
    }

    /// Clones `self` into a sibling state with a fresh id, ready for the
    /// two branches to diverge (typically by each adding the opposite
    /// constraint). Every field here is `Rc`-backed or a cheap scalar copy,
    /// so this is O(1) regardless of how large the address space or
    /// constraint set has grown - the clone only materializes on the first
    /// write either side makes (§4.8's "preserves copy-on-write").
    pub fn branch(&self, new_id: u64) -> ExecutionState {
        let mut clone = self.clone();
        clone.id = new_id;
        clone
    }

    /// Produces the `Isolated` counterpart of a `Regular` state (or vice
    /// versa) with the same id - used when the bidirectional engine
    /// installs a reached state's clone as a backward-search participant.
    pub fn with_kind(mut self, kind: StateKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn terminate(&mut self, kind: TerminationKind) {
        self.termination = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryObject, ObjectState};
    use symex_expr::expr::constant_u64;

    fn entry() -> InstructionId {
        InstructionId { block: BlockId(0), index: 0 }
    }

    #[test]
    #[serial_test::serial]
    fn branch_shares_address_space_until_written() {
        symex_expr::expr::reset_arena();
        symex_expr::array::reset_arena();
        symex_expr::update_list::reset_arena();

        let mut base = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
        base.address_space_mut().bind(
            MemoryObject::new(crate::memory::ObjectId(1), constant_u64(64, 8), constant_u64(64, 0), None),
            ObjectState::new_uninitialized(crate::memory::ObjectId(1), 8),
        );

        let sibling = base.branch(1);
        assert_eq!(sibling.id(), 1);
        assert_eq!(base.call_stack().len(), sibling.call_stack().len());

        let before = sibling.address_space().object_state(crate::memory::ObjectId(1)).unwrap().read8_const(0);
        let after = base.address_space().object_state(crate::memory::ObjectId(1)).unwrap().read8_const(0);
        assert_eq!(before, after, "unforked branches still see identical memory");
    }

    #[test]
    fn step_advances_pc_and_counts_memory_instructions() {
        let mut state = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
        let next = InstructionId { block: BlockId(0), index: 1 };
        state.step(next, BlockId(0), Transition::None, true);
        assert_eq!(state.pc(), next);
        assert_eq!(state.prev_pc(), Some(entry()));
        assert_eq!(state.stepped_memory_instructions(), 1);
    }

    #[test]
    fn call_then_ret_restores_the_original_frame_count() {
        let mut state = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
        let callee_entry = InstructionId { block: BlockId(1), index: 0 };
        state.call(callee_entry, BlockId(1), FunctionId(1));
        assert_eq!(state.call_stack().len(), 2);
        assert_eq!(state.current_function(), FunctionId(1));

        let return_pc = InstructionId { block: BlockId(0), index: 1 };
        state.ret(return_pc, BlockId(0));
        assert_eq!(state.call_stack().len(), 1);
        assert_eq!(state.current_function(), FunctionId(0));
    }

    #[test]
    fn reach_target_moves_it_from_active_into_history() {
        target::reset_history_intern();
        let mut state = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
        let target = Target::reachability(BlockId(5));
        state.add_target(target);
        assert!(state.active_targets().contains(&target));

        state.reach_target(target);
        assert!(!state.active_targets().contains(&target));
        assert_eq!(crate::target::history_last_target(state.history()), Some(target));
    }

    #[test]
    fn terminate_records_the_kind_once() {
        let mut state = ExecutionState::new(0, FunctionId(0), entry(), RoundingMode::RNE);
        assert!(!state.is_terminated());
        state.terminate(TerminationKind::Exit);
        assert_eq!(state.termination(), Some(TerminationKind::Exit));
    }
}
