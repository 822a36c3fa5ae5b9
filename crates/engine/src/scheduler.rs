//! The scheduler loop (§5): single-threaded cooperative execution with no
//! executor threads. Each turn selects a state via the installed
//! `Searcher`, hands it to the caller's step closure, applies whatever the
//! closure decided (continue, fork, or terminate), and publishes the
//! resulting state-set changes through the `ObjectManager` before the next
//! turn begins.
//!
//! Grounded on the teacher's `scheduler.rs` shape - `ACTIVE_STRANDS`,
//! `TOTAL_SPAWNED`, `TOTAL_COMPLETED`, `PEAK_STRANDS` - but replaces May's
//! green threads (multi-OS-thread coroutines; wrong model for a
//! single-threaded symbolic engine) with plain `u64` struct fields, since
//! only one thread ever touches a `Scheduler`. Instruction semantics
//! themselves belong to the excluded IR front-end/interpreter; this loop
//! is generic over a `step` callback so it can be exercised in tests
//! without one.

use crate::forest::{ProcessForest, StateId};
use crate::manager::{ObjectManager, StatesEvent};
use crate::searcher::Searcher;
use crate::state::{ExecutionState, TerminationKind};
use std::collections::HashMap;

/// What a single step of a selected state resulted in.
pub enum StepOutcome {
    /// The state advanced in place; still live.
    Continue,
    /// The state forked: `self` becomes one branch (already mutated by the
    /// closure) and `other` is the new sibling, ready to be registered.
    Fork(ExecutionState),
    /// The state is no longer steppable.
    Terminate(TerminationKind),
}

/// Lifetime counters mirroring the teacher's `TOTAL_SPAWNED`/
/// `TOTAL_COMPLETED`/`PEAK_STRANDS`, kept as plain fields rather than
/// atomics since the scheduler is the sole owner-thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub total_spawned: u64,
    pub total_terminated: u64,
    pub peak_live: u64,
}

pub struct Scheduler<S: Searcher> {
    states: HashMap<u64, ExecutionState>,
    forest: ProcessForest,
    manager: ObjectManager,
    searcher: S,
    next_state_id: u64,
    stats: SchedulerStats,
}

impl<S: Searcher> Scheduler<S> {
    pub fn new(initial: ExecutionState, searcher: S) -> Self {
        let id = initial.id();
        let mut forest = ProcessForest::new();
        forest.add_root(StateId(id));
        let mut states = HashMap::new();
        states.insert(id, initial);

        let mut manager = ObjectManager::new();
        manager.publish_states(StatesEvent { current: None, added: vec![StateId(id)], removed: vec![], isolated: vec![] });

        let mut scheduler = Self {
            states,
            forest,
            manager,
            searcher,
            next_state_id: id + 1,
            stats: SchedulerStats { total_spawned: 1, total_terminated: 0, peak_live: 1 },
        };
        scheduler.searcher.update(None, &[StateId(id)], &[]);
        scheduler
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn manager(&self) -> &ObjectManager {
        &self.manager
    }

    pub fn live_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: u64) -> Option<&ExecutionState> {
        self.states.get(&id)
    }

    /// The id `run_step` will assign to a forked sibling if the next turn
    /// returns `StepOutcome::Fork`. A caller building that sibling (via
    /// `ExecutionState::branch`) must use this id - call it just before
    /// `run_step`, since the step closure has no way to ask the scheduler
    /// for an id while it runs.
    pub fn peek_next_id(&self) -> u64 {
        self.next_state_id
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_state_id;
        self.next_state_id += 1;
        id
    }

    /// One turn: select a state, let `step` decide its fate, publish the
    /// resulting change, and update the searcher. Returns `false` once
    /// the searcher has nothing left to select, which ends the run.
    pub fn run_step(&mut self, step: impl FnOnce(&mut ExecutionState) -> StepOutcome) -> bool {
        let Some(StateId(selected)) = self.searcher.select_state() else {
            return false;
        };
        let mut current = self.states.remove(&selected).expect("searcher returned an untracked state");
        let outcome = step(&mut current);

        match outcome {
            StepOutcome::Continue => {
                tracing::trace!(state = selected, "state stepped");
                self.states.insert(selected, current);
                self.manager.publish_states(StatesEvent {
                    current: Some(StateId(selected)),
                    added: vec![],
                    removed: vec![],
                    isolated: vec![],
                });
                self.searcher.update(Some(StateId(selected)), &[], &[]);
            }
            StepOutcome::Fork(sibling) => {
                let sibling_id = self.fresh_id();
                tracing::debug!(parent = selected, sibling = sibling_id, "state forked");
                self.forest.fork(StateId(selected), StateId(selected), StateId(sibling_id));
                self.stats.total_spawned += 1;
                self.stats.peak_live = self.stats.peak_live.max(self.states.len() as u64 + 2);

                self.states.insert(selected, current);
                // `branch()` is expected to have already been given the
                // fresh id by the caller; guard the invariant here rather
                // than silently diverging from the forest/registry key.
                debug_assert_eq!(sibling.id(), sibling_id, "sibling must be branched with its assigned fresh id");
                self.states.insert(sibling_id, sibling);

                self.manager.publish_states(StatesEvent {
                    current: Some(StateId(selected)),
                    added: vec![StateId(sibling_id)],
                    removed: vec![],
                    isolated: vec![],
                });
                self.searcher.update(Some(StateId(selected)), &[StateId(sibling_id)], &[]);
            }
            StepOutcome::Terminate(kind) => {
                tracing::debug!(state = selected, ?kind, "state terminated");
                current.terminate(kind);
                self.stats.total_terminated += 1;
                self.forest.remove(StateId(selected));
                let removed = self.manager.publish_states(StatesEvent {
                    current: None,
                    added: vec![],
                    removed: vec![StateId(selected)],
                    isolated: vec![],
                });
                self.searcher.update(None, &[], &removed);
                // `current` is dropped here, after every subscriber has
                // seen the `States` event naming it - the ownership
                // transition §4.13 describes.
            }
        }
        true
    }

    /// Drains the searcher until it reports empty, calling `step` for
    /// every selected state. Returns the total number of turns taken.
    pub fn run_to_completion(&mut self, mut step: impl FnMut(&mut ExecutionState) -> StepOutcome) -> u64 {
        let mut turns = 0u64;
        while self.run_step(&mut step) {
            turns += 1;
        }
        turns
    }
}
