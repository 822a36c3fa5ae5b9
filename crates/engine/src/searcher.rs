//! The Searcher family (C11): every strategy for picking which state to
//! step next implements the same three-method interface, so the scheduler
//! never needs to know which one is installed.
//!
//! Searchers operate on `forest::StateId` handles rather than owning
//! `ExecutionState`s directly - state storage belongs to the scheduler
//! (§5's single-threaded cooperative loop); this mirrors KLEE's
//! `Searcher.h`, where `selectState` returns an `ExecutionState&` into a
//! pool the `Executor` owns, not a value the searcher holds itself.
//!
//! Grounded on KLEE's `Searcher.cpp`: `DFSSearcher`/`BFSSearcher` (deque
//! ends), `RandomSearcher`, `WeightedRandomSearcher` (`WeightType`'s seven
//! variants), `RandomPathSearcher` (walks `PTree` ownership bits),
//! `BatchingSearcher`, `IterativeDeepeningTimeSearcher`,
//! `TargetedSearcher`, `GuidedSearcher`, `InterleavedSearcher`, and
//! `MergingSearcher`.

use crate::forest::{NodeId, ProcessForest, StateId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Every searcher implements this; `current` in `update` may be `None` for
/// a pure add/remove notification (§4.11, "Update semantics"). Removal
/// must be idempotent - the same `StateId` may appear in `removed` twice
/// across overlapping update calls if two callers both notice termination.
pub trait Searcher {
    fn select_state(&mut self) -> Option<StateId>;
    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]);
    fn empty(&self) -> bool;
}

/// Back of a deque, matching KLEE's `DFSSearcher::selectState` (`states.back()`).
#[derive(Default)]
pub struct DfsSearcher {
    states: Vec<StateId>,
}

impl DfsSearcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Searcher for DfsSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        self.states.last().copied()
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        self.states.retain(|s| !removed.contains(s));
    }

    fn empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Front of a deque. `current` is re-appended on every update (unless
/// removed) so a state that just forked does not lose its place in line -
/// matching KLEE's `BFSSearcher`, which re-pushes `current` to the back.
#[derive(Default)]
pub struct BfsSearcher {
    states: VecDeque<StateId>,
}

impl BfsSearcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Searcher for BfsSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        self.states.front().copied()
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if let Some(current) = current {
            if !removed.contains(&current) {
                self.states.retain(|s| *s != current);
                self.states.push_back(current);
            }
        }
        self.states.retain(|s| !removed.contains(s));
        for &s in added {
            self.states.push_back(s);
        }
    }

    fn empty(&self) -> bool {
        self.states.is_empty()
    }
}

pub struct RandomSearcher {
    states: Vec<StateId>,
    rng: StdRng,
}

impl RandomSearcher {
    pub fn new(seed: u64) -> Self {
        Self { states: Vec::new(), rng: StdRng::seed_from_u64(seed) }
    }
}

impl Searcher for RandomSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        if self.states.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.states.len());
        Some(self.states[idx])
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        self.states.retain(|s| !removed.contains(s));
    }

    fn empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// The seven weight functions `WeightedRandomSearcher` can be configured
/// with (§4.11). The scheduler supplies the actual numbers through
/// `weights_of` since they depend on state/program data this module has no
/// access to (instruction counts, coverage, query cost).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightType {
    Depth,
    InverseExpDepth,
    InverseInstCountSquared,
    InverseCpInstCount,
    InverseQueryCost,
    MinDistToUncovered,
    CoveringNew,
}

/// Samples states with probability proportional to an externally supplied
/// weight, by normalized cumulative distribution (discrete inverse
/// transform sampling) - matches `WeightedRandomSearcher::selectState`'s
/// linear scan over `sum`.
pub struct WeightedRandomSearcher {
    kind: WeightType,
    states: Vec<StateId>,
    rng: StdRng,
}

impl WeightedRandomSearcher {
    pub fn new(kind: WeightType, seed: u64) -> Self {
        Self { kind, states: Vec::new(), rng: StdRng::seed_from_u64(seed) }
    }

    pub fn kind(&self) -> WeightType {
        self.kind
    }

    /// `weight_of(state)` must return a positive finite weight for every
    /// state currently tracked; the caller (scheduler) computes it from
    /// whatever `self.kind` asks for.
    pub fn select_state_weighted(&mut self, weight_of: impl Fn(StateId) -> f64) -> Option<StateId> {
        if self.states.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self.states.iter().map(|&s| weight_of(s).max(0.0)).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            let idx = self.rng.gen_range(0..self.states.len());
            return Some(self.states[idx]);
        }
        let pick: f64 = self.rng.gen_range(0.0..total);
        let mut acc = 0.0;
        for (state, w) in self.states.iter().zip(weights.iter()) {
            acc += w;
            if pick < acc {
                return Some(*state);
            }
        }
        self.states.last().copied()
    }
}

impl Searcher for WeightedRandomSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        // Uniform fallback when no external weight source is wired in;
        // `select_state_weighted` is the real entry point the scheduler uses.
        self.select_state_weighted(|_| 1.0)
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        self.states.retain(|s| !removed.contains(s));
    }

    fn empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Walks `ProcessForest` from a root, biasing left/right by which subtree
/// this searcher's id bit still owns, choosing uniformly between valid
/// descendants at each internal node - path-uniform state selection
/// without ever materializing the live-state set (§4.9).
pub struct RandomPathSearcher {
    searcher_id: u32,
    rng: StdRng,
}

impl RandomPathSearcher {
    pub fn new(searcher_id: u32, seed: u64) -> Self {
        Self { searcher_id, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn select_from(&mut self, forest: &ProcessForest) -> Option<StateId> {
        let roots: Vec<NodeId> = forest
            .roots()
            .iter()
            .copied()
            .filter(|&r| forest.is_owned(r, self.searcher_id))
            .collect();
        if roots.is_empty() {
            return None;
        }
        let mut node = roots[self.rng.gen_range(0..roots.len())];
        loop {
            if let Some(state) = forest.state_at(node) {
                return Some(state);
            }
            let children: Vec<NodeId> = forest
                .children(node)
                .into_iter()
                .flatten()
                .filter(|&c| forest.is_owned(c, self.searcher_id))
                .collect();
            match children.len() {
                0 => return None,
                1 => node = children[0],
                _ => node = children[self.rng.gen_range(0..children.len())],
            }
        }
    }
}

/// Stays on one state for a time/instruction budget before yielding back
/// to `base`, matching KLEE's `BatchingSearcher`. `note_overrun` doubles
/// the time budget the next time a single step is observed to exceed it -
/// "auto-grows the time budget if an iteration overrun is detected".
pub struct BatchingSearcher {
    base: Box<dyn Searcher>,
    time_budget: Duration,
    instruction_budget: u64,
    current: Option<StateId>,
    batch_started: Option<Instant>,
    instructions_this_batch: u64,
}

impl BatchingSearcher {
    pub fn new(base: Box<dyn Searcher>, time_budget: Duration, instruction_budget: u64) -> Self {
        Self { base, time_budget, instruction_budget, current: None, batch_started: None, instructions_this_batch: 0 }
    }

    /// Called once per step taken on the currently selected state.
    pub fn note_step(&mut self, elapsed_since_batch_start: Duration) {
        self.instructions_this_batch += 1;
        if elapsed_since_batch_start > self.time_budget {
            self.time_budget *= 2;
        }
    }

    fn batch_exhausted(&self) -> bool {
        self.instructions_this_batch >= self.instruction_budget
            || self.batch_started.map(|t| t.elapsed() >= self.time_budget).unwrap_or(false)
    }
}

impl Searcher for BatchingSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        if self.current.is_none() || self.batch_exhausted() {
            self.current = self.base.select_state();
            self.batch_started = Some(Instant::now());
            self.instructions_this_batch = 0;
        }
        self.current
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        if let Some(c) = current {
            if removed.contains(&c) {
                self.current = None;
            }
        }
        self.base.update(current, added, removed);
    }

    fn empty(&self) -> bool {
        self.base.empty()
    }
}

/// Pauses states that overrun a time slice; doubles the slice and
/// un-pauses everyone once the base searcher runs dry, matching KLEE's
/// `IterativeDeepeningTimeSearcher`.
pub struct IterativeDeepeningTimeSearcher {
    base: Box<dyn Searcher>,
    slice: Duration,
    paused: Vec<StateId>,
    started_at: HashMap<StateId, Instant>,
}

impl IterativeDeepeningTimeSearcher {
    pub fn new(base: Box<dyn Searcher>, initial_slice: Duration) -> Self {
        Self { base, slice: initial_slice, paused: Vec::new(), started_at: HashMap::new() }
    }

    pub fn check_time_slice(&mut self, state: StateId) -> bool {
        let start = *self.started_at.entry(state).or_insert_with(Instant::now);
        if start.elapsed() >= self.slice {
            self.paused.push(state);
            self.started_at.remove(&state);
            false
        } else {
            true
        }
    }

    fn unpause_all(&mut self) {
        let paused = std::mem::take(&mut self.paused);
        self.slice *= 2;
        self.base.update(None, &paused, &[]);
    }
}

impl Searcher for IterativeDeepeningTimeSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        if self.base.empty() && !self.paused.is_empty() {
            self.unpause_all();
        }
        self.base.select_state()
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.base.update(current, added, removed);
        for r in removed {
            self.started_at.remove(r);
            self.paused.retain(|s| s != r);
        }
    }

    fn empty(&self) -> bool {
        self.base.empty() && self.paused.is_empty()
    }
}

/// A priority queue keyed by distance weight to a single target - lower is
/// better, matching the ordering `DistanceResult`'s `PartialOrd` defines.
/// States that reach the target move into `reached_on_last_update`, which
/// the bidirectional engine drains after each scheduler tick (§4.11,
/// "Targeted(target)").
pub struct TargetedSearcher {
    states: Vec<StateId>,
    reached_on_last_update: Vec<StateId>,
}

impl TargetedSearcher {
    pub fn new() -> Self {
        Self { states: Vec::new(), reached_on_last_update: Vec::new() }
    }

    pub fn select_by_weight(&self, weight_of: impl Fn(StateId) -> f64) -> Option<StateId> {
        self.states
            .iter()
            .copied()
            .min_by(|&a, &b| weight_of(a).partial_cmp(&weight_of(b)).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn mark_reached(&mut self, state: StateId) {
        if self.states.contains(&state) {
            self.reached_on_last_update.push(state);
        }
    }

    pub fn drain_reached(&mut self) -> Vec<StateId> {
        std::mem::take(&mut self.reached_on_last_update)
    }
}

impl Default for TargetedSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher for TargetedSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        self.states.first().copied()
    }

    fn update(&mut self, _current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.states.extend_from_slice(added);
        self.states.retain(|s| !removed.contains(s));
    }

    fn empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A key identifying one of `GuidedSearcher`'s live (history, target)
/// subsearchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuidedKey {
    pub history_len: usize,
    pub target_id: u32,
}

/// With uniform probability picks either the base searcher or one of the
/// currently live (history, target) `TargetedSearcher`s; states that make
/// no progress are paused rather than routed again, matching §4.11's
/// "Guided(base, reachability, pausedStates)".
pub struct GuidedSearcher {
    base: Box<dyn Searcher>,
    subsearchers: HashMap<GuidedKey, TargetedSearcher>,
    paused: HashSet<StateId>,
    rng: StdRng,
}

impl GuidedSearcher {
    pub fn new(base: Box<dyn Searcher>, seed: u64) -> Self {
        Self { base, subsearchers: HashMap::new(), paused: HashSet::new(), rng: StdRng::seed_from_u64(seed) }
    }

    pub fn route(&mut self, state: StateId, key: GuidedKey) {
        self.subsearchers.entry(key).or_insert_with(TargetedSearcher::new).update(None, &[state], &[]);
    }

    pub fn pause(&mut self, state: StateId) {
        self.paused.insert(state);
    }

    pub fn select_state_weighted(&mut self, weight_of: impl Fn(StateId) -> f64 + Copy) -> Option<StateId> {
        let live: Vec<&GuidedKey> = self.subsearchers.iter().filter(|(_, s)| !s.empty()).map(|(k, _)| k).collect();
        if live.is_empty() {
            return self.base.select_state();
        }
        if self.rng.gen_bool(0.5) {
            return self.base.select_state();
        }
        let key = *live[self.rng.gen_range(0..live.len())];
        self.subsearchers.get(&key).and_then(|s| s.select_by_weight(weight_of))
    }
}

impl Searcher for GuidedSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        self.select_state_weighted(|_| 1.0)
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.base.update(current, added, removed);
        for sub in self.subsearchers.values_mut() {
            sub.update(None, &[], removed);
        }
        for r in removed {
            self.paused.remove(r);
        }
    }

    fn empty(&self) -> bool {
        self.base.empty() && self.subsearchers.values().all(Searcher::empty)
    }
}

/// Round-robins `select_state` across a fixed list of searchers, matching
/// `InterleavedSearcher`; `update` is broadcast to every member.
pub struct InterleavedSearcher {
    members: Vec<Box<dyn Searcher>>,
    next: usize,
}

impl InterleavedSearcher {
    pub fn new(members: Vec<Box<dyn Searcher>>) -> Self {
        Self { members, next: 0 }
    }
}

impl Searcher for InterleavedSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        let n = self.members.len();
        for _ in 0..n {
            let idx = self.next;
            self.next = (self.next + 1) % n.max(1);
            if let Some(member) = self.members.get_mut(idx) {
                if let Some(state) = member.select_state() {
                    return Some(state);
                }
            }
        }
        None
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        for member in &mut self.members {
            member.update(current, added, removed);
        }
    }

    fn empty(&self) -> bool {
        self.members.iter().all(|m| m.empty())
    }
}

/// A group of states postponed until they all reach a common `close_merge`
/// point, at which point they are candidates for a single merged state -
/// matches `MergingSearcher`'s `mergeGroups`.
#[derive(Default)]
pub struct MergeGroup {
    pub close_merge: Option<crate::ir::BlockId>,
    pub members: Vec<StateId>,
}

pub struct MergingSearcher {
    base: Box<dyn Searcher>,
    groups: HashMap<u32, MergeGroup>,
    postponed: HashSet<StateId>,
}

impl MergingSearcher {
    pub fn new(base: Box<dyn Searcher>) -> Self {
        Self { base, groups: HashMap::new(), postponed: HashSet::new() }
    }

    pub fn postpone(&mut self, group: u32, state: StateId, close_merge: crate::ir::BlockId) {
        self.postponed.insert(state);
        let entry = self.groups.entry(group).or_default();
        entry.close_merge = Some(close_merge);
        entry.members.push(state);
    }

    /// Candidates for merging are any group whose members all sit at the
    /// same `close_merge` block - the caller (bidirectional engine or
    /// scheduler) decides whether to actually fold them into one state.
    pub fn mergeable_groups(&self) -> impl Iterator<Item = (&u32, &MergeGroup)> {
        self.groups.iter().filter(|(_, g)| g.members.len() > 1)
    }

    pub fn resolve_group(&mut self, group: u32) -> Vec<StateId> {
        let g = self.groups.remove(&group).unwrap_or_default();
        for s in &g.members {
            self.postponed.remove(s);
        }
        g.members
    }
}

impl Searcher for MergingSearcher {
    fn select_state(&mut self) -> Option<StateId> {
        loop {
            let candidate = self.base.select_state()?;
            if !self.postponed.contains(&candidate) {
                return Some(candidate);
            }
            // Postponed states stay out of rotation until resolved;
            // removing and re-adding avoids an infinite loop here.
            self.base.update(None, &[], &[candidate]);
        }
    }

    fn update(&mut self, current: Option<StateId>, added: &[StateId], removed: &[StateId]) {
        self.base.update(current, added, removed);
        for r in removed {
            self.postponed.remove(r);
            for g in self.groups.values_mut() {
                g.members.retain(|s| s != r);
            }
        }
    }

    fn empty(&self) -> bool {
        self.base.empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dfs_selects_most_recently_added() {
        let mut s = DfsSearcher::new();
        s.update(None, &[StateId(1), StateId(2)], &[]);
        assert_eq!(s.select_state(), Some(StateId(2)));
    }

    #[test]
    fn bfs_reappends_current_on_update() {
        let mut s = BfsSearcher::new();
        s.update(None, &[StateId(1), StateId(2)], &[]);
        assert_eq!(s.select_state(), Some(StateId(1)));
        s.update(Some(StateId(1)), &[], &[]);
        assert_eq!(s.select_state(), Some(StateId(2)), "current should have moved to the back");
    }

    #[test]
    fn removal_is_idempotent() {
        let mut s = DfsSearcher::new();
        s.update(None, &[StateId(1)], &[]);
        s.update(None, &[], &[StateId(1)]);
        s.update(None, &[], &[StateId(1)]);
        assert!(s.empty());
    }

    #[test]
    fn weighted_random_never_picks_a_zero_weight_state_when_another_has_mass() {
        let mut s = WeightedRandomSearcher::new(WeightType::Depth, 42);
        s.update(None, &[StateId(1), StateId(2)], &[]);
        for _ in 0..50 {
            let picked = s.select_state_weighted(|id| if id == StateId(1) { 0.0 } else { 1.0 });
            assert_eq!(picked, Some(StateId(2)));
        }
    }

    #[test]
    fn random_path_searcher_only_returns_owned_leaves() {
        let mut forest = ProcessForest::new();
        let root = forest.add_root(StateId(0));
        forest.fork(StateId(0), StateId(1), StateId(2));
        let [left, _right] = forest.children(root);
        forest.set_owned(root, 0);
        forest.set_owned(left.unwrap(), 0);

        let mut searcher = RandomPathSearcher::new(0, 7);
        for _ in 0..20 {
            assert_eq!(searcher.select_from(&forest), Some(StateId(1)));
        }
    }

    #[test]
    fn batching_searcher_sticks_to_one_state_until_instruction_budget_exhausted() {
        let mut s = BatchingSearcher::new(Box::new(DfsSearcher::new()), Duration::from_secs(100), 3);
        s.update(None, &[StateId(1), StateId(2)], &[]);
        let first = s.select_state();
        s.note_step(Duration::from_millis(1));
        let second = s.select_state();
        assert_eq!(first, second, "still within the instruction budget");
    }

    #[test]
    fn interleaved_round_robins_across_members() {
        let mut dfs1 = DfsSearcher::new();
        dfs1.update(None, &[StateId(1)], &[]);
        let mut dfs2 = DfsSearcher::new();
        dfs2.update(None, &[StateId(2)], &[]);
        let mut s = InterleavedSearcher::new(vec![Box::new(dfs1), Box::new(dfs2)]);
        assert_eq!(s.select_state(), Some(StateId(1)));
        assert_eq!(s.select_state(), Some(StateId(2)));
    }

    #[test]
    fn merging_searcher_skips_postponed_states() {
        let mut base = DfsSearcher::new();
        base.update(None, &[StateId(1), StateId(2)], &[]);
        let mut s = MergingSearcher::new(Box::new(base));
        s.postpone(0, StateId(2), crate::ir::BlockId(9));
        assert_eq!(s.select_state(), Some(StateId(1)));
    }
}
