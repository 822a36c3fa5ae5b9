//! Distance and reachability classification (C10): how close a state's
//! current block is to a target block, computed over the call graph and
//! memoized per `(block, kind, reversed)` so repeated queries from a
//! searcher's hot loop don't re-walk the CFG.
//!
//! Grounded on KLEE's `DistanceCalculator`/`DistanceResult`/`WeightResult`
//! (`lib/Core/DistanceCalculator.cpp`, `.h`).

use crate::ir::{BlockId, FunctionId, Module};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Coarse classification of how a target relates to the state's current
/// call stack: `Local` if the target is reachable without leaving the
/// current function, `Pre` if it is reachable only by first returning to
/// a caller, `Post` if only by descending into a callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeightResult {
    Local,
    Pre,
    Post,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceResult {
    pub result: WeightResult,
    /// Edge count to the target along the cheapest discovered path; `NaN`
    /// is never produced (unreachable is `WeightResult::None`, weight 0).
    pub weight: f64,
    pub inside_function: bool,
}

impl DistanceResult {
    pub fn unreachable() -> Self {
        Self { result: WeightResult::None, weight: 0.0, inside_function: false }
    }
}

/// Matches `DistanceResult::operator<` in `DistanceCalculator.cpp`: states
/// whose distance result is "inside the current function" always sort
/// before ones that aren't, then ties break on the raw weight (smaller
/// is closer), then on the `WeightResult` enum order itself.
impl PartialOrd for DistanceResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        if self.inside_function != other.inside_function {
            return Some(if self.inside_function { Ordering::Less } else { Ordering::Greater });
        }
        match self.weight.partial_cmp(&other.weight) {
            Some(Ordering::Equal) | None => Some(self.result.cmp(&other.result)),
            ord => ord,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    block: BlockId,
    kind: FunctionId,
    reversed: bool,
}

#[derive(Default)]
pub struct DistanceCalculator {
    cache: RefCell<HashMap<(FunctionId, CacheKey), DistanceResult>>,
}

impl DistanceCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Distance from `from` to `target`, within `module`. `reversed` walks
    /// predecessor edges instead of successor edges - used when a searcher
    /// wants "distance from the target back to me" for a backward pass.
    pub fn distance(
        &self,
        module: &dyn Module,
        from: BlockId,
        target: BlockId,
        reversed: bool,
    ) -> DistanceResult {
        let target_function = module.block(target).function();
        let key = CacheKey { block: from, kind: target_function, reversed };
        if let Some(&cached) = self.cache.borrow().get(&(target_function, key)) {
            return cached;
        }
        let result = self.compute(module, from, target, reversed);
        self.cache.borrow_mut().insert((target_function, key), result);
        result
    }

    fn compute(&self, module: &dyn Module, from: BlockId, target: BlockId, reversed: bool) -> DistanceResult {
        let from_function = module.block(from).function();
        let target_function = module.block(target).function();

        if from_function == target_function {
            if let Some(weight) = bfs_distance(module, from, target, reversed) {
                return DistanceResult { result: WeightResult::Local, weight, inside_function: true };
            }
        }

        // Not locally reachable: check whether a caller of `from_function`
        // can reach `target_function` (Pre - must return first) or whether
        // `from_function` calls into `target_function` somewhere downstream
        // (Post - must descend first).
        if module.callers_of(from_function).iter().any(|&caller| {
            module
                .function(caller)
                .blocks()
                .iter()
                .any(|&b| bfs_distance(module, b, target, reversed).is_some() || module.block(b).function() == target_function)
        }) {
            return DistanceResult { result: WeightResult::Pre, weight: f64::INFINITY, inside_function: false };
        }

        if module.callers_of(target_function).contains(&from_function) {
            return DistanceResult { result: WeightResult::Post, weight: f64::INFINITY, inside_function: false };
        }

        DistanceResult::unreachable()
    }
}

/// Plain BFS edge count between two blocks in the same function, `None` if
/// unreachable.
fn bfs_distance(module: &dyn Module, from: BlockId, target: BlockId, reversed: bool) -> Option<f64> {
    if from == target {
        return Some(0.0);
    }
    let mut visited = std::collections::HashSet::new();
    visited.insert(from);
    let mut queue = VecDeque::new();
    queue.push_back((from, 0u32));
    while let Some((block, dist)) = queue.pop_front() {
        let neighbors = if reversed {
            module.block(block).predecessors()
        } else {
            module.block(block).successors()
        };
        for &n in neighbors {
            if n == target {
                return Some((dist + 1) as f64);
            }
            if visited.insert(n) {
                queue.push_back((n, dist + 1));
            }
        }
    }
    None
}
