//! Target identity and `History` (components used by C8, C10, C11, C12).
//!
//! A `Target` names a place the bidirectional engine or a targeted searcher
//! wants a state to reach: a block, optionally tagged with the kind of
//! program error that must hold there (a safety check target) rather than
//! a plain reachability target. `History` is the guided searcher's key: an
//! interned, shared prefix-chain of targets already satisfied along a
//! state's path, so two states that took the same sequence of detours
//! share one `History` value and compare equal by `Rc` identity.

use crate::error::ProgramError;
use crate::ir::BlockId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The kind of program error a target is reached "with", or `None` for a
/// plain coverage/reachability target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReachWithError {
    None,
    Program(ProgramErrorTag),
}

/// A `ProgramError` without its payload, so targets can be keyed/hashed;
/// the payload (e.g. a user-reported message) only matters once the state
/// actually terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramErrorTag {
    OutOfBoundsPointer,
    MisalignedAccess,
    NullDereference,
    DivisionByZero,
    AssertionFailure,
    UncaughtException,
    UserReported,
}

impl From<&ProgramError> for ProgramErrorTag {
    fn from(e: &ProgramError) -> Self {
        match e {
            ProgramError::OutOfBoundsPointer => ProgramErrorTag::OutOfBoundsPointer,
            ProgramError::MisalignedAccess => ProgramErrorTag::MisalignedAccess,
            ProgramError::NullDereference => ProgramErrorTag::NullDereference,
            ProgramError::DivisionByZero => ProgramErrorTag::DivisionByZero,
            ProgramError::AssertionFailure => ProgramErrorTag::AssertionFailure,
            ProgramError::UncaughtException => ProgramErrorTag::UncaughtException,
            ProgramError::UserReported(_) => ProgramErrorTag::UserReported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub block: BlockId,
    pub error: ReachWithError,
    /// 0 for a plain reachability target; nonzero identifies a specific
    /// safety-check site when several checks share a block.
    pub id: u32,
}

impl Target {
    pub fn reachability(block: BlockId) -> Self {
        Self { block, error: ReachWithError::None, id: 0 }
    }

    pub fn safety_check(block: BlockId, error: ProgramErrorTag, id: u32) -> Self {
        Self { block, error: ReachWithError::Program(error), id }
    }

    pub fn should_fail_on_this_target(&self) -> bool {
        !matches!(self.error, ReachWithError::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HistoryNode {
    Root,
    Cons(Target, History),
}

/// A hash-consed, persistent chain of reached targets. `Rc` gives cheap
/// clones and `Rc::ptr_eq` fast-path comparisons; the thread-local intern
/// table below makes two chains built from the same sequence of targets
/// collapse to the same `Rc`, matching TargetForest::History's "equality
/// and hash are structural" invariant without re-walking the chain on
/// every comparison once it has been interned once.
pub type History = Rc<HistoryNode>;

thread_local! {
    static HISTORY_INTERN: RefCell<HashMap<HistoryNode, History>> = RefCell::new(HashMap::new());
}

fn intern_history(node: HistoryNode) -> History {
    HISTORY_INTERN.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(existing) = table.get(&node) {
            return existing.clone();
        }
        let rc = Rc::new(node.clone());
        table.insert(node, rc.clone());
        rc
    })
}

pub fn history_root() -> History {
    intern_history(HistoryNode::Root)
}

pub fn history_add(history: &History, target: Target) -> History {
    intern_history(HistoryNode::Cons(target, history.clone()))
}

pub fn history_last_target(history: &History) -> Option<Target> {
    match history.as_ref() {
        HistoryNode::Root => None,
        HistoryNode::Cons(t, _) => Some(*t),
    }
}

pub fn history_len(history: &History) -> usize {
    let mut n = 0;
    let mut cur = history.clone();
    loop {
        match cur.as_ref() {
            HistoryNode::Root => return n,
            HistoryNode::Cons(_, rest) => {
                n += 1;
                cur = rest.clone();
            }
        }
    }
}

/// Reset the process-wide history intern table; test isolation only.
pub fn reset_history_intern() {
    HISTORY_INTERN.with(|table| table.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> Target {
        Target::reachability(BlockId(n))
    }

    #[test]
    fn equal_sequences_intern_to_the_same_history() {
        reset_history_intern();
        let a = history_add(&history_add(&history_root(), t(1)), t(2));
        let b = history_add(&history_add(&history_root(), t(1)), t(2));
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_sequences_intern_to_different_histories() {
        reset_history_intern();
        let a = history_add(&history_root(), t(1));
        let b = history_add(&history_root(), t(2));
        assert!(!Rc::ptr_eq(&a, &b));
        assert_ne!(a, b);
    }

    #[test]
    fn shared_prefix_is_reused() {
        reset_history_intern();
        let prefix = history_add(&history_root(), t(1));
        let a = history_add(&prefix, t(2));
        let b = history_add(&prefix, t(3));
        match (a.as_ref(), b.as_ref()) {
            (HistoryNode::Cons(_, ra), HistoryNode::Cons(_, rb)) => assert!(Rc::ptr_eq(ra, rb)),
            _ => panic!("expected Cons nodes"),
        }
    }

    #[test]
    fn history_len_counts_targets() {
        reset_history_intern();
        let h = history_add(&history_add(&history_root(), t(1)), t(2));
        assert_eq!(history_len(&h), 2);
        assert_eq!(history_len(&history_root()), 0);
    }
}
