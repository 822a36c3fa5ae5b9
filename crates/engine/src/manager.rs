//! The Object Manager (C13): a single-threaded event bus coordinating
//! state, propagation, proof-obligation, and targeted-conflict updates
//! between the scheduler, the searchers, the process forest, and the
//! bidirectional engine.
//!
//! Publish order is fixed (§4.13): state transitions land first (so every
//! subscriber already knows about a new state before hearing about a
//! propagation that references it), then propagations, then proof
//! obligation births/deaths, then targeted conflicts. Ownership transitions
//! - a removed state's destruction - happen only after every subscriber has
//! seen the `States` event, matching "removed states are destroyed after
//! all subscribers have seen the event."
//!
//! Grounded on the teacher's scheduler.rs registry pattern (`StrandRegistry`
//! / `ACTIVE_STRANDS`): a single owner drives a fixed notify-then-mutate
//! sequence without locking, because only the scheduler thread ever calls
//! in (§5, "single-threaded cooperative").

use crate::forest::StateId;
use crate::pob::{PobId, Propagation, TargetedConflict};

/// One batch of state-set changes the scheduler reports after stepping.
/// `current` is the state just stepped (may have also forked, hence
/// appearing in neither `added` nor `removed`); `isolated` lists the
/// subset of `added` that are bidirectional-engine states rather than
/// ordinary forward exploration.
#[derive(Debug, Clone, Default)]
pub struct StatesEvent {
    pub current: Option<StateId>,
    pub added: Vec<StateId>,
    pub removed: Vec<StateId>,
    pub isolated: Vec<StateId>,
}

#[derive(Debug, Clone, Default)]
pub struct PropagationsEvent {
    pub added: Vec<Propagation>,
    pub removed: Vec<Propagation>,
}

#[derive(Debug, Clone, Default)]
pub struct ProofObligationsEvent {
    pub added: Vec<PobId>,
    pub removed: Vec<PobId>,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictsEvent {
    pub added: Vec<TargetedConflict>,
}

/// Every kind of update the manager publishes, in the fixed order of
/// §4.13.
#[derive(Debug, Clone)]
pub enum Event {
    States(StatesEvent),
    Propagations(PropagationsEvent),
    ProofObligations(ProofObligationsEvent),
    Conflicts(ConflictsEvent),
}

/// Anything that wants to observe the engine's event stream: searchers,
/// the bidirectional coordinator, the process forest, statistics
/// collectors.
pub trait Subscriber {
    fn notify(&mut self, event: &Event);
}

/// Coordinates one "publish a batch of changes" cycle: states first,
/// then propagations, then pob births/deaths, then conflicts, with every
/// subscriber seeing each event before the next is published. Returns the
/// states a caller may now actually destroy - it defers destruction
/// until every subscriber has had a chance to react to the `States` event
/// carrying them, per the ownership-transition guarantee.
#[derive(Default)]
pub struct ObjectManager {
    subscribers: Vec<Box<dyn Subscriber>>,
    /// Lifetime counters, kept as plain fields rather than atomics - there
    /// is exactly one thread driving this struct.
    states_published: u64,
    propagations_published: u64,
    pobs_published: u64,
    conflicts_published: u64,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    fn publish(&mut self, event: Event) {
        tracing::trace!(subscribers = self.subscribers.len(), ?event, "publishing event");
        for subscriber in &mut self.subscribers {
            subscriber.notify(&event);
        }
    }

    /// Publishes a `States` event, then returns `removed` unchanged so the
    /// caller can drop/deallocate those states now that every subscriber
    /// has observed the event - this is the "destroyed after all
    /// subscribers have seen the event" ordering guarantee, expressed as a
    /// handoff rather than the manager owning state storage itself.
    pub fn publish_states(&mut self, event: StatesEvent) -> Vec<StateId> {
        let removed = event.removed.clone();
        self.states_published += 1;
        self.publish(Event::States(event));
        removed
    }

    pub fn publish_propagations(&mut self, event: PropagationsEvent) {
        self.propagations_published += 1;
        self.publish(Event::Propagations(event));
    }

    pub fn publish_proof_obligations(&mut self, event: ProofObligationsEvent) {
        self.pobs_published += 1;
        self.publish(Event::ProofObligations(event));
    }

    pub fn publish_conflicts(&mut self, event: ConflictsEvent) {
        self.conflicts_published += 1;
        self.publish(Event::Conflicts(event));
    }

    /// Runs one full cycle in the fixed §4.13 order for a single
    /// scheduler step's worth of changes. Any of the four event payloads
    /// may be empty; publishing an empty event is still observed by every
    /// subscriber (a searcher's `update` must be idempotent to that,
    /// per §4.11).
    pub fn publish_cycle(
        &mut self,
        states: StatesEvent,
        propagations: PropagationsEvent,
        pobs: ProofObligationsEvent,
        conflicts: ConflictsEvent,
    ) -> Vec<StateId> {
        let removed = self.publish_states(states);
        self.publish_propagations(propagations);
        self.publish_proof_obligations(pobs);
        self.publish_conflicts(conflicts);
        removed
    }

    pub fn states_published(&self) -> u64 {
        self.states_published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingSubscriber {
        order: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Subscriber for RecordingSubscriber {
        fn notify(&mut self, event: &Event) {
            let tag = match event {
                Event::States(_) => "states",
                Event::Propagations(_) => "propagations",
                Event::ProofObligations(_) => "pobs",
                Event::Conflicts(_) => "conflicts",
            };
            self.order.borrow_mut().push(tag);
        }
    }

    #[test]
    fn publish_cycle_notifies_in_the_fixed_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ObjectManager::new();
        manager.subscribe(Box::new(RecordingSubscriber { order: order.clone() }));

        manager.publish_cycle(
            StatesEvent::default(),
            PropagationsEvent::default(),
            ProofObligationsEvent::default(),
            ConflictsEvent::default(),
        );

        assert_eq!(*order.borrow(), vec!["states", "propagations", "pobs", "conflicts"]);
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let order_a = Rc::new(RefCell::new(Vec::new()));
        let order_b = Rc::new(RefCell::new(Vec::new()));
        let mut manager = ObjectManager::new();
        manager.subscribe(Box::new(RecordingSubscriber { order: order_a.clone() }));
        manager.subscribe(Box::new(RecordingSubscriber { order: order_b.clone() }));

        manager.publish_cycle(
            StatesEvent { current: Some(StateId(0)), added: vec![StateId(1)], removed: vec![], isolated: vec![] },
            PropagationsEvent::default(),
            ProofObligationsEvent::default(),
            ConflictsEvent::default(),
        );

        assert_eq!(order_a.borrow().len(), 4);
        assert_eq!(order_b.borrow().len(), 4);
    }

    #[test]
    fn publish_states_hands_back_removed_for_deferred_destruction() {
        let mut manager = ObjectManager::new();
        let removed = manager.publish_states(StatesEvent {
            current: None,
            added: vec![],
            removed: vec![StateId(5), StateId(6)],
            isolated: vec![],
        });
        assert_eq!(removed, vec![StateId(5), StateId(6)]);
    }

    #[test]
    fn lifetime_counters_increment_once_per_cycle() {
        let mut manager = ObjectManager::new();
        manager.publish_cycle(
            StatesEvent::default(),
            PropagationsEvent::default(),
            ProofObligationsEvent::default(),
            ConflictsEvent::default(),
        );
        assert_eq!(manager.states_published(), 1);
    }
}
