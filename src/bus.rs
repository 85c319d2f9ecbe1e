//! Typed publish/subscribe for gameplay events.
//!
//! Delivery is a single-threaded FIFO work queue. Handlers never see the bus
//! itself; they get an [`Emitter`] whose events are appended to the back of the
//! queue, so emitting from inside a handler enqueues rather than recurses.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::model::{EventKind, GameEvent};

/// Handle returned by `subscribe`/`once`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Box<dyn FnMut(&GameEvent, &mut Emitter)>;

/// Sink for events raised by a handler during delivery.
#[derive(Debug, Default)]
pub struct Emitter {
    queued: Vec<GameEvent>,
}

impl Emitter {
    pub fn emit(&mut self, event: GameEvent) {
        self.queued.push(event);
    }
}

struct Subscriber {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    by_kind: BTreeMap<EventKind, Vec<Subscriber>>,
    wildcard: Vec<Subscriber>,
    queue: VecDeque<GameEvent>,
    next_id: u64,
    delivered: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("queued", &self.queue.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&GameEvent, &mut Emitter) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.by_kind.entry(kind).or_default().push(Subscriber {
            id,
            once: false,
            handler: Box::new(handler),
        });
        id
    }

    /// Subscribe for a single delivery; the subscription is removed after it fires.
    pub fn once(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&GameEvent, &mut Emitter) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.by_kind.entry(kind).or_default().push(Subscriber {
            id,
            once: true,
            handler: Box::new(handler),
        });
        id
    }

    /// Receive every event regardless of kind, after the kind-specific handlers.
    pub fn subscribe_all(
        &mut self,
        handler: impl FnMut(&GameEvent, &mut Emitter) + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.wildcard.push(Subscriber {
            id,
            once: false,
            handler: Box::new(handler),
        });
        id
    }

    /// Returns true if the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut found = false;
        for subs in self.by_kind.values_mut() {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            found |= subs.len() != before;
        }
        self.by_kind.retain(|_, subs| !subs.is_empty());
        let before = self.wildcard.len();
        self.wildcard.retain(|s| s.id != id);
        found || self.wildcard.len() != before
    }

    /// Queue `event` and deliver everything queued before returning.
    pub fn emit(&mut self, event: GameEvent) {
        tracing::trace!(kind = %event.kind(), "emit");
        self.queue.push_back(event);
        self.drain();
    }

    pub fn subscription_count(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.wildcard.len()
    }

    /// Total events delivered since creation.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn drain(&mut self) {
        while let Some(event) = self.queue.pop_front() {
            let mut emitter = Emitter::default();
            let kind = event.kind();

            if let Some(mut subs) = self.by_kind.remove(&kind) {
                deliver(&mut subs, &event, &mut emitter);
                if !subs.is_empty() {
                    self.by_kind.insert(kind, subs);
                }
            }
            let mut wildcard = std::mem::take(&mut self.wildcard);
            deliver(&mut wildcard, &event, &mut emitter);
            self.wildcard = wildcard;

            self.delivered += 1;
            self.queue.extend(emitter.queued);
        }
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

fn deliver(subs: &mut Vec<Subscriber>, event: &GameEvent, emitter: &mut Emitter) {
    subs.retain_mut(|s| {
        (s.handler)(event, emitter);
        !s.once
    });
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::{FormationType, MatchEndReason};

    fn formation(leader: u64) -> GameEvent {
        GameEvent::FormationChanged {
            leader,
            formation: FormationType::Line,
        }
    }

    #[test]
    fn subscribers_only_see_their_kind() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(EventKind::FormationChanged, move |ev, _| {
            sink.borrow_mut().push(ev.clone());
        });

        bus.emit(formation(1));
        bus.emit(GameEvent::MatchEnded {
            winner: 1,
            reason: MatchEndReason::CrownVictory,
            army_size: 0,
        });

        assert_eq!(*seen.borrow(), vec![formation(1)]);
        assert_eq!(bus.delivered(), 2);
    }

    #[test]
    fn once_fires_a_single_time() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        bus.once(EventKind::FormationChanged, move |_, _| *c.borrow_mut() += 1);
        bus.emit(formation(1));
        bus.emit(formation(2));
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = bus.subscribe_all(move |_, _| *c.borrow_mut() += 1);
        bus.emit(formation(1));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(formation(2));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn handler_emission_is_queued_fifo() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        // Leader 1 triggers a follow-up for leader 100.
        bus.subscribe(EventKind::FormationChanged, |ev, out| {
            if let GameEvent::FormationChanged { leader: 1, .. } = ev {
                out.emit(formation(100));
            }
        });
        let log = order.clone();
        bus.subscribe_all(move |ev, _| {
            if let GameEvent::FormationChanged { leader, .. } = ev {
                log.borrow_mut().push(*leader);
            }
        });

        bus.emit(formation(1));
        bus.emit(formation(2));

        assert_eq!(*order.borrow(), vec![1, 100, 2]);
    }

    #[test]
    fn deep_handler_chains_do_not_recurse() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0u64));
        let c = count.clone();
        bus.subscribe(EventKind::FormationChanged, move |ev, out| {
            *c.borrow_mut() += 1;
            if let GameEvent::FormationChanged { leader, .. } = ev
                && *leader < 50_000
            {
                out.emit(formation(leader + 1));
            }
        });
        bus.emit(formation(0));
        assert_eq!(*count.borrow(), 50_001);
    }
}
