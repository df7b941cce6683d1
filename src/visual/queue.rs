//! The only state shared between the analysis producer and the render consumer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::event::VisualEvent;

pub const DEFAULT_CAPACITY: usize = 128;

/// Bounded FIFO of visual events. Pushing onto a full queue evicts the oldest
/// event; age-based eviction happens on the consumer side.
pub struct VisualQueue {
    events: Mutex<VecDeque<VisualEvent>>,
    capacity: usize,
}

impl VisualQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Enqueue with the timestamp cleared; the consumer stamps it on first drain.
    pub fn push(&self, event: VisualEvent) {
        let event = VisualEvent {
            timestamp: None,
            ..event
        };
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Stamp unseen events with `now`, drop those at least `lifetime` old and
    /// return a copy of the survivors.
    pub fn drain_non_expired(&self, now: f64, lifetime: f64) -> Vec<VisualEvent> {
        let mut events = self.events.lock();
        for event in events.iter_mut() {
            if event.timestamp.is_none() {
                event.timestamp = Some(now);
            }
        }
        events.retain(|e| e.age(now) < lifetime);
        events.iter().copied().collect()
    }
}

impl Default for VisualQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Process-wide run signal. Starts true and is cleared at most once.
#[derive(Debug)]
pub struct RunningFlag(AtomicBool);

impl RunningFlag {
    pub fn new() -> Self {
        Self(AtomicBool::new(true))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true for the call that performed the transition.
    pub fn stop(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed by reference to every producer and consumer.
#[derive(Default)]
pub struct SharedState {
    pub queue: VisualQueue,
    pub running: RunningFlag,
}

impl SharedState {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VisualQueue::new(capacity),
            running: RunningFlag::new(),
        }
    }
}
