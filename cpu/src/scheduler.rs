//! The discrete-event scheduler that device models use to deliver
//! task wakeups at simulated points in time.
//!
//! Virtual time advances by one fixed step per system clock; every
//! event whose timestamp has been reached fires during that clock,
//! inline and in timestamp order.  An event cancelled before its time
//! simply never fires, so there is nothing to race with.
use std::collections::HashMap;

use base::collections::pq::KeyedReversePriorityQueue;
use base::prelude::*;

/// One microinstruction cycle of simulated time, about 5.88 MHz.
pub const TIME_STEP_NSEC: u64 = 170;

/// What an event does when it fires.  The scheduler hands fired
/// events back to the system rather than calling into it, so the
/// actions form a closed set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventAction {
    WakeTask(TaskKind),
    BlockTask(TaskKind),
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EventId(u64);

/// An event whose timestamp has been reached.  `skew_nsec` is how far
/// past the requested time the firing clock landed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FiredEvent {
    pub time_nsec: u64,
    pub skew_nsec: u64,
    pub context: Word,
    pub action: EventAction,
}

struct PendingEvent {
    context: Word,
    action: EventAction,
}

pub struct Scheduler {
    current_time_nsec: u64,
    next_id: u64,
    queue: KeyedReversePriorityQueue<EventId, u64>,
    pending: HashMap<EventId, PendingEvent>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Scheduler {
        Scheduler {
            current_time_nsec: 0,
            next_id: 0,
            queue: KeyedReversePriorityQueue::new(),
            pending: HashMap::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Scheduler::new();
    }

    #[must_use]
    pub fn current_time_nsec(&self) -> u64 {
        self.current_time_nsec
    }

    /// Queue an event to fire `delay_nsec` of simulated time from
    /// now.
    pub fn schedule(&mut self, delay_nsec: u64, context: Word, action: EventAction) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.queue.push(id, self.current_time_nsec + delay_nsec);
        self.pending.insert(id, PendingEvent { context, action });
        id
    }

    /// Remove an event before it fires.  Cancelling an event that has
    /// already fired (or was never queued) does nothing.
    pub fn cancel(&mut self, id: EventId) {
        if self.queue.remove(&id).is_some() {
            self.pending.remove(&id);
        }
    }

    /// Advance virtual time one step and collect every due event, in
    /// timestamp order.
    pub fn clock(&mut self) -> Vec<FiredEvent> {
        self.current_time_nsec += TIME_STEP_NSEC;
        let mut fired = Vec::new();
        while let Some((_, timestamp)) = self.queue.peek() {
            if *timestamp > self.current_time_nsec {
                break;
            }
            let (id, timestamp) = self.queue.pop().expect("peek saw an entry");
            if let Some(event) = self.pending.remove(&id) {
                fired.push(FiredEvent {
                    time_nsec: self.current_time_nsec,
                    skew_nsec: self.current_time_nsec - timestamp,
                    context: event.context,
                    action: event.action,
                });
            }
        }
        fired
    }
}

impl Default for Scheduler {
    fn default() -> Scheduler {
        Scheduler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_timestamp_order_with_skew() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(200, 2, EventAction::WakeTask(TaskKind::DiskWord));
        scheduler.schedule(100, 1, EventAction::WakeTask(TaskKind::DiskSector));
        assert_eq!(scheduler.clock(), vec![FiredEvent {
            time_nsec: 170,
            skew_nsec: 70,
            context: 1,
            action: EventAction::WakeTask(TaskKind::DiskSector),
        }]);
        assert_eq!(scheduler.clock(), vec![FiredEvent {
            time_nsec: 340,
            skew_nsec: 140,
            context: 2,
            action: EventAction::WakeTask(TaskKind::DiskWord),
        }]);
        assert_eq!(scheduler.clock(), vec![]);
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(100, 0, EventAction::BlockTask(TaskKind::DisplayWord));
        scheduler.cancel(id);
        assert_eq!(scheduler.clock(), vec![]);
        // Cancelling again is harmless.
        scheduler.cancel(id);
    }

    #[test]
    fn due_time_is_relative_to_the_current_clock() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.clock().is_empty());
        assert_eq!(scheduler.current_time_nsec(), 170);
        scheduler.schedule(170, 0, EventAction::WakeTask(TaskKind::Ethernet));
        let fired = scheduler.clock();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].time_nsec, 340);
        assert_eq!(fired[0].skew_nsec, 0);
    }
}
