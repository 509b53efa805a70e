//! [`Journal`] – bounded in-memory log of [`MotionEvent`]s.
//!
//! The motion core has no return path to an operator besides its `Result`s;
//! the journal is where a command layer reads back what happened during a
//! move (limit trips, hand-off grip changes, completions, faults).

use std::collections::VecDeque;

use cathrig_types::{EventPayload, MotionEvent};

/// Ring buffer of motion events; the oldest entry is dropped when full.
#[derive(Debug, Clone)]
pub struct Journal {
    source: String,
    capacity: usize,
    events: VecDeque<MotionEvent>,
}

impl Journal {
    pub fn new(source: impl Into<String>, capacity: usize) -> Self {
        Self {
            source: source.into(),
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn record(&mut self, payload: EventPayload) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events
            .push_back(MotionEvent::new(self.source.clone(), payload));
    }

    pub fn events(&self) -> impl Iterator<Item = &MotionEvent> {
        self.events.iter()
    }

    /// Remove and return every recorded event, oldest first.
    pub fn drain(&mut self) -> Vec<MotionEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathrig_types::{Device, GripState};

    fn grip(device: Device) -> EventPayload {
        EventPayload::Grip {
            device,
            state: GripState::Released,
        }
    }

    #[test]
    fn record_stamps_source() {
        let mut journal = Journal::new("test", 4);
        journal.record(grip(Device::Catheter));
        let event = journal.events().next().unwrap();
        assert_eq!(event.source, "test");
        assert_eq!(event.payload, grip(Device::Catheter));
    }

    #[test]
    fn oldest_event_dropped_at_capacity() {
        let mut journal = Journal::new("test", 2);
        journal.record(grip(Device::Catheter));
        journal.record(grip(Device::Guidewire));
        journal.record(grip(Device::Catheter));
        assert_eq!(journal.len(), 2);
        let payloads: Vec<_> = journal.events().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec![grip(Device::Guidewire), grip(Device::Catheter)]);
    }

    #[test]
    fn drain_empties_journal() {
        let mut journal = Journal::new("test", 8);
        journal.record(grip(Device::Catheter));
        assert_eq!(journal.drain().len(), 1);
        assert!(journal.is_empty());
    }
}
