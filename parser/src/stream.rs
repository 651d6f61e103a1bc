use serde::Serialize;
use std::time::Duration;

use crate::decoder::DecodedEvents;
use crate::event::GameEvent;

/// An immutable, time ordered sequence of events that can be replayed any number of times.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventStream {
    events: Vec<GameEvent>,
    /// Events dropped upstream by a lenient decoder
    rejected: usize,
}

/// Sorts events by `(timestamp, event_id)`. The sort is stable and nothing is
/// deduplicated: identical events are meaningful.
pub fn assemble(mut events: Vec<GameEvent>) -> EventStream {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    EventStream {
        events,
        rejected: 0,
    }
}

impl EventStream {
    /// Merges the output of several source decoders into one stream.
    pub fn from_sources(sources: impl IntoIterator<Item = DecodedEvents>) -> Self {
        let mut events = Vec::new();
        let mut rejected = 0;
        for source in sources {
            events.extend(source.events);
            rejected += source.rejected.len();
        }
        assemble(events).with_rejected(rejected)
    }

    pub fn with_rejected(mut self, rejected: usize) -> Self {
        self.rejected = rejected;
        self
    }

    pub fn events(&self) -> &[GameEvent] {
        self.events.as_ref()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GameEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Events within `[start, end)`.
    pub fn events_in_range(&self, start: Duration, end: Duration) -> &[GameEvent] {
        let start_idx = self.events.partition_point(|e| e.timestamp < start);
        let end_idx = self.events.partition_point(|e| e.timestamp < end);
        &self.events[start_idx..end_idx.max(start_idx)]
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a GameEvent;
    type IntoIter = std::slice::Iter<'a, GameEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
