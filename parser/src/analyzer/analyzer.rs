use crate::event::GameEvent;
use crate::stream::EventStream;

pub trait Analyzer {
    fn process(&mut self, event: &GameEvent);
    fn finish(&mut self);
}

/// Feeds every event of `stream` to `analyzer` in order, then finishes it.
pub fn run(stream: &EventStream, analyzer: &mut dyn Analyzer) {
    for event in stream {
        analyzer.process(event);
    }
    analyzer.finish();
}
