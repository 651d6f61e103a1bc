use std::io::Write;

use tracing::error;

use crate::analyzer::Analyzer;
use crate::event::GameEvent;

pub struct EventDumpBuilder {
    output: Option<Box<dyn Write>>,
}

impl Default for EventDumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDumpBuilder {
    pub fn new() -> Self {
        Self { output: None }
    }

    /// Writes to `output` instead of stdout.
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn build(self) -> EventDump {
        EventDump {
            output: self
                .output
                .unwrap_or_else(|| Box::new(std::io::stdout())),
            failed: false,
        }
    }
}

/// Prints every event as one line of JSON.
pub struct EventDump {
    output: Box<dyn Write>,
    failed: bool,
}

impl EventDump {
    fn write_event(&mut self, event: &GameEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.output, event)?;
        writeln!(self.output)
    }
}

impl Analyzer for EventDump {
    fn finish(&mut self) {
        if let Err(err) = self.output.flush() {
            error!("failed to flush event dump: {err}");
        }
    }

    fn process(&mut self, event: &GameEvent) {
        if self.failed {
            return;
        }
        if let Err(err) = self.write_event(event) {
            error!("failed to write event {}: {err}", event.event_id);
            self.failed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::run;
    use crate::event::EventPayload;
    use crate::stream::assemble;
    use crate::types::{PlayerId, SquadId};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn one_json_line_per_event() {
        let buf = SharedBuf::default();
        let mut dump = EventDumpBuilder::new()
            .with_output(Box::new(buf.clone()))
            .build();

        let stream = assemble(vec![
            GameEvent::new(
                1,
                Some(PlayerId(100)),
                Duration::from_secs(2),
                EventPayload::Kill { squad_id: SquadId(4) },
            ),
            GameEvent::new(
                0,
                Some(PlayerId(100)),
                Duration::from_secs(1),
                EventPayload::Deploy { squad_id: SquadId(4) },
            ),
        ]);
        run(&stream, &mut dump);

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["payload"]["type"], "Deploy");
        assert_eq!(lines[1]["payload"]["type"], "Kill");
        assert_eq!(lines[1]["payload"]["squad_id"], 4);
    }
}
