use std::collections::HashMap;

use crate::event::{EventPayload, GameEvent};
use crate::types::PlayerId;

use super::analyzer::Analyzer;

pub struct DebugLoggerBuilder;

impl Default for DebugLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugLoggerBuilder {
    pub fn new() -> DebugLoggerBuilder {
        DebugLoggerBuilder
    }

    pub fn build(self) -> DebugLogger {
        DebugLogger {
            usernames: HashMap::new(),
            lines: Vec::new(),
            echo: true,
        }
    }
}

/// Prints debug and verification messages, attributed to player names once a match
/// start has announced them.
pub struct DebugLogger {
    usernames: HashMap<PlayerId, String>,
    lines: Vec<String>,
    echo: bool,
}

impl DebugLogger {
    /// Keeps lines in memory only.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn username(&self, player: Option<PlayerId>) -> &str {
        match player {
            Some(player) => self
                .usernames
                .get(&player)
                .map(String::as_str)
                .unwrap_or("<UNKNOWN_USERNAME>"),
            None => "<MATCH>",
        }
    }

    fn emit(&mut self, line: String) {
        if self.echo {
            println!("{line}");
        }
        self.lines.push(line);
    }
}

impl Analyzer for DebugLogger {
    fn finish(&mut self) {}

    fn process(&mut self, event: &GameEvent) {
        let clock = event.timestamp.as_secs_f64();
        match &event.payload {
            EventPayload::Debug { message } => {
                let line = format!("{clock:.3}: {}: {message}", self.username(event.player));
                self.emit(line);
            }
            EventPayload::Verification { kind, argument } => {
                let line = format!(
                    "{clock:.3}: {}: verification {kind} {argument}",
                    self.username(event.player)
                );
                self.emit(line);
            }
            EventPayload::MatchStart { players, .. } => {
                for player in players.iter() {
                    self.usernames.insert(player.player_id, player.name.clone());
                }
            }
            _ => {}
        }
    }
}
