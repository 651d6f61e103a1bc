//! Turns container leaves and telemetry frames into [`GameEvent`]s.

mod command;
mod startup;

pub use command::{EVENT_FOLDER_TAG, decode_command, decode_container};
pub use startup::{STARTUP_FRAME_TYPE, decode_frame, decode_telemetry};
#[cfg(test)]
pub(crate) use startup::test_util;

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, ErrorKind};
use crate::event::{EventKind, EventPayload, GameEvent};
use crate::types::{PlayerId, parse_seconds};

/// What to do with an event that cannot be decoded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Abort the whole decode on the first bad event
    #[default]
    Strict,
    /// Skip bad events and keep their errors in [`DecodedEvents::rejected`]
    Lenient,
}

/// Output of one source decoder, in source order.
#[derive(Debug, Default)]
pub struct DecodedEvents {
    pub events: Vec<GameEvent>,
    pub rejected: Vec<Error>,
}

/// Applies `policy` to a sequence of per-item decode results. `Ok(None)` items are
/// intentionally ignored input. Player references are checked against the players of the
/// most recent `MatchStart` seen so far.
pub(crate) fn collect<I>(results: I, policy: DecodePolicy) -> Result<DecodedEvents, Error>
where
    I: IntoIterator<Item = Result<Option<GameEvent>, Error>>,
{
    let mut decoded = DecodedEvents::default();
    let mut roster: Option<HashSet<PlayerId>> = None;

    for result in results {
        let checked = result.and_then(|event| match event {
            Some(event) => check_player(&event, roster.as_ref()).map(|_| Some(event)),
            None => Ok(None),
        });
        match checked {
            Ok(Some(event)) => {
                if let EventPayload::MatchStart { players, .. } = &event.payload {
                    roster = Some(players.iter().map(|p| p.player_id).collect());
                }
                decoded.events.push(event);
            }
            Ok(None) => {}
            Err(err) => match policy {
                DecodePolicy::Strict => return Err(err),
                DecodePolicy::Lenient => {
                    warn!("skipping undecodable event: {err}");
                    decoded.rejected.push(err);
                }
            },
        }
    }

    Ok(decoded)
}

fn check_player(event: &GameEvent, roster: Option<&HashSet<PlayerId>>) -> Result<(), Error> {
    match (event.player, roster) {
        (Some(player), Some(roster)) if !roster.contains(&player) => {
            Err(Error::new(ErrorKind::UnknownPlayer(player)))
        }
        _ => Ok(()),
    }
}

/// Positional reader over comma separated text fields.
pub(crate) struct Fields<'a> {
    kind: EventKind,
    rest: Option<&'a str>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(kind: EventKind, text: &'a str) -> Self {
        Self {
            kind,
            rest: Some(text),
        }
    }

    pub(crate) fn kind(&self) -> EventKind {
        self.kind
    }

    pub(crate) fn next_str(&mut self, field: &'static str) -> Result<&'a str, Error> {
        let text = self
            .rest
            .ok_or_else(|| Error::unparsable(self.kind, field))?;
        match text.split_once(',') {
            Some((value, rest)) => {
                self.rest = Some(rest);
                Ok(value)
            }
            None => {
                self.rest = None;
                Ok(text)
            }
        }
    }

    pub(crate) fn parse<T: FromStr>(&mut self, field: &'static str) -> Result<T, Error> {
        let kind = self.kind;
        self.next_str(field)?
            .trim()
            .parse()
            .map_err(|_| Error::unparsable(kind, field))
    }

    /// A float that is neither NaN nor infinite.
    pub(crate) fn finite_f32(&mut self, field: &'static str) -> Result<f32, Error> {
        let kind = self.kind;
        let value: f32 = self.parse(field)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::unparsable(kind, field))
        }
    }

    pub(crate) fn seconds(&mut self, field: &'static str) -> Result<Duration, Error> {
        let kind = self.kind;
        parse_seconds(self.next_str(field)?).ok_or_else(|| Error::unparsable(kind, field))
    }

    /// An empty field means no player.
    pub(crate) fn optional_player(&mut self, field: &'static str) -> Result<Option<PlayerId>, Error> {
        let kind = self.kind;
        let text = self.next_str(field)?.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse()
            .map(|id| Some(PlayerId(id)))
            .map_err(|_| Error::unparsable(kind, field))
    }

    /// Everything not yet consumed, commas included.
    pub(crate) fn rest(&mut self, field: &'static str) -> Result<&'a str, Error> {
        self.rest
            .take()
            .ok_or_else(|| Error::unparsable(self.kind, field))
    }

    /// Remaining fields, one per comma separated value.
    pub(crate) fn remaining(&mut self) -> Vec<&'a str> {
        self.rest
            .take()
            .into_iter()
            .flat_map(|rest| rest.split(','))
            .filter(|value| !value.is_empty())
            .collect()
    }
}

pub(crate) fn parse_flag(text: &str) -> Option<bool> {
    match text.trim() {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}
