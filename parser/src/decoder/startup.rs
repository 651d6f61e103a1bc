use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, trace};

use super::{DecodePolicy, DecodedEvents, Fields, collect};
use crate::error::{Error, ErrorKind};
use crate::event::{EventKind, EventPayload, GameEvent, MatchPlayer};
use crate::telemetry::{FRAME_MARKER, RawFrame, scan_frames};
use crate::types::PlayerId;

/// Frame type of the message describing the match setup.
pub const STARTUP_FRAME_TYPE: i32 = 43;

/// Opaque bytes between the marker and the text of a frame.
const FRAME_PREFIX_LEN: usize = 10;

#[derive(Debug, Deserialize)]
struct StartupMessage {
    #[serde(default)]
    match_id: String,
    #[serde(default)]
    mod_version: String,
    scenario: String,
    /// team -> player id -> player
    #[serde(default)]
    teams: BTreeMap<String, BTreeMap<String, StartupPlayer>>,
}

#[derive(Debug, Deserialize)]
struct StartupPlayer {
    faction: String,
    name: String,
    #[serde(default)]
    ai: bool,
    #[serde(default)]
    personality: String,
}

impl StartupMessage {
    fn into_payload(self) -> Result<EventPayload, Error> {
        let bad = |field| Error::unparsable(EventKind::MatchStart, field);
        let mut players = Vec::new();
        for (team, members) in self.teams {
            let team: u8 = team.trim().parse().map_err(|_| bad("team"))?;
            for (player_id, player) in members {
                let player_id: u64 = player_id.trim().parse().map_err(|_| bad("player_id"))?;
                players.push(MatchPlayer {
                    team,
                    player_id: PlayerId(player_id),
                    faction: player.faction,
                    name: player.name,
                    is_ai: player.ai,
                    personality: player.personality,
                });
            }
        }
        Ok(EventPayload::MatchStart {
            match_id: self.match_id,
            mod_version: self.mod_version,
            scenario: self.scenario,
            players,
        })
    }
}

/// Decodes one scanned frame. Frame types other than [`STARTUP_FRAME_TYPE`] are not
/// understood yet and produce `Ok(None)`.
pub fn decode_frame(frame: &RawFrame, event_id: u32) -> Result<Option<GameEvent>, Error> {
    if frame.frame_type != STARTUP_FRAME_TYPE {
        debug!(
            "ignoring telemetry frame type {} at offset {}",
            frame.frame_type, frame.offset
        );
        return Ok(None);
    }

    let kind = EventKind::MatchStart;
    let body = frame
        .payload
        .get(FRAME_MARKER.len() + FRAME_PREFIX_LEN..)
        .ok_or(Error::new(ErrorKind::MalformedFrame {
            offset: frame.offset,
        }))?;
    let text = std::str::from_utf8(body).map_err(|_| Error::unparsable(kind, "payload"))?;

    let mut fields = Fields::new(kind, text);
    let _sender_id: u64 = fields.parse("sender_id")?;
    let timestamp = fields.seconds("timestamp")?;
    let _class_id: i64 = fields.parse("class_id")?;
    let encoded_type = fields.next_str("encoded_type")?;
    if encoded_type.chars().count() != 1 {
        return Err(Error::unparsable(kind, "encoded_type"));
    }
    let encoded_message = fields.rest("encoded_message")?;
    // The producer terminates every message with one sentinel character.
    let encoded_message = match encoded_message.char_indices().last() {
        Some((idx, _)) => &encoded_message[..idx],
        None => return Err(Error::unparsable(kind, "encoded_message")),
    };

    let message: StartupMessage = serde_json::from_str(encoded_message)
        .map_err(|_| Error::unparsable(kind, "encoded_message"))?;
    trace!("startup message for scenario {}", message.scenario);

    Ok(Some(GameEvent::new(
        event_id,
        None,
        timestamp,
        message.into_payload()?,
    )))
}

/// Scans a telemetry replay and decodes every recognized frame. Event ids are the frame
/// ordinals within the buffer.
pub fn decode_telemetry(buffer: &[u8], policy: DecodePolicy) -> Result<DecodedEvents, Error> {
    let frames = scan_frames(buffer);
    debug!("scanned {} telemetry frames", frames.len());
    collect(
        frames
            .iter()
            .enumerate()
            .map(|(ordinal, frame)| decode_frame(frame, ordinal as u32)),
        policy,
    )
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::telemetry::test_util::{buffer, frame};
    use std::time::Duration;

    fn startup_frame(text: &str) -> Vec<u8> {
        frame(STARTUP_FRAME_TYPE, &frame_body(text))
    }

    #[test]
    fn startup_frame_becomes_match_start() {
        let text = format!("1,12.5,3,J,{STARTUP_JSON}\0");
        let data = buffer(&[startup_frame(&text)]);

        let decoded = decode_telemetry(&data, DecodePolicy::Strict).unwrap();
        assert_eq!(decoded.events.len(), 1);
        let event = &decoded.events[0];
        assert_eq!(event.player, None);
        assert_eq!(event.timestamp, Duration::from_millis(12500));

        let EventPayload::MatchStart {
            match_id,
            scenario,
            players,
            ..
        } = &event.payload
        else {
            panic!("expected match start");
        };
        assert_eq!(match_id, "m-1");
        assert_eq!(scenario, "2p_langres");
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].player_id, PlayerId(100));
        assert_eq!(players[0].team, 0);
        assert_eq!(players[1].team, 1);
        assert!(players[1].is_ai);
        assert_eq!(players[1].personality, "expert");
    }

    #[test]
    fn other_frame_types_are_dropped() {
        let data = buffer(&[
            frame(16, &frame_body("1,2,3,X,whatever\0")),
            startup_frame(&format!("1,0,3,J,{STARTUP_JSON}\0")),
        ]);

        let decoded = decode_telemetry(&data, DecodePolicy::Strict).unwrap();
        assert_eq!(decoded.events.len(), 1);
        assert_eq!(decoded.events[0].event_id, 1);
        assert!(decoded.rejected.is_empty());
    }

    #[test]
    fn bad_startup_timestamp_is_an_error() {
        let data = buffer(&[startup_frame(&format!("1,soon,3,J,{STARTUP_JSON}\0"))]);

        let err = decode_telemetry(&data, DecodePolicy::Strict).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UnparsableField {
                kind: EventKind::MatchStart,
                field: "timestamp"
            }
        ));
    }

    #[test]
    fn non_numeric_player_key_is_an_error() {
        let json = r#"{"scenario":"s","teams":{"0":{"bob":{"faction":"british","name":"Bob"}}}}"#;
        let data = buffer(&[startup_frame(&format!("1,0,3,J,{json}\0"))]);

        let err = decode_telemetry(&data, DecodePolicy::Strict).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UnparsableField {
                field: "player_id",
                ..
            }
        ));
    }

    #[test]
    fn frame_too_short_for_prefix_is_malformed() {
        let data = buffer(&[frame(STARTUP_FRAME_TYPE, b"abc")]);

        let err = decode_telemetry(&data, DecodePolicy::Strict).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedFrame { .. }));
    }
}
