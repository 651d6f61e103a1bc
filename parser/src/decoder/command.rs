use tracing::{debug, trace};

use super::{DecodePolicy, DecodedEvents, Fields, collect, parse_flag};
use crate::chunky::{ChunkKind, ChunkTag, ChunkyContainer};
use crate::error::{Error, ErrorKind};
use crate::event::{EventKind, EventPayload, GameEvent, MatchPlayer};
use crate::types::{BlueprintKind, PlayerId, SquadId};

/// Folders with this name tag hold one encoded command per `DATA` leaf.
pub const EVENT_FOLDER_TAG: ChunkTag = ChunkTag(*b"GEVT");

/// Decodes every command stored under [`EVENT_FOLDER_TAG`] folders, in document order.
pub fn decode_container(
    container: &ChunkyContainer,
    policy: DecodePolicy,
) -> Result<DecodedEvents, Error> {
    let mut leaves = Vec::new();
    container.walk(&mut |node| {
        if node.tag() == EVENT_FOLDER_TAG && node.kind() == ChunkKind::Folder {
            node.walk(&mut |inner| {
                if let Some(payload) = inner.payload() {
                    leaves.push(payload);
                }
            });
        }
    });
    debug!("found {} encoded commands", leaves.len());

    collect(
        leaves.into_iter().map(|payload| decode_command(payload).map(Some)),
        policy,
    )
}

/// Decodes one command: `<identifier>,<event_id>,<seconds>,<player>,<fields...>`.
pub fn decode_command(payload: &[u8]) -> Result<GameEvent, Error> {
    let identifier = payload.first().map(|b| *b as char).unwrap_or('\0');
    let kind = EventKind::from_identifier(identifier)
        .ok_or(Error::new(ErrorKind::UnknownEventIdentifier(identifier)))?;

    let text = std::str::from_utf8(payload).map_err(|_| Error::unparsable(kind, "payload"))?;
    let text = text.trim_end_matches(['\0', '\r', '\n']);
    let body = text[1..]
        .strip_prefix(',')
        .ok_or_else(|| Error::unparsable(kind, "event_id"))?;

    let mut fields = Fields::new(kind, body);
    let event_id = fields.parse::<u32>("event_id")?;
    let timestamp = fields.seconds("timestamp")?;
    let player = fields.optional_player("player")?;
    // A match start describes the whole match, not one player.
    if kind == EventKind::MatchStart && player.is_some() {
        return Err(Error::unparsable(kind, "player"));
    }
    let payload = decode_payload(&mut fields)?;

    trace!("decoded {kind:?} #{event_id} at {timestamp:?}");
    Ok(GameEvent::new(event_id, player, timestamp, payload))
}

fn decode_payload(fields: &mut Fields<'_>) -> Result<EventPayload, Error> {
    let payload = match fields.kind() {
        EventKind::Deploy => EventPayload::Deploy {
            squad_id: SquadId(fields.parse("squad_id")?),
        },
        EventKind::Kill => EventPayload::Kill {
            squad_id: SquadId(fields.parse("squad_id")?),
        },
        EventKind::Retreat => {
            let squad_id = SquadId(fields.parse("squad_id")?);
            let vet_change: i64 = fields.parse("vet_change")?;
            EventPayload::Retreat {
                squad_id,
                vet_change: vet_change.clamp(0, u8::MAX as i64) as u8,
                vet_experience: fields.finite_f32("vet_experience")?,
            }
        }
        EventKind::Capture => EventPayload::Capture {
            capture_type: fields.parse("capture_type")?,
            blueprint_name: fields.next_str("blueprint_name")?.trim().to_string(),
            blueprint_kind: fields.parse::<BlueprintKind>("blueprint_kind")?,
        },
        EventKind::Pickup => EventPayload::Pickup {
            squad_id: SquadId(fields.parse("squad_id")?),
            item_blueprint_name: fields.next_str("item_blueprint_name")?.trim().to_string(),
        },
        EventKind::Surrender => EventPayload::Surrender,
        EventKind::Victory => EventPayload::Victory {
            victor_id: fields.parse("victor_id")?,
        },
        EventKind::Debug => EventPayload::Debug {
            message: fields.rest("message")?.to_string(),
        },
        EventKind::Verification => EventPayload::Verification {
            kind: fields.next_str("kind")?.trim().to_string(),
            argument: fields.rest("argument")?.to_string(),
        },
        EventKind::MatchStart => {
            let match_id = fields.next_str("match_id")?.trim().to_string();
            let mod_version = fields.next_str("mod_version")?.trim().to_string();
            let scenario = fields.next_str("scenario")?.trim().to_string();
            let players = fields
                .remaining()
                .into_iter()
                .map(decode_player)
                .collect::<Result<Vec<_>, _>>()?;
            EventPayload::MatchStart {
                match_id,
                mod_version,
                scenario,
                players,
            }
        }
    };
    Ok(payload)
}

/// `team:player_id:faction:ai:personality:name`. The name may itself contain colons.
fn decode_player(text: &str) -> Result<MatchPlayer, Error> {
    let bad = |field| Error::unparsable(EventKind::MatchStart, field);
    let mut parts = text.splitn(6, ':');
    let mut next = |field| parts.next().ok_or_else(|| bad(field));

    let team = next("team")?.trim().parse().map_err(|_| bad("team"))?;
    let player_id = next("player_id")?
        .trim()
        .parse()
        .map_err(|_| bad("player_id"))?;
    let faction = next("faction")?.to_string();
    let is_ai = parse_flag(next("ai")?).ok_or_else(|| bad("ai"))?;
    let personality = next("personality")?.to_string();
    let name = next("name")?.to_string();

    Ok(MatchPlayer {
        team,
        player_id: PlayerId(player_id),
        faction,
        name,
        is_ai,
        personality,
    })
}
