use kinded::Kinded;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{BlueprintKind, PlayerId, SquadId};

/// A player announced by the match startup message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub team: u8,
    pub player_id: PlayerId,
    pub faction: String,
    pub name: String,
    pub is_ai: bool,
    /// AI personality, empty for human players
    pub personality: String,
}

/// One discrete gameplay event recovered from a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEvent {
    /// Assigned by the source stream and monotonic within it. Not unique across sources.
    pub event_id: u32,
    /// The player that caused the event, if any
    pub player: Option<PlayerId>,
    /// Time since the match started
    pub timestamp: Duration,
    pub payload: EventPayload,
}

impl GameEvent {
    pub fn new(
        event_id: u32,
        player: Option<PlayerId>,
        timestamp: Duration,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id,
            player,
            timestamp,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// The squad this event is about. Match-level events have none.
    pub fn squad_id(&self) -> Option<SquadId> {
        match &self.payload {
            EventPayload::Deploy { squad_id }
            | EventPayload::Kill { squad_id }
            | EventPayload::Retreat { squad_id, .. }
            | EventPayload::Pickup { squad_id, .. } => Some(*squad_id),
            EventPayload::Capture { .. }
            | EventPayload::Surrender
            | EventPayload::Victory { .. }
            | EventPayload::Debug { .. }
            | EventPayload::Verification { .. }
            | EventPayload::MatchStart { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Kinded)]
#[kinded(kind = EventKind, derive(Hash, Serialize, Deserialize))]
#[serde(tag = "type")]
pub enum EventPayload {
    /// A squad was called in
    Deploy { squad_id: SquadId },
    /// A squad was wiped out
    Kill { squad_id: SquadId },
    /// A squad was withdrawn from the field, carrying the veterancy it earned
    Retreat {
        squad_id: SquadId,
        vet_change: u8,
        vet_experience: f32,
    },
    /// An enemy weapon or vehicle was captured
    Capture {
        capture_type: i32,
        blueprint_name: String,
        blueprint_kind: BlueprintKind,
    },
    /// A squad picked up a slot item
    Pickup {
        squad_id: SquadId,
        item_blueprint_name: String,
    },
    Surrender,
    Victory { victor_id: u64 },
    Debug { message: String },
    /// A check emitted by the game mode, e.g. that a company was loaded unmodified
    Verification { kind: String, argument: String },
    /// Describes the whole match, so it never carries a player reference
    MatchStart {
        match_id: String,
        mod_version: String,
        scenario: String,
        players: Vec<MatchPlayer>,
    },
}

impl EventKind {
    /// The single character that selects this kind in an encoded command.
    pub fn identifier(self) -> char {
        match self {
            EventKind::Deploy => 'D',
            EventKind::Kill => 'K',
            EventKind::Retreat => 'R',
            EventKind::Capture => 'C',
            EventKind::Pickup => 'I',
            EventKind::Surrender => 'S',
            EventKind::Victory => 'V',
            EventKind::Debug => 'X',
            EventKind::Verification => 'T',
            EventKind::MatchStart => 'G',
        }
    }

    pub fn from_identifier(identifier: char) -> Option<Self> {
        let kind = match identifier {
            'D' => EventKind::Deploy,
            'K' => EventKind::Kill,
            'R' => EventKind::Retreat,
            'C' => EventKind::Capture,
            'I' => EventKind::Pickup,
            'S' => EventKind::Surrender,
            'V' => EventKind::Victory,
            'X' => EventKind::Debug,
            'T' => EventKind::Verification,
            'G' => EventKind::MatchStart,
            _ => return None,
        };
        Some(kind)
    }
}
