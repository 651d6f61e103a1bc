//! Per-unit lifecycle reconstruction.
//!
//! Every squad goes through `Unseen -> Deployed -> {Dead, Withdrawn}`, and a withdrawn
//! squad may be deployed again. The analyzer folds the ordered event stream into one
//! [`UnitStatus`] per squad plus a few match-level facts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{Level, debug, span, trace, warn};

use super::analyzer::{Analyzer, run};
use crate::blueprint::BlueprintResolver;
use crate::event::{EventKind, EventPayload, GameEvent, MatchPlayer};
use crate::stream::EventStream;
use crate::types::{BlueprintKind, BlueprintRef, PlayerId, SquadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Unseen,
    Deployed,
    Dead,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStatus {
    pub squad_id: SquadId,
    /// Player of the first event that mentioned this squad
    pub owner: Option<PlayerId>,
    pub is_dead: bool,
    pub is_deployed: bool,
    pub is_withdrawn: bool,
    pub first_seen: Duration,
    pub last_seen: Duration,
    /// Veterancy ranks gained over all retreats
    pub vet_change: u8,
    /// Experience gained over all retreats
    pub vet_experience: f32,
    pub captured_slot_items: Vec<BlueprintRef>,
}

impl UnitStatus {
    pub fn new(squad_id: SquadId, owner: Option<PlayerId>, seen_at: Duration) -> Self {
        Self {
            squad_id,
            owner,
            is_dead: false,
            is_deployed: false,
            is_withdrawn: false,
            first_seen: seen_at,
            last_seen: seen_at,
            vet_change: 0,
            vet_experience: 0.0,
            captured_slot_items: Vec::new(),
        }
    }

    pub fn state(&self) -> UnitState {
        if self.is_dead {
            UnitState::Dead
        } else if self.is_withdrawn {
            UnitState::Withdrawn
        } else if self.is_deployed {
            UnitState::Deployed
        } else {
            UnitState::Unseen
        }
    }

    pub fn combat_time(&self) -> Duration {
        self.last_seen.saturating_sub(self.first_seen)
    }

    fn set_state(&mut self, state: UnitState) {
        self.is_deployed = state == UnitState::Deployed;
        self.is_dead = state == UnitState::Dead;
        self.is_withdrawn = state == UnitState::Withdrawn;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedEquipment {
    /// The player that made the capture
    pub side: Option<PlayerId>,
    pub blueprint: BlueprintRef,
    pub capture_type: i32,
    pub captured_at: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchInfo {
    pub match_id: String,
    pub mod_version: String,
    pub scenario: String,
    pub players: Vec<MatchPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub player: Option<PlayerId>,
    pub kind: String,
    pub argument: String,
}

/// Problems that did not stop the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Diagnostic {
    UnresolvedBlueprint {
        at: Duration,
        name: String,
        kind: BlueprintKind,
    },
    InvalidTransition {
        at: Duration,
        squad_id: SquadId,
        state: UnitState,
        event: EventKind,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchAnalysis {
    /// Latest timestamp seen
    pub duration: Duration,
    pub units: BTreeMap<SquadId, UnitStatus>,
    pub captured_equipment: Vec<CapturedEquipment>,
    pub is_valid: bool,
    pub match_info: Option<MatchInfo>,
    pub victor: Option<u64>,
    pub surrendered: Vec<PlayerId>,
    pub verifications: Vec<Verification>,
    /// Events dropped by a lenient decoder before analysis
    pub rejected_events: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl MatchAnalysis {
    pub fn unit(&self, squad_id: SquadId) -> Option<&UnitStatus> {
        self.units.get(&squad_id)
    }
}

pub struct LifecycleAnalyzer<'res, R: ?Sized> {
    resolver: &'res R,
    analysis: MatchAnalysis,
    events_seen: usize,
}

impl<'res, R> LifecycleAnalyzer<'res, R>
where
    R: BlueprintResolver + ?Sized,
{
    pub fn new(resolver: &'res R, rejected_events: usize) -> Self {
        Self {
            resolver,
            analysis: MatchAnalysis {
                rejected_events,
                ..Default::default()
            },
            events_seen: 0,
        }
    }

    pub fn analysis(&self) -> &MatchAnalysis {
        &self.analysis
    }

    pub fn into_analysis(self) -> MatchAnalysis {
        self.analysis
    }

    fn resolve(&mut self, at: Duration, name: &str, kind: BlueprintKind) -> Option<BlueprintRef> {
        let resolved = self.resolver.resolve(name, kind);
        if resolved.is_none() {
            warn!("could not resolve {kind} blueprint {name:?} at {at:?}");
            self.analysis.diagnostics.push(Diagnostic::UnresolvedBlueprint {
                at,
                name: name.to_string(),
                kind,
            });
        }
        resolved
    }

    fn handle_unit_event(&mut self, event: &GameEvent, squad_id: SquadId) {
        let at = event.timestamp;

        // Resolve before borrowing the unit mutably.
        let item = match &event.payload {
            EventPayload::Pickup {
                item_blueprint_name,
                ..
            } => self.resolve(at, item_blueprint_name, BlueprintKind::Ibp),
            _ => None,
        };

        let unit = self
            .analysis
            .units
            .entry(squad_id)
            .or_insert_with(|| UnitStatus::new(squad_id, event.player, at));
        unit.last_seen = unit.last_seen.max(at);
        let state = unit.state();

        let next = match (&event.payload, state) {
            (EventPayload::Deploy { .. }, UnitState::Unseen | UnitState::Withdrawn) => {
                Some(UnitState::Deployed)
            }
            (EventPayload::Deploy { .. }, UnitState::Deployed) => None,
            (EventPayload::Kill { .. }, UnitState::Unseen | UnitState::Deployed) => {
                Some(UnitState::Dead)
            }
            (
                EventPayload::Retreat {
                    vet_change,
                    vet_experience,
                    ..
                },
                UnitState::Unseen | UnitState::Deployed,
            ) => {
                unit.vet_change = unit.vet_change.saturating_add(*vet_change);
                unit.vet_experience += *vet_experience;
                Some(UnitState::Withdrawn)
            }
            (EventPayload::Pickup { .. }, _) => {
                unit.captured_slot_items.extend(item);
                None
            }
            (payload, state) => {
                debug!("squad {squad_id}: {:?} while {state:?}", payload.kind());
                self.analysis.diagnostics.push(Diagnostic::InvalidTransition {
                    at,
                    squad_id,
                    state,
                    event: payload.kind(),
                });
                None
            }
        };

        if let Some(next) = next {
            trace!("squad {squad_id}: {state:?} -> {next:?}");
            unit.set_state(next);
        }
    }

    fn handle_match_event(&mut self, event: &GameEvent) {
        let at = event.timestamp;
        match &event.payload {
            EventPayload::Capture {
                capture_type,
                blueprint_name,
                blueprint_kind,
            } => {
                if let Some(blueprint) = self.resolve(at, blueprint_name, *blueprint_kind) {
                    self.analysis.captured_equipment.push(CapturedEquipment {
                        side: event.player,
                        blueprint,
                        capture_type: *capture_type,
                        captured_at: at,
                    });
                }
            }
            EventPayload::Surrender => {
                if let Some(player) = event.player {
                    self.analysis.surrendered.push(player);
                }
            }
            EventPayload::Victory { victor_id } => self.analysis.victor = Some(*victor_id),
            EventPayload::Debug { message } => trace!("debug message at {at:?}: {message}"),
            EventPayload::Verification { kind, argument } => {
                self.analysis.verifications.push(Verification {
                    player: event.player,
                    kind: kind.clone(),
                    argument: argument.clone(),
                })
            }
            EventPayload::MatchStart {
                match_id,
                mod_version,
                scenario,
                players,
            } => {
                if self.analysis.match_info.is_some() {
                    debug!("replacing match info with later match start");
                }
                self.analysis.match_info = Some(MatchInfo {
                    match_id: match_id.clone(),
                    mod_version: mod_version.clone(),
                    scenario: scenario.clone(),
                    players: players.clone(),
                });
            }
            EventPayload::Deploy { .. }
            | EventPayload::Kill { .. }
            | EventPayload::Retreat { .. }
            | EventPayload::Pickup { .. } => {}
        }
    }

    /// Decides whether the analysis can be trusted: nothing was dropped upstream and at
    /// least one unit was seen, unless there was nothing to see at all.
    fn compile_results(&mut self) {
        let analysis = &mut self.analysis;
        analysis.is_valid = analysis.rejected_events == 0
            && (!analysis.units.is_empty() || self.events_seen == 0);
    }
}

impl<R> Analyzer for LifecycleAnalyzer<'_, R>
where
    R: BlueprintResolver + ?Sized,
{
    fn process(&mut self, event: &GameEvent) {
        let span = span!(Level::TRACE, "event processing", event_id = event.event_id);
        let _enter = span.enter();

        self.events_seen += 1;
        self.analysis.duration = self.analysis.duration.max(event.timestamp);

        match event.squad_id() {
            Some(squad_id) => self.handle_unit_event(event, squad_id),
            None => self.handle_match_event(event),
        }
    }

    fn finish(&mut self) {
        self.compile_results();
        debug!(
            "analyzed {} events: {} units, {} captures, {} diagnostics",
            self.events_seen,
            self.analysis.units.len(),
            self.analysis.captured_equipment.len(),
            self.analysis.diagnostics.len()
        );
    }
}

/// Runs one lifecycle pass over `stream`. The result depends only on the stream and the
/// resolver, so analyzing the same stream twice gives identical results.
pub fn analyze<R>(stream: &EventStream, resolver: &R) -> MatchAnalysis
where
    R: BlueprintResolver + ?Sized,
{
    let mut analyzer = LifecycleAnalyzer::new(resolver, stream.rejected());
    run(stream, &mut analyzer);
    analyzer.into_analysis()
}
