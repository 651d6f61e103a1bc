use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;
use crate::types::{BlueprintRef, PlayerId, SquadId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Squad {
    pub squad_id: SquadId,
    /// Squad blueprint name
    pub blueprint: String,
    #[serde(default)]
    pub veterancy_rank: u8,
    #[serde(default)]
    pub veterancy_experience: f32,
    #[serde(default)]
    pub slot_items: Vec<BlueprintRef>,
}

impl Squad {
    pub fn new(squad_id: SquadId, blueprint: impl Into<String>) -> Self {
        Self {
            squad_id,
            blueprint: blueprint.into(),
            veterancy_rank: 0,
            veterancy_experience: 0.0,
            slot_items: Vec::new(),
        }
    }
}

/// A player's persistent roster of squads and captured equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    /// The player fielding this company. Match events are attributed through it.
    pub owner: PlayerId,
    #[serde(default)]
    pub squads: Vec<Squad>,
    /// Captured equipment, append only
    #[serde(default)]
    pub inventory: Vec<BlueprintRef>,
}

impl Company {
    pub fn new(name: impl Into<String>, owner: PlayerId) -> Self {
        Self {
            name: name.into(),
            owner,
            squads: Vec::new(),
            inventory: Vec::new(),
        }
    }

    pub fn squad_by_id(&self, id: SquadId) -> Option<&Squad> {
        self.squads.iter().find(|squad| squad.squad_id == id)
    }

    pub fn squad_by_id_mut(&mut self, id: SquadId) -> Option<&mut Squad> {
        self.squads.iter_mut().find(|squad| squad.squad_id == id)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
