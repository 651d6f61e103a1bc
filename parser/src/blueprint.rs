use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::types::{BlueprintKind, BlueprintRef};

/// Looks up blueprints by name. Passed explicitly to whatever needs blueprint data so that
/// no process-wide registry is involved.
pub trait BlueprintResolver {
    fn resolve(&self, name: &str, kind: BlueprintKind) -> Option<BlueprintRef>;
}

impl<F> BlueprintResolver for F
where
    F: Fn(&str, BlueprintKind) -> Option<BlueprintRef>,
{
    fn resolve(&self, name: &str, kind: BlueprintKind) -> Option<BlueprintRef> {
        self(name, kind)
    }
}

/// In-memory blueprint table, typically loaded from a JSON array of blueprints.
#[derive(Debug, Clone, Default)]
pub struct BlueprintDatabase {
    blueprints: HashMap<(BlueprintKind, String), BlueprintRef>,
}

impl BlueprintDatabase {
    pub fn new(blueprints: impl IntoIterator<Item = BlueprintRef>) -> Self {
        Self {
            blueprints: blueprints
                .into_iter()
                .map(|bp| ((bp.kind, bp.name.clone()), bp))
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let blueprints: Vec<BlueprintRef> = serde_json::from_str(json)?;
        Ok(Self::new(blueprints))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}

impl BlueprintResolver for BlueprintDatabase {
    fn resolve(&self, name: &str, kind: BlueprintKind) -> Option<BlueprintRef> {
        self.blueprints.get(&(kind, name.to_string())).cloned()
    }
}
