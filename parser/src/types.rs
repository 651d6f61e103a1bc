use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// A player's persistent identity as reported by the game (steam or relic id).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(v: u64) -> Self {
        PlayerId(v)
    }
}

/// Company-local squad identifier. This is the key for per-unit lifecycle tracking.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SquadId(pub u32);

impl SquadId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SquadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SquadId {
    fn from(v: u32) -> Self {
        SquadId(v)
    }
}

/// The blueprint table a blueprint name lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum BlueprintKind {
    /// Entity blueprints (vehicles, emplacements, dropped weapons)
    Ebp,
    /// Squad blueprints
    Sbp,
    /// Upgrade blueprints
    Ubp,
    /// Ability blueprints
    Abp,
    /// Slot item blueprints
    Ibp,
    /// Weapon blueprints
    Wbp,
}

/// A resolved blueprint, as handed out by a [`crate::blueprint::BlueprintResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlueprintRef {
    pub kind: BlueprintKind,
    pub name: String,
    /// Property bag group id of the blueprint in the game database
    #[serde(default)]
    pub pbgid: u64,
}

impl BlueprintRef {
    pub fn new(kind: BlueprintKind, name: impl Into<String>, pbgid: u64) -> Self {
        Self {
            kind,
            name: name.into(),
            pbgid,
        }
    }
}

impl fmt::Display for BlueprintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Parses a decimal number of seconds into a match-relative timestamp.
/// Negative, non-finite or otherwise unparsable input yields `None`.
pub(crate) fn parse_seconds(text: &str) -> Option<Duration> {
    let secs: f64 = text.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
