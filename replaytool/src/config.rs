use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "replaytool.toml";

/// Tool configuration, loadable from a TOML file.
///
/// All fields default to their standard values. CLI flags override config file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Skip undecodable events instead of failing the whole replay
    pub lenient: bool,
    /// JSON blueprint database used to resolve captures and pickups
    pub blueprints: Option<PathBuf>,
    /// Used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            lenient: false,
            blueprints: None,
            log_filter: "info".to_string(),
        }
    }
}

impl ToolConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG_FILE`] if it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        r#"# Replay Tool Configuration
# Place this file as replaytool.toml in the working directory,
# or specify with --config <path>.

# Skip events that cannot be decoded instead of rejecting the replay.
# Analyses of replays with skipped events are marked invalid.
lenient = false

# JSON array of blueprints ({"kind": "EBP", "name": "...", "pbgid": 0})
# used to resolve captured equipment and picked up items.
# blueprints = "blueprints.json"

# Log filter used when RUST_LOG is not set
log_filter = "info"
"#
        .to_string()
    }

    /// Apply CLI flag overrides.
    pub fn apply_cli_overrides(&mut self, matches: &clap::ArgMatches) {
        if matches.is_present("LENIENT") {
            self.lenient = true;
        }
        if let Some(path) = matches.value_of("BLUEPRINTS") {
            self.blueprints = Some(PathBuf::from(path));
        }
    }
}
