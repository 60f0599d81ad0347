use serde::{Deserialize, Serialize};
use std::path::Path;

use kontrib_util::errors::{KontribError, KontribResult};

/// Default reserved namespace holding hint markers.
pub const DEFAULT_HINT_NAMESPACE: &str = "kontrib.hint";

/// Engine settings, usually read from the `[merge]` table of a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Abort index construction on the first malformed hint instead of dropping it.
    #[serde(default, rename = "fail-fast")]
    pub fail_fast: bool,

    #[serde(default = "default_hint_namespace", rename = "hint-namespace")]
    pub hint_namespace: String,

    /// Emit a note when a binding silently loses to a higher-ranked one.
    #[serde(default = "default_report_overrides", rename = "report-overrides")]
    pub report_overrides: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            hint_namespace: default_hint_namespace(),
            report_overrides: default_report_overrides(),
        }
    }
}

fn default_hint_namespace() -> String {
    DEFAULT_HINT_NAMESPACE.to_string()
}

fn default_report_overrides() -> bool {
    true
}

/// File layout: settings live under `[merge]`, other tables are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    merge: Option<EngineConfig>,
}

impl EngineConfig {
    /// Parse a TOML document; a missing `[merge]` table yields the defaults.
    pub fn from_toml_str(content: &str) -> KontribResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| KontribError::Config {
            message: format!("Failed to parse engine config: {e}"),
        })?;
        let config = file.merge.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from a file, or return defaults if it doesn't exist.
    pub fn from_path(path: &Path) -> KontribResult<Self> {
        if !path.is_file() {
            tracing::debug!("No engine config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> KontribResult<()> {
        let ns = self.hint_namespace.trim();
        if ns.is_empty() {
            return Err(KontribError::Config {
                message: "hint-namespace must not be empty".to_string(),
            });
        }
        if ns.contains('|') {
            return Err(KontribError::Config {
                message: format!("hint-namespace `{ns}` contains the reserved delimiter `|`"),
            });
        }
        Ok(())
    }
}
