//! YAML script parser

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::types::Script;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse script: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid script: {0}")]
    Invalid(String),
}

/// Parser for load-test script files
pub struct ScriptParser;

impl ScriptParser {
    /// Parse a single script file
    pub fn parse_file(path: &Path) -> Result<Script, ScriptError> {
        info!("Parsing script file: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse_yaml(&content)
    }

    /// Parse YAML content into a script
    pub fn parse_yaml(content: &str) -> Result<Script, ScriptError> {
        let script: Script = serde_yaml::from_str(content)?;
        Self::validate(&script)?;
        Ok(script)
    }

    fn validate(script: &Script) -> Result<(), ScriptError> {
        if script.scenarios.is_empty() {
            return Err(ScriptError::Invalid(
                "script must define at least one scenario".to_string(),
            ));
        }

        for (i, scenario) in script.scenarios.iter().enumerate() {
            let name = scenario.display_name(i);
            if scenario.flow.is_empty() {
                return Err(ScriptError::Invalid(format!(
                    "scenario '{}' has an empty flow",
                    name
                )));
            }
            if scenario.weight == 0 {
                return Err(ScriptError::Invalid(format!(
                    "scenario '{}' has weight 0",
                    name
                )));
            }
            for (j, descriptor) in scenario.flow.iter().enumerate() {
                if !descriptor.is_object() {
                    return Err(ScriptError::Invalid(format!(
                        "step {} of scenario '{}' is not a mapping",
                        j + 1,
                        name
                    )));
                }
            }
        }

        for (i, phase) in script.config.phases.iter().enumerate() {
            if phase.duration == 0 {
                return Err(ScriptError::Invalid(format!(
                    "phase {} has zero duration",
                    i + 1
                )));
            }
        }

        Ok(())
    }
}
