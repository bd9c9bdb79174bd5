use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{FastImportError, FastImportResult};
use crate::path_filter::{PathFilter, PathSpec};

/// Environment variable overriding `squash_empty_commits`
pub const SQUASH_ENV: &str = "FAST_IMPORT_FILTER_SQUASH";

/// What to keep from a stream and how to treat commits left empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Paths to keep; empty keeps everything not excluded
    #[serde(default)]
    pub include: Vec<PathSpec>,
    /// Paths to drop, winning over `include`
    #[serde(default)]
    pub exclude: Vec<PathSpec>,
    /// Omit commits left without changes and reattach their children
    #[serde(default = "defaults::squash_empty_commits")]
    pub squash_empty_commits: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            squash_empty_commits: defaults::squash_empty_commits(),
        }
    }
}

impl FilterConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> FastImportResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FastImportError::io(format!("reading config file {:?}", path), &e))?;
        tracing::debug!("loaded filter config from {:?}", path);
        serde_json::from_str(&content).map_err(|e| FastImportError::InvalidConfig {
            field: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from the environment, looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> FastImportResult<()> {
        if let Some(value) = lookup(SQUASH_ENV) {
            self.squash_empty_commits = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(FastImportError::InvalidConfig {
                        field: SQUASH_ENV.to_string(),
                        reason: format!("expected true or false, found '{}'", other),
                    })
                },
            };
        }
        Ok(())
    }

    /// Reject entries that can never match a stream path
    pub fn validate(&self) -> FastImportResult<()> {
        for (field, specs) in [("include", &self.include), ("exclude", &self.exclude)] {
            for spec in specs {
                if spec.path.starts_with('/') {
                    return Err(FastImportError::InvalidConfig {
                        field: field.to_string(),
                        reason: format!("path '{}' must be relative", spec.path),
                    });
                }
                if spec.path.split('/').any(|component| component == "..") {
                    return Err(FastImportError::InvalidConfig {
                        field: field.to_string(),
                        reason: format!("path '{}' must not contain '..'", spec.path),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn path_filter(&self) -> PathFilter {
        PathFilter::new(self.include.iter().cloned(), self.exclude.iter().cloned())
    }
}

mod defaults {
    pub(crate) fn squash_empty_commits() -> bool {
        true
    }
}
