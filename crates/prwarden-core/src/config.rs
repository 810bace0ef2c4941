//! Engine configuration.
//!
//! | variable | default |
//! |----------|---------|
//! | `PRWARDEN_RULES_PATH` | `.prwarden/rules.yml` |
//! | `PRWARDEN_RULES_BRANCH` | `main` |
//! | `PRWARDEN_ANCESTRY_DEPTH` | `1` |
//! | `PRWARDEN_CHECK_PREFIX` | `prwarden` |

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const DEFAULT_RULES_PATH: &str = ".prwarden/rules.yml";
pub const DEFAULT_RULES_BRANCH: &str = "main";
pub const DEFAULT_ANCESTRY_DEPTH: u32 = 1;
pub const DEFAULT_CHECK_PREFIX: &str = "prwarden";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path of the rule document inside the repository
    pub rules_path: String,
    /// Branch whose pushes refresh the rules
    pub rules_branch: String,
    /// Parent hops searched when computing `behind`
    pub ancestry_depth: u32,
    /// Prefix of the check name reported to the SCM
    pub check_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_path: DEFAULT_RULES_PATH.to_string(),
            rules_branch: DEFAULT_RULES_BRANCH.to_string(),
            ancestry_depth: DEFAULT_ANCESTRY_DEPTH,
            check_prefix: DEFAULT_CHECK_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_rules_path(mut self, path: impl Into<String>) -> Self {
        self.rules_path = path.into();
        self
    }

    pub fn with_rules_branch(mut self, branch: impl Into<String>) -> Self {
        self.rules_branch = branch.into();
        self
    }

    pub fn with_ancestry_depth(mut self, depth: u32) -> Self {
        self.ancestry_depth = depth;
        self
    }

    /// Load overrides from `PRWARDEN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup("PRWARDEN_RULES_PATH") {
            config.rules_path = path;
        }
        if let Some(branch) = lookup("PRWARDEN_RULES_BRANCH") {
            config.rules_branch = branch;
        }
        if let Some(depth) = lookup("PRWARDEN_ANCESTRY_DEPTH") {
            config.ancestry_depth = depth.parse().map_err(|_| {
                EngineError::Config(format!(
                    "PRWARDEN_ANCESTRY_DEPTH must be a non-negative integer, got '{}'",
                    depth
                ))
            })?;
        }
        if let Some(prefix) = lookup("PRWARDEN_CHECK_PREFIX") {
            config.check_prefix = prefix;
        }
        Ok(config)
    }

    /// Name of the external check for a rule's check key.
    pub fn check_name(&self, check_key: &str) -> String {
        if self.check_prefix.is_empty() {
            check_key.to_string()
        } else {
            format!("{}/{}", self.check_prefix, check_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.check_name("auto-merge"), "prwarden/auto-merge");
    }

    #[test]
    fn env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PRWARDEN_RULES_PATH", "ci/rules.yaml"),
            ("PRWARDEN_ANCESTRY_DEPTH", "5"),
            ("PRWARDEN_CHECK_PREFIX", ""),
        ]))
        .unwrap();
        assert_eq!(config.rules_path, "ci/rules.yaml");
        assert_eq!(config.ancestry_depth, 5);
        assert_eq!(config.check_name("x"), "x");
    }

    #[test]
    fn bad_depth_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("PRWARDEN_ANCESTRY_DEPTH", "deep")]))
            .unwrap_err();
        assert!(err.to_string().contains("PRWARDEN_ANCESTRY_DEPTH"));
    }
}
