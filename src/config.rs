//! Run configuration loaded from TOML
//!
//! ```toml
//! [synthetic]
//! prefix = "OW"
//! width = 4
//!
//! [[sources]]
//! name = "teams-2023"
//! path = "sightings/teams-2023.csv"
//! authoritative = true
//!
//! [roster]
//! path = "ledenlijst.csv"
//!
//! [merge]
//! directives = "merge-directives.toml"
//!
//! [output]
//! dir = "out"
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use crate::entities::DEFAULT_ORG_PREFIX;
use crate::error::{Error, Result};
use crate::registry::{SyntheticIds, DEFAULT_SYNTHETIC_PREFIX, DEFAULT_SYNTHETIC_WIDTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_width")]
    pub width: usize,
}

fn default_prefix() -> String {
    DEFAULT_SYNTHETIC_PREFIX.to_string()
}

fn default_width() -> usize {
    DEFAULT_SYNTHETIC_WIDTH
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            prefix: default_prefix(),
            width: default_width(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamsConfig {
    /// Organization prefix stripped from team codes ("OW S6" → "S6")
    #[serde(default = "default_org_prefix")]
    pub org_prefix: String,
}

fn default_org_prefix() -> String {
    DEFAULT_ORG_PREFIX.to_string()
}

impl Default for TeamsConfig {
    fn default() -> Self {
        TeamsConfig {
            org_prefix: default_org_prefix(),
        }
    }
}

/// One sighting source, in priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,

    #[serde(default)]
    pub authoritative: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Directive file; no curated pass when absent
    #[serde(default)]
    pub directives: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub synthetic: SyntheticConfig,

    #[serde(default)]
    pub teams: TeamsConfig,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub roster: Option<RosterConfig>,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Parse, resolve relative paths against `base_dir`, and validate
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: RunConfig = toml::from_str(content)?;
        config.resolve_paths(base_dir);
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base_dir.join(&*p);
            }
        };

        for source in &mut self.sources {
            resolve(&mut source.path);
        }
        if let Some(roster) = &mut self.roster {
            resolve(&mut roster.path);
        }
        if let Some(directives) = &mut self.merge.directives {
            resolve(directives);
        }
        resolve(&mut self.output.dir);
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Config("at least one [[sources]] entry is required".to_string()));
        }

        let mut names = BTreeSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "source at {} has an empty name",
                    source.path.display()
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(Error::Config(format!("duplicate source name '{}'", source.name)));
            }
        }

        if self.synthetic.prefix.trim().is_empty() {
            return Err(Error::Config("synthetic.prefix must not be empty".to_string()));
        }
        if !(1..=9).contains(&self.synthetic.width) {
            return Err(Error::Config(format!(
                "synthetic.width must be between 1 and 9, got {}",
                self.synthetic.width
            )));
        }

        Ok(())
    }

    pub fn synthetic_ids(&self) -> SyntheticIds {
        SyntheticIds {
            prefix: self.synthetic.prefix.clone(),
            width: self.synthetic.width,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [synthetic]
        prefix = "SYN"
        width = 5

        [[sources]]
        name = "teams-2023"
        path = "sightings/teams-2023.csv"
        authoritative = true

        [[sources]]
        name = "opstelling-2012"
        path = "/data/opstelling-2012.csv"

        [roster]
        path = "ledenlijst.csv"

        [merge]
        directives = "merge.toml"

        [output]
        dir = "out"
    "#;

    #[test]
    fn test_parse_full_config_and_resolve_paths() {
        let config = RunConfig::from_toml_str(FULL, Path::new("/srv/roster")).unwrap();

        assert_eq!(config.synthetic_ids().format(7).as_str(), "SYN-00007");
        assert_eq!(config.sources.len(), 2);
        assert!(config.sources[0].authoritative);
        assert!(!config.sources[1].authoritative);
        assert_eq!(config.sources[0].path, PathBuf::from("/srv/roster/sightings/teams-2023.csv"));
        assert_eq!(config.sources[1].path, PathBuf::from("/data/opstelling-2012.csv"));
        assert_eq!(
            config.roster.as_ref().map(|r| r.path.clone()),
            Some(PathBuf::from("/srv/roster/ledenlijst.csv"))
        );
        assert_eq!(config.merge.directives, Some(PathBuf::from("/srv/roster/merge.toml")));
        assert_eq!(config.output.dir, PathBuf::from("/srv/roster/out"));
        assert_eq!(config.teams.org_prefix, "OW");
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
            [[sources]]
            name = "only"
            path = "only.csv"
        "#;
        let config = RunConfig::from_toml_str(toml, Path::new("/base")).unwrap();
        assert_eq!(config.synthetic, SyntheticConfig::default());
        assert_eq!(config.synthetic_ids().format(1).as_str(), "OW-0001");
        assert!(config.roster.is_none());
        assert!(config.merge.directives.is_none());
        assert_eq!(config.output.dir, PathBuf::from("/base/out"));
    }

    #[test]
    fn test_validation_errors() {
        let no_sources = RunConfig::from_toml_str("", Path::new("."));
        assert!(matches!(no_sources, Err(Error::Config(_))));

        let duplicate = r#"
            [[sources]]
            name = "a"
            path = "a.csv"
            [[sources]]
            name = "a"
            path = "b.csv"
        "#;
        assert!(matches!(RunConfig::from_toml_str(duplicate, Path::new(".")), Err(Error::Config(_))));

        let wide = r#"
            [synthetic]
            width = 12
            [[sources]]
            name = "a"
            path = "a.csv"
        "#;
        assert!(matches!(RunConfig::from_toml_str(wide, Path::new(".")), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = RunConfig::from_toml_str("[[sources]\nname = ", Path::new("."));
        assert!(matches!(result, Err(Error::TomlDe(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.roster.unwrap().path, dir.path().join("ledenlijst.csv"));

        let missing = RunConfig::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
