// 🔗 Merge Engine - Curated directives
//
// Directives live in versioned TOML, not in code:
//
//   [[directive]]
//   primary   = { id = "NGD97S8" }
//   secondary = { surname = "Meulhaus", given = "Babette" }
//   note      = "married name"
//
// Each side resolves through the same key lookup the matcher uses.
// Unresolvable directives are skipped, never fatal. A directive still open
// when the last pass is done is recorded once, by `finish`.

use crate::diagnostics::{DiagnosticEvent, MergeVia};
use crate::entities::PersonId;
use crate::error::Result;
use crate::matching::resolve_by_name;
use crate::names;
use crate::registry::IdentityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// DIRECTIVES
// ============================================================================

/// One side of a directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentitySpec {
    /// Identity id, followed through merges/promotions
    Id { id: String },

    Name { surname: String, given: String },

    /// Raw name string, split by the name parser
    Raw { name: String },
}

impl fmt::Display for IdentitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySpec::Id { id } => write!(f, "{}", id),
            IdentitySpec::Name { surname, given } => write!(f, "{}, {}", surname, given),
            IdentitySpec::Raw { name } => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDirective {
    pub primary: IdentitySpec,
    pub secondary: IdentitySpec,

    #[serde(default)]
    pub note: Option<String>,
}

/// Ordered directive list as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveSet {
    #[serde(default, rename = "directive")]
    pub directives: Vec<MergeDirective>,
}

impl DirectiveSet {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

// ============================================================================
// CURATED PASS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedReport {
    pub applied: usize,
    pub skipped: usize,
    pub seasons_copied: usize,
}

/// Runs the curated pass. Remembers which directives were applied, so a
/// second run over the same list only tries the ones still open.
pub struct MergeEngine {
    applied: BTreeSet<usize>,

    /// index → event for the latest failed attempt of each open directive
    open: BTreeMap<usize, DiagnosticEvent>,
}

impl MergeEngine {
    pub fn new() -> Self {
        MergeEngine {
            applied: BTreeSet::new(),
            open: BTreeMap::new(),
        }
    }

    /// Record every directive that no pass could apply. Returns how many.
    pub fn finish(&mut self, registry: &mut IdentityRegistry) -> usize {
        let open = std::mem::take(&mut self.open);
        let count = open.len();
        for event in open.into_values() {
            registry.diagnostics_mut().record(event);
        }
        count
    }

    /// Resolve one side of a directive to a live identity
    pub fn resolve(&self, registry: &IdentityRegistry, spec: &IdentitySpec) -> Option<PersonId> {
        match spec {
            IdentitySpec::Id { id } => {
                let id = registry.canonical_id(&PersonId::new(id.trim()));
                registry.contains(&id).then_some(id)
            }
            IdentitySpec::Name { surname, given } => resolve_by_name(registry, surname, given),
            IdentitySpec::Raw { name } => {
                let parsed = names::parse_name(name);
                if parsed.is_parse_failure() {
                    return None;
                }
                resolve_by_name(registry, &parsed.surname, &parsed.given)
            }
        }
    }

    pub fn run_curated(
        &mut self,
        registry: &mut IdentityRegistry,
        directives: &[MergeDirective],
    ) -> CuratedReport {
        let mut report = CuratedReport::default();

        for (index, directive) in directives.iter().enumerate() {
            if self.applied.contains(&index) {
                continue;
            }

            let primary = self.resolve(registry, &directive.primary);
            let secondary = self.resolve(registry, &directive.secondary);

            let outcome = match (primary, secondary) {
                (None, _) => Err("primary does not resolve".to_string()),
                (_, None) => Err("secondary does not resolve".to_string()),
                (Some(p), Some(s)) if p == s => Err(format!("both sides resolve to {}", p)),
                (Some(p), Some(s)) => registry.absorb(&p, &s).map_err(|e| e.to_string()),
            };

            match outcome {
                Ok(absorbed) => {
                    debug!(
                        primary = %absorbed.primary,
                        secondary = %absorbed.secondary,
                        seasons = absorbed.seasons_copied,
                        "curated merge"
                    );
                    report.applied += 1;
                    report.seasons_copied += absorbed.seasons_copied;
                    self.applied.insert(index);
                    self.open.remove(&index);
                    registry.diagnostics_mut().record(DiagnosticEvent::Merged {
                        primary: absorbed.primary,
                        secondary: absorbed.secondary,
                        via: MergeVia::Curated,
                        seasons_copied: absorbed.seasons_copied,
                    });
                }
                Err(reason) => {
                    warn!(index, primary = %directive.primary, secondary = %directive.secondary, %reason, "merge directive skipped");
                    report.skipped += 1;
                    self.open.insert(
                        index,
                        DiagnosticEvent::DirectiveUnresolvable {
                            index,
                            primary: directive.primary.to_string(),
                            secondary: directive.secondary.to_string(),
                            reason,
                        },
                    );
                }
            }
        }

        info!(applied = report.applied, skipped = report.skipped, "curated merge pass");
        report
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
