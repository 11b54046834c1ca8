// Roster Lineage - Core Library
// Identity resolution and merge engine for club roster history.
// Exposes all modules for use in the batch runner and tests.

pub mod config;
pub mod diagnostics;
pub mod entities;
pub mod error;
pub mod export;
pub mod keys;
pub mod matching;
pub mod merge;
pub mod names;
pub mod pipeline;
pub mod reconciliation;
pub mod registry;
pub mod sources;
pub mod tally;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use config::RunConfig;
pub use diagnostics::{suggest_missed_matches, DiagnosticEvent, Diagnostics, MatchSuggestion, MergeVia};
pub use entities::{Gender, IdentityState, PersonId, PersonIdentity, SeasonAssignment, SourceKind};
pub use error::{Error, Result};
pub use export::{identity_digest, write_outputs, RunMeta};
pub use keys::{KeyGenerator, MatchKey};
pub use matching::{resolve_by_name, MatchPass, MatchQuery, MatchResolution, Matcher};
pub use merge::{DirectiveSet, IdentitySpec, MergeDirective, MergeEngine};
pub use names::{parse_name, ParsedName};
pub use pipeline::{sources_from_config, Pipeline, RunOutput, RunSummary};
pub use reconciliation::{AuthoritativeRoster, ReconciliationEngine, ReconciliationReport, RosterMember};
pub use registry::{IdentityRegistry, SyntheticIds};
pub use sources::{CsvSightingSource, MemorySource, Sighting, SightingKind, SightingSource};
pub use tally::SeasonTally;
