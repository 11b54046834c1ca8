// 💾 Export - Run artifacts on disk
//
//   identities.json   final identity list, ordered by id
//   diagnostics.json  every skip / collision / merge decision + suggestions
//   tally.json        per-season counts by team and gender
//   meta.json         run id, timestamp, counts, identity digest
//
// The digest covers identities.json only: two runs over the same inputs
// produce the same digest, while run_id and generated_at differ.

use crate::diagnostics::{DiagnosticEvent, MatchSuggestion};
use crate::entities::PersonIdentity;
use crate::error::Result;
use crate::pipeline::{RunOutput, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const IDENTITIES_FILE: &str = "identities.json";
pub const DIAGNOSTICS_FILE: &str = "diagnostics.json";
pub const TALLY_FILE: &str = "tally.json";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub version: String,

    /// SHA-256 of the serialized identity list (hex)
    pub identity_digest: String,

    pub summary: RunSummary,
    pub diagnostic_counts: BTreeMap<String, usize>,
    pub suggestions: usize,
}

#[derive(Debug, Serialize)]
struct DiagnosticsReport<'a> {
    counts: BTreeMap<String, usize>,
    events: &'a [DiagnosticEvent],
    suggestions: &'a [MatchSuggestion],
}

pub fn identity_digest(identities: &[PersonIdentity]) -> Result<String> {
    let bytes = serde_json::to_vec(identities)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

impl RunMeta {
    pub fn for_output(output: &RunOutput) -> Result<Self> {
        Ok(RunMeta {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            version: crate::VERSION.to_string(),
            identity_digest: identity_digest(&output.identities)?,
            summary: output.summary.clone(),
            diagnostic_counts: diagnostic_counts(output),
            suggestions: output.suggestions.len(),
        })
    }
}

fn diagnostic_counts(output: &RunOutput) -> BTreeMap<String, usize> {
    output
        .diagnostics
        .counts()
        .into_iter()
        .map(|(kind, n)| (kind.to_string(), n))
        .collect()
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, file: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(dir.join(file), json)?;
    Ok(())
}

/// Write all four artifacts into `dir` (created if missing)
pub fn write_outputs(output: &RunOutput, dir: &Path) -> Result<RunMeta> {
    std::fs::create_dir_all(dir)?;

    let meta = RunMeta::for_output(output)?;

    write_json(dir, IDENTITIES_FILE, &output.identities)?;
    write_json(
        dir,
        DIAGNOSTICS_FILE,
        &DiagnosticsReport {
            counts: diagnostic_counts(output),
            events: &output.diagnostics.events,
            suggestions: &output.suggestions,
        },
    )?;
    write_json(dir, TALLY_FILE, &output.tally)?;
    write_json(dir, META_FILE, &meta)?;

    info!(
        dir = %dir.display(),
        identities = output.identities.len(),
        digest = %meta.identity_digest,
        "outputs written"
    );
    Ok(meta)
}

// ============================================================================
// TESTS
// ============================================================================
