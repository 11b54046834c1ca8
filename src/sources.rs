// 📥 Sighting Sources - Adapter seam between roster files and the core
//
// Adapters turn one roster export into normalized sightings:
//   {raw_name, nickname?, gender?, birthdate?, season, raw_team, stable_source_id?}
//
// A broken row is rejected and reported; the rest of the source continues.
// A source that cannot be opened at all fails as a unit.

use crate::entities::Gender;
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// SIGHTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SightingKind {
    /// Regular roster line: season + team for a person
    #[default]
    Roster,

    /// Team correction from a higher-priority sheet; replaces the season
    Correction,

    /// "Stopped" notice: sets the retired season
    Retirement,
}

impl SightingKind {
    pub fn parse(raw: &str) -> Option<SightingKind> {
        match raw.trim().to_lowercase().as_str() {
            "" | "roster" => Some(SightingKind::Roster),
            "correction" => Some(SightingKind::Correction),
            "retirement" | "stopped" => Some(SightingKind::Retirement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub raw_name: String,
    pub nickname: String,
    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
    pub season: String,
    pub raw_team: String,

    /// Present → authoritative registration; absent → find-or-create
    pub stable_source_id: Option<String>,

    pub category: Option<String>,
    pub role: Option<String>,
    pub kind: SightingKind,
}

impl Sighting {
    pub fn new(raw_name: impl Into<String>, season: impl Into<String>, raw_team: impl Into<String>) -> Self {
        Sighting {
            raw_name: raw_name.into(),
            nickname: String::new(),
            gender: None,
            birthdate: None,
            season: season.into(),
            raw_team: raw_team.into(),
            stable_source_id: None,
            category: None,
            role: None,
            kind: SightingKind::Roster,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.stable_source_id = Some(id.into());
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn with_gender(mut self, gender: Option<Gender>) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_birthdate(mut self, birthdate: Option<NaiveDate>) -> Self {
        self.birthdate = birthdate;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_kind(mut self, kind: SightingKind) -> Self {
        self.kind = kind;
        self
    }
}

// ============================================================================
// DATES
// ============================================================================

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `DD-MM-YYYY` and `DD/MM/YYYY`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.date());
    }

    ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based line number in the file, header included
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    /// (row number, sighting) in file order
    pub sightings: Vec<(usize, Sighting)>,
    pub rejected: Vec<RowRejection>,
}

pub trait SightingSource: Send + Sync {
    fn name(&self) -> &str;

    /// Source carries stable ids and must be ingested before name-only ones
    fn is_authoritative(&self) -> bool;

    /// Read the whole source. `Err` means the source is unusable as a unit.
    fn read(&self) -> Result<SourceBatch>;
}

// ============================================================================
// CSV SOURCE
// ============================================================================

/// Columns: `name, nickname, gender, birthdate, season, team, id, category,
/// role, kind`. Only `season` plus a name or id are required.
#[derive(Debug, Deserialize)]
struct SightingRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    birthdate: Option<String>,
    #[serde(default)]
    season: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl SightingRow {
    fn into_sighting(self) -> Result<Sighting> {
        let kind_raw = self.kind.unwrap_or_default();
        let kind = match SightingKind::parse(&kind_raw) {
            Some(kind) => kind,
            None => bail!("unknown row kind '{}'", kind_raw),
        };

        let Some(season) = non_empty(self.season) else {
            bail!("missing season");
        };

        let name = non_empty(self.name).unwrap_or_default();
        let id = non_empty(self.id);
        if name.is_empty() && id.is_none() {
            bail!("row has neither name nor id");
        }

        Ok(Sighting {
            raw_name: name,
            nickname: non_empty(self.nickname).unwrap_or_default(),
            gender: self.gender.as_deref().and_then(Gender::parse),
            birthdate: self.birthdate.as_deref().and_then(parse_date),
            season,
            raw_team: self.team.unwrap_or_default().trim().to_string(),
            stable_source_id: id,
            category: non_empty(self.category),
            role: non_empty(self.role),
            kind,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CsvSightingSource {
    name: String,
    path: PathBuf,
    authoritative: bool,
}

impl CsvSightingSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, authoritative: bool) -> Self {
        CsvSightingSource {
            name: name.into(),
            path: path.into(),
            authoritative,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SightingSource for CsvSightingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn read(&self) -> Result<SourceBatch> {
        use csv::{ReaderBuilder, Trim};
        use std::fs::File;

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open file: {}", self.path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);

        let mut batch = SourceBatch::default();
        for (line_num, result) in reader.deserialize::<SightingRow>().enumerate() {
            let row = line_num + 2;
            let parsed = result
                .with_context(|| format!("Failed to parse CSV line {} in {}", row, self.name))
                .and_then(SightingRow::into_sighting);

            match parsed {
                Ok(sighting) => batch.sightings.push((row, sighting)),
                Err(e) => batch.rejected.push(RowRejection {
                    row,
                    reason: format!("{:#}", e),
                }),
            }
        }

        Ok(batch)
    }
}

// ============================================================================
// IN-MEMORY SOURCE
// ============================================================================

/// Pre-built sightings, for adapters that already ran elsewhere
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    authoritative: bool,
    sightings: Vec<Sighting>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, authoritative: bool, sightings: Vec<Sighting>) -> Self {
        MemorySource {
            name: name.into(),
            authoritative,
            sightings,
        }
    }
}

impl SightingSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn read(&self) -> Result<SourceBatch> {
        Ok(SourceBatch {
            sightings: self
                .sightings
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, s)| (i + 1, s))
                .collect(),
            rejected: Vec::new(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
