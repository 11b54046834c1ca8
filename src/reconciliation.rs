// ⚖️ Reconciliation Engine - Automatic synthetic → authoritative pass
//
// For every synthetic identity, in id order:
//   (i)   birthdate + normalized surname   against the authoritative pool
//   (ii)  birthdate + folded surname       against the authoritative pool
//   (iii) unique exact/simplified key      against the member roster
//
// Pool = authoritative identities in the registry ∪ roster members.
// A unique hit promotes the synthetic identity onto the authoritative id,
// or merges it when that id already lives in the registry. Anything with
// more than one candidate is left alone.

use crate::diagnostics::{DiagnosticEvent, MergeVia};
use crate::entities::{season_years, Enrichment, Gender, PersonId, PersonIdentity};
use crate::error::{Error, Result};
use crate::keys::{KeyGenerator, MatchKey};
use crate::matching::StrategyOutcome;
use crate::names;
use crate::registry::IdentityRegistry;
use crate::sources::{parse_date, RowRejection};
use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// AUTHORITATIVE ROSTER
// ============================================================================

/// One member of the external membership roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: PersonId,
    pub name: String,
    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
    pub member_since: Option<NaiveDate>,
    pub member_until: Option<NaiveDate>,
}

impl RosterMember {
    /// Membership years overlap at least one parseable season. An identity
    /// without parseable seasons never rules a member out.
    pub fn active_during<'a>(&self, seasons: impl IntoIterator<Item = &'a String>) -> bool {
        let since = self.member_since.map(|d| d.year()).unwrap_or(i32::MIN);
        let until = self.member_until.map(|d| d.year()).unwrap_or(i32::MAX);

        let mut any_parsed = false;
        for (start, end) in seasons.into_iter().filter_map(|s| season_years(s)) {
            any_parsed = true;
            if start <= until && end >= since {
                return true;
            }
        }
        !any_parsed
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    birthdate: Option<String>,
    #[serde(default)]
    member_since: Option<String>,
    #[serde(default)]
    member_until: Option<String>,
}

impl RosterRow {
    fn into_member(self) -> anyhow::Result<RosterMember> {
        let id = self.id.map(|v| v.trim().to_string()).unwrap_or_default();
        let name = self.name.map(|v| v.trim().to_string()).unwrap_or_default();
        if id.is_empty() || name.is_empty() {
            anyhow::bail!("roster row needs both id and name");
        }

        Ok(RosterMember {
            id: PersonId::new(id),
            name,
            gender: self.gender.as_deref().and_then(Gender::parse),
            birthdate: self.birthdate.as_deref().and_then(parse_date),
            member_since: self.member_since.as_deref().and_then(parse_date),
            member_until: self.member_until.as_deref().and_then(parse_date),
        })
    }
}

/// Membership roster with birthdate and name-key indices
#[derive(Debug, Clone, Default)]
pub struct AuthoritativeRoster {
    members: BTreeMap<PersonId, RosterMember>,
    by_key: HashMap<MatchKey, Vec<PersonId>>,

    /// Rows skipped while loading
    pub rejected: Vec<RowRejection>,
}

impl AuthoritativeRoster {
    /// Index members by exact and simplified key. A later row with the same
    /// id replaces the earlier one.
    pub fn new(members: Vec<RosterMember>, keys: &KeyGenerator) -> Self {
        let members: BTreeMap<PersonId, RosterMember> =
            members.into_iter().map(|m| (m.id.clone(), m)).collect();

        let mut by_key: HashMap<MatchKey, Vec<PersonId>> = HashMap::new();
        for member in members.values() {
            let parsed = names::parse_name(&member.name);
            let candidates = [
                keys.exact(&parsed.surname, &parsed.given),
                keys.simplified(&parsed.surname, &parsed.given),
            ];
            for key in candidates.into_iter().flatten() {
                let ids = by_key.entry(key).or_default();
                if !ids.contains(&member.id) {
                    ids.push(member.id.clone());
                }
            }
        }

        AuthoritativeRoster {
            members,
            by_key,
            rejected: Vec::new(),
        }
    }

    /// Columns: `id, name, gender, birthdate, member_since, member_until`
    pub fn from_reader<R: Read>(reader: R, keys: &KeyGenerator) -> anyhow::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut members = Vec::new();
        let mut rejected = Vec::new();
        for (line_num, result) in reader.deserialize::<RosterRow>().enumerate() {
            let row = line_num + 2;
            let parsed = result
                .with_context(|| format!("Failed to parse roster line {}", row))
                .and_then(RosterRow::into_member);
            match parsed {
                Ok(member) => members.push(member),
                Err(e) => rejected.push(RowRejection {
                    row,
                    reason: format!("{:#}", e),
                }),
            }
        }

        let mut roster = Self::new(members, keys);
        roster.rejected = rejected;
        Ok(roster)
    }

    pub fn from_path(path: &Path, keys: &KeyGenerator) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open roster: {}", path.display()))?;
        Self::from_reader(file, keys)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: &PersonId) -> Option<&RosterMember> {
        self.members.get(id)
    }

    pub fn members(&self) -> impl Iterator<Item = &RosterMember> {
        self.members.values()
    }

    pub fn ids_by_key(&self, key: &MatchKey) -> &[PersonId] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub promoted: usize,
    pub merged: usize,
    pub ambiguous: usize,
    pub fields_enriched: usize,
    pub genders_inferred: usize,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} promoted, {} merged, {} ambiguous, {} fields enriched, {} genders inferred",
            self.promoted, self.merged, self.ambiguous, self.fields_enriched, self.genders_inferred
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Authoritative record a synthetic identity can be matched against
#[derive(Debug, Clone)]
struct PoolEntry {
    name: String,
    normalized_surname: String,
    folded_surname: String,
    gender: Option<Gender>,
    birthdate: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    Match(PersonId, MergeVia),
    Ambiguous(&'static str, Vec<PersonId>),
    NoMatch,
}

pub struct ReconciliationEngine {
    /// Discard roster-key candidates whose membership years miss every
    /// season of the identity (default: true)
    pub membership_filter: bool,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            membership_filter: true,
        }
    }

    pub fn run(
        &self,
        registry: &mut IdentityRegistry,
        roster: Option<&AuthoritativeRoster>,
    ) -> Result<ReconciliationReport> {
        let pool = Self::candidate_pool(registry, roster);
        let synthetic_ids: Vec<PersonId> = registry
            .iter()
            .filter(|p| p.is_synthetic())
            .map(|p| p.id.clone())
            .collect();

        let mut report = ReconciliationReport::default();

        for id in synthetic_ids {
            let Some(person) = registry.get(&id) else {
                continue;
            };
            let subject = person.canonical_name.clone();
            let decision = self.decide(registry, person, &pool, roster);

            let (target, via) = match decision {
                Decision::NoMatch => continue,
                Decision::Ambiguous(stage, candidates) => {
                    debug!(id = %id, stage, count = candidates.len(), "reconciliation ambiguous");
                    report.ambiguous += 1;
                    registry.diagnostics_mut().record(DiagnosticEvent::AmbiguousMatch {
                        stage: stage.to_string(),
                        subject,
                        candidates,
                    });
                    continue;
                }
                Decision::Match(target, via) => (target, via),
            };

            if let Err(e) = self.apply_match(registry, &pool, &id, &target, via, &mut report) {
                let reason = e.to_string();
                warn!(id = %id, target = %target, %reason, "reconciliation match not applied");
                registry.diagnostics_mut().record(DiagnosticEvent::ReconciliationSkipped {
                    id,
                    target,
                    reason,
                });
            }
        }

        if let Some(roster) = roster {
            self.enrich_from_roster(registry, roster, &mut report)?;
        }

        info!(
            promoted = report.promoted,
            merged = report.merged,
            ambiguous = report.ambiguous,
            "automatic reconciliation pass"
        );
        Ok(report)
    }

    /// Merge into a live target, otherwise promote onto it
    fn apply_match(
        &self,
        registry: &mut IdentityRegistry,
        pool: &BTreeMap<PersonId, PoolEntry>,
        id: &PersonId,
        target: &PersonId,
        via: MergeVia,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        if registry.contains(target) {
            let absorbed = registry.absorb(target, id)?;
            debug!(from = %id, into = %target, "reconciliation merge");
            report.merged += 1;
            registry.diagnostics_mut().record(DiagnosticEvent::Merged {
                primary: absorbed.primary,
                secondary: absorbed.secondary,
                via,
                seasons_copied: absorbed.seasons_copied,
            });
            return Ok(());
        }

        let entry = pool
            .get(target)
            .ok_or_else(|| Error::UnknownIdentity(target.to_string()))?;
        registry.promote(id, target, &entry.name, entry.gender, entry.birthdate)?;
        debug!(from = %id, to = %target, "reconciliation promote");
        report.promoted += 1;
        registry.diagnostics_mut().record(DiagnosticEvent::Promoted {
            from: id.clone(),
            to: target.clone(),
        });
        Ok(())
    }

    /// Registry authoritative identities first; roster members fill in the
    /// ids the registry does not hold
    fn candidate_pool(
        registry: &IdentityRegistry,
        roster: Option<&AuthoritativeRoster>,
    ) -> BTreeMap<PersonId, PoolEntry> {
        let keys = registry.keys();
        let entry = |name: &str, gender, birthdate| {
            let surname = names::parse_name(name).surname;
            PoolEntry {
                name: name.to_string(),
                normalized_surname: names::normalize(&surname),
                folded_surname: keys.fold_surname(&surname),
                gender,
                birthdate,
            }
        };

        let mut pool: BTreeMap<PersonId, PoolEntry> = registry
            .iter()
            .filter(|p| !p.is_synthetic())
            .map(|p| (p.id.clone(), entry(&p.canonical_name, p.gender, p.birthdate)))
            .collect();

        for member in roster.into_iter().flat_map(|r| r.members()) {
            pool.entry(member.id.clone())
                .or_insert_with(|| entry(&member.name, member.gender, member.birthdate));
        }

        pool
    }

    /// Candidate ids are followed through merge/promotion redirects, so a
    /// roster member merged away by the curated pass counts as its survivor
    fn decide(
        &self,
        registry: &IdentityRegistry,
        person: &PersonIdentity,
        pool: &BTreeMap<PersonId, PoolEntry>,
        roster: Option<&AuthoritativeRoster>,
    ) -> Decision {
        let keys = registry.keys();
        let parsed = person.parsed_name();

        if let Some(birthdate) = person.birthdate {
            let surname = names::normalize(&parsed.surname);
            let folded = keys.fold_surname(&parsed.surname);

            let exact = birthdate_stage(registry, pool, birthdate, |e| {
                !surname.is_empty() && e.normalized_surname == surname
            });
            match exact {
                StrategyOutcome::Hit(id) => return Decision::Match(id, MergeVia::BirthdateSurname),
                StrategyOutcome::Ambiguous(ids) => return Decision::Ambiguous("birthdate_surname", ids),
                StrategyOutcome::Miss => {}
            }

            let fuzzy = birthdate_stage(registry, pool, birthdate, |e| {
                !folded.is_empty() && e.folded_surname == folded
            });
            match fuzzy {
                StrategyOutcome::Hit(id) => return Decision::Match(id, MergeVia::BirthdateFuzzySurname),
                StrategyOutcome::Ambiguous(ids) => return Decision::Ambiguous("birthdate_fuzzy_surname", ids),
                StrategyOutcome::Miss => {}
            }
        }

        match roster {
            Some(roster) => self.decide_by_roster_key(registry, person, roster),
            None => Decision::NoMatch,
        }
    }

    fn decide_by_roster_key(
        &self,
        registry: &IdentityRegistry,
        person: &PersonIdentity,
        roster: &AuthoritativeRoster,
    ) -> Decision {
        let members: Vec<&RosterMember> = roster_candidates(registry.keys(), person, roster)
            .iter()
            .filter_map(|id| roster.get(id))
            .filter(|m| !self.membership_filter || m.active_during(person.seasons.keys()))
            .collect();
        let canonical = |members: &[&RosterMember]| -> StrategyOutcome {
            StrategyOutcome::from_candidates(members.iter().map(|m| registry.canonical_id(&m.id)).collect())
        };

        match canonical(&members) {
            StrategyOutcome::Hit(id) => Decision::Match(id, MergeVia::RosterKey),
            StrategyOutcome::Miss => Decision::NoMatch,
            StrategyOutcome::Ambiguous(ids) => {
                let same_birthdate: Vec<&RosterMember> = members
                    .iter()
                    .copied()
                    .filter(|m| person.birthdate.is_some() && m.birthdate == person.birthdate)
                    .collect();
                match canonical(&same_birthdate) {
                    StrategyOutcome::Hit(id) => Decision::Match(id, MergeVia::RosterKey),
                    _ => Decision::Ambiguous("roster_key", ids),
                }
            }
        }
    }

    /// Fill empty birthdate/gender from the roster by id, then infer gender
    /// for synthetic identities whose exact-key roster matches all agree
    fn enrich_from_roster(
        &self,
        registry: &mut IdentityRegistry,
        roster: &AuthoritativeRoster,
        report: &mut ReconciliationReport,
    ) -> Result<()> {
        for id in registry.ids() {
            let Some(member) = roster.get(&id) else {
                continue;
            };
            if let Some(birthdate) = member.birthdate {
                if registry.enrich(&id, Enrichment::Birthdate(birthdate))? {
                    report.fields_enriched += 1;
                }
            }
            if let Some(gender) = member.gender {
                if registry.enrich(&id, Enrichment::Gender(gender))? {
                    report.fields_enriched += 1;
                }
            }
        }

        let inferred: Vec<(PersonId, Gender)> = registry
            .iter()
            .filter(|p| p.is_synthetic() && p.gender.is_none())
            .filter_map(|p| {
                let parsed = p.parsed_name();
                let mut genders: Vec<Gender> = Vec::new();
                for given in p.given_variants() {
                    let Some(key) = registry.keys().exact(&parsed.surname, &given) else {
                        continue;
                    };
                    for gender in roster
                        .ids_by_key(&key)
                        .iter()
                        .filter_map(|id| roster.get(id).and_then(|m| m.gender))
                    {
                        if !genders.contains(&gender) {
                            genders.push(gender);
                        }
                    }
                }
                match genders.as_slice() {
                    [only] => Some((p.id.clone(), *only)),
                    _ => None,
                }
            })
            .collect();

        for (id, gender) in inferred {
            if registry.enrich(&id, Enrichment::Gender(gender))? {
                report.genders_inferred += 1;
            }
        }

        Ok(())
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn birthdate_stage(
    registry: &IdentityRegistry,
    pool: &BTreeMap<PersonId, PoolEntry>,
    birthdate: NaiveDate,
    same_surname: impl Fn(&PoolEntry) -> bool,
) -> StrategyOutcome {
    let candidates = pool
        .iter()
        .filter(|(_, e)| e.birthdate == Some(birthdate) && same_surname(e))
        .map(|(id, _)| registry.canonical_id(id))
        .collect();
    StrategyOutcome::from_candidates(candidates)
}

/// Roster ids reachable from any exact/simplified key of the identity
fn roster_candidates(
    keys: &KeyGenerator,
    person: &PersonIdentity,
    roster: &AuthoritativeRoster,
) -> Vec<PersonId> {
    let surname = person.parsed_name().surname;
    let mut ids = Vec::new();
    for given in person.given_variants() {
        let lookups = [keys.exact(&surname, &given), keys.simplified(&surname, &given)];
        for key in lookups.into_iter().flatten() {
            ids.extend(roster.ids_by_key(&key).iter().cloned());
        }
    }
    ids
}

// ============================================================================
// TESTS
// ============================================================================
