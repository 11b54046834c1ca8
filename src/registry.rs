// 🗂️ Identity Registry - Canonical identity store + key index
//
// One explicit instance per run, passed by reference to every stage.
//
// Indices:
// - by_id:     PersonId → PersonIdentity (BTreeMap: id order = export order)
// - by_key:    MatchKey → PersonId (one identity per key, last write wins)
// - redirects: absorbed / promoted ids → the id that now carries them

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::entities::{
    categorize_team, Enrichment, Gender, IdentityState, PersonId, PersonIdentity,
    SeasonAssignment, SourceKind, TeamNormalizer, DEFAULT_ROLE,
};
use crate::error::{Error, Result};
use crate::keys::{KeyGenerator, MatchKey};
use crate::names;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

// ============================================================================
// SYNTHETIC IDS
// ============================================================================

pub const DEFAULT_SYNTHETIC_PREFIX: &str = "OW";
pub const DEFAULT_SYNTHETIC_WIDTH: usize = 4;

/// Synthetic ids are `{prefix}-{counter}` zero-padded to `width`.
/// The counter starts from zero on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticIds {
    pub prefix: String,
    pub width: usize,
}

impl SyntheticIds {
    pub fn format(&self, counter: u32) -> PersonId {
        PersonId::new(format!("{}-{:0width$}", self.prefix, counter, width = self.width))
    }
}

impl Default for SyntheticIds {
    fn default() -> Self {
        SyntheticIds {
            prefix: DEFAULT_SYNTHETIC_PREFIX.to_string(),
            width: DEFAULT_SYNTHETIC_WIDTH,
        }
    }
}

// ============================================================================
// WRITE OUTCOMES
// ============================================================================

/// Outcome of a season attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonWrite {
    /// New assignment stored
    Recorded,

    /// Season already assigned; first write wins
    AlreadyAssigned,

    /// Override path replaced an existing assignment
    Replaced,

    /// Placeholder team ("-", "stopt", ...): nothing stored
    NoAssignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsorbOutcome {
    pub primary: PersonId,
    pub secondary: PersonId,
    pub seasons_copied: usize,
    pub fields_filled: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectKind {
    Merged,
    Promoted,
}

#[derive(Debug, Clone)]
struct Redirect {
    target: PersonId,
    kind: RedirectKind,
}

// ============================================================================
// IDENTITY REGISTRY
// ============================================================================

#[derive(Debug)]
pub struct IdentityRegistry {
    by_id: BTreeMap<PersonId, PersonIdentity>,
    by_key: HashMap<MatchKey, PersonId>,
    redirects: BTreeMap<PersonId, Redirect>,
    keys: KeyGenerator,
    teams: TeamNormalizer,
    synthetic: SyntheticIds,
    synthetic_counter: u32,
    finalized: bool,
    diagnostics: Diagnostics,
}

impl IdentityRegistry {
    /// Empty registry with the default key generator, team normalizer and
    /// `OW-0001` synthetic ids
    pub fn new() -> Self {
        Self::with_parts(KeyGenerator::new(), TeamNormalizer::default(), SyntheticIds::default())
    }

    pub fn with_parts(keys: KeyGenerator, teams: TeamNormalizer, synthetic: SyntheticIds) -> Self {
        IdentityRegistry {
            by_id: BTreeMap::new(),
            by_key: HashMap::new(),
            redirects: BTreeMap::new(),
            keys,
            teams,
            synthetic,
            synthetic_counter: 0,
            finalized: false,
            diagnostics: Diagnostics::new(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    pub fn teams(&self) -> &TeamNormalizer {
        &self.teams
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &PersonId) -> Option<&PersonIdentity> {
        self.by_id.get(id)
    }

    /// All live identities in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &PersonIdentity> {
        self.by_id.values()
    }

    pub fn ids(&self) -> Vec<PersonId> {
        self.by_id.keys().cloned().collect()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Follow merge/promotion redirects to the id that is live now
    pub fn canonical_id(&self, id: &PersonId) -> PersonId {
        let mut current = id.clone();
        while let Some(redirect) = self.redirects.get(&current) {
            current = redirect.target.clone();
        }
        current
    }

    /// Lifecycle state of an id, including ids that were absorbed or promoted
    pub fn state(&self, id: &PersonId) -> Option<IdentityState> {
        if let Some(person) = self.by_id.get(id) {
            if self.finalized {
                return Some(IdentityState::Retained);
            }
            return Some(if person.promoted_from.is_some() {
                IdentityState::Promoted
            } else if person.is_synthetic() {
                IdentityState::Synthetic
            } else {
                IdentityState::Authoritative
            });
        }

        self.redirects.get(id).map(|redirect| match redirect.kind {
            RedirectKind::Promoted if self.contains(&redirect.target) => IdentityState::Promoted,
            RedirectKind::Promoted | RedirectKind::Merged => IdentityState::MergedAway,
        })
    }

    // ========================================================================
    // KEY INDEX
    // ========================================================================

    /// Point `key` at `id`. A key that already pointed at another live
    /// identity is taken over and the collision recorded.
    pub fn register_key(&mut self, key: MatchKey, id: &PersonId) {
        if let Some(previous) = self.by_key.get(&key) {
            if previous != id && self.by_id.contains_key(previous) {
                warn!(key = %key, previous = %previous, current = %id, "match key collision");
                self.diagnostics.record(DiagnosticEvent::KeyCollision {
                    key: key.to_string(),
                    previous: previous.clone(),
                    current: id.clone(),
                });
            }
        }
        self.by_key.insert(key, id.clone());
    }

    /// Point `key` at `id` unless a live authoritative identity already
    /// holds it; a held key stays put and the collision is recorded.
    /// Returns whether the key now points at `id`.
    pub fn claim_key(&mut self, key: MatchKey, id: &PersonId) -> bool {
        let holder = self
            .by_key
            .get(&key)
            .map(|previous| self.canonical_id(previous))
            .filter(|previous| previous != id)
            .and_then(|previous| self.by_id.get(&previous))
            .filter(|person| !person.is_synthetic())
            .map(|person| person.id.clone());

        match holder {
            Some(previous) => {
                warn!(key = %key, holder = %previous, current = %id, "match key kept by authoritative identity");
                self.diagnostics.record(DiagnosticEvent::KeyCollision {
                    key: key.to_string(),
                    previous,
                    current: id.clone(),
                });
                false
            }
            None => {
                self.register_key(key, id);
                true
            }
        }
    }

    /// (Re-)register every derived key for a name + nickname on `id`
    pub fn register_keys(&mut self, id: &PersonId, name: &str, nickname: &str) {
        for key in self.derived_keys(name, nickname) {
            self.register_key(key, id);
        }
    }

    fn derived_keys(&self, name: &str, nickname: &str) -> Vec<MatchKey> {
        let parsed = names::parse_name(name);
        self.keys
            .derive(&parsed.surname, &[parsed.given.as_str(), nickname])
            .into_iter()
            .map(|d| d.key)
            .collect()
    }

    pub fn lookup_by_key(&self, key: &MatchKey) -> Option<&PersonIdentity> {
        let id = self.by_key.get(key)?;
        self.by_id.get(&self.canonical_id(id))
    }

    pub fn lookup_id_by_key(&self, key: &MatchKey) -> Option<PersonId> {
        self.lookup_by_key(key).map(|p| p.id.clone())
    }

    // ========================================================================
    // CREATION
    // ========================================================================

    /// Authoritative feed entry. Unseen id → new identity. Seen id → name and
    /// nickname refreshed to the latest non-empty values, gender/birthdate
    /// filled only when empty. Keys are always re-registered.
    pub fn register_with_id(
        &mut self,
        id: &str,
        name: &str,
        nickname: &str,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
    ) -> PersonId {
        let id = self.canonical_id(&PersonId::new(id.trim()));
        let name = name.trim();
        let nickname = nickname.trim();

        let person = self.by_id.entry(id.clone()).or_insert_with(|| {
            debug!(id = %id, name, "new authoritative identity");
            PersonIdentity::new(
                id.clone(),
                name.to_string(),
                nickname.to_string(),
                gender,
                birthdate,
                SourceKind::Authoritative,
            )
        });

        if !name.is_empty() {
            person.canonical_name = name.to_string();
        }
        if !nickname.is_empty() {
            person.nickname = nickname.to_string();
        }
        if person.gender.is_none() {
            person.gender = gender;
        }
        if person.birthdate.is_none() {
            person.birthdate = birthdate;
        }

        let (name, nickname) = (person.canonical_name.clone(), person.nickname.clone());
        self.register_keys(&id, &name, &nickname);
        id
    }

    /// Mint the next synthetic id and create the identity under it
    pub fn create_synthetic(
        &mut self,
        name: &str,
        nickname: &str,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
    ) -> PersonId {
        let (id, nickname) = self.insert_synthetic(name, nickname, gender, birthdate);
        self.register_keys(&id, name.trim(), &nickname);
        id
    }

    /// Like `create_synthetic`, but keys already held by a live
    /// authoritative identity stay with it. Used after an ambiguous match,
    /// where the new identity must not capture the candidates' keys.
    pub fn create_synthetic_yielding(
        &mut self,
        name: &str,
        nickname: &str,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
    ) -> PersonId {
        let (id, nickname) = self.insert_synthetic(name, nickname, gender, birthdate);
        for key in self.derived_keys(name.trim(), &nickname) {
            self.claim_key(key, &id);
        }
        id
    }

    fn insert_synthetic(
        &mut self,
        name: &str,
        nickname: &str,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
    ) -> (PersonId, String) {
        let id = self.next_synthetic_id();
        let name = name.trim();
        let nickname = match nickname.trim() {
            "" => names::parse_name(name).given,
            n => n.to_string(),
        };

        debug!(id = %id, name, "new synthetic identity");
        self.by_id.insert(
            id.clone(),
            PersonIdentity::new(
                id.clone(),
                name.to_string(),
                nickname.clone(),
                gender,
                birthdate,
                SourceKind::Synthetic,
            ),
        );
        (id, nickname)
    }

    fn next_synthetic_id(&mut self) -> PersonId {
        loop {
            self.synthetic_counter += 1;
            let id = self.synthetic.format(self.synthetic_counter);
            if !self.by_id.contains_key(&id) && !self.redirects.contains_key(&id) {
                return id;
            }
        }
    }

    // ========================================================================
    // ENRICHMENT
    // ========================================================================

    /// Set one scalar field if it is currently empty. Returns whether the
    /// field changed.
    pub fn enrich(&mut self, id: &PersonId, enrichment: Enrichment) -> Result<bool> {
        let person = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::UnknownIdentity(id.to_string()))?;

        let field = enrichment.field();
        let changed = match enrichment {
            Enrichment::Gender(g) if person.gender.is_none() => {
                person.gender = Some(g);
                true
            }
            Enrichment::Birthdate(d) if person.birthdate.is_none() => {
                person.birthdate = Some(d);
                true
            }
            Enrichment::Nickname(n) if person.nickname.is_empty() && !n.trim().is_empty() => {
                person.nickname = n.trim().to_string();
                true
            }
            Enrichment::RetiredSeason(s) if person.retired_season.is_none() => {
                person.retired_season = Some(s);
                true
            }
            _ => false,
        };
        if changed {
            debug!(id = %id, field, "field enriched");
        }
        Ok(changed)
    }

    /// Record the season a person stopped. Later notices replace earlier ones.
    pub fn mark_retired(&mut self, id: &PersonId, season: &str) -> Result<()> {
        let person = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::UnknownIdentity(id.to_string()))?;
        person.retired_season = Some(season.to_string());
        Ok(())
    }

    // ========================================================================
    // SEASON-TRACK ATTACHER
    // ========================================================================

    /// Attach a season. First write per season wins; placeholder teams are a
    /// no-op. Category is derived from the team code when not supplied.
    pub fn add_season(
        &mut self,
        id: &PersonId,
        season: &str,
        raw_team: &str,
        category: Option<&str>,
        role: Option<&str>,
    ) -> Result<SeasonWrite> {
        self.write_season(id, season, raw_team, category, role, false)
    }

    /// Override path for higher-priority sources correcting lower-priority
    /// ones: replaces the season's team/category unconditionally.
    pub fn override_season(
        &mut self,
        id: &PersonId,
        season: &str,
        raw_team: &str,
        category: Option<&str>,
        role: Option<&str>,
    ) -> Result<SeasonWrite> {
        self.write_season(id, season, raw_team, category, role, true)
    }

    fn write_season(
        &mut self,
        id: &PersonId,
        season: &str,
        raw_team: &str,
        category: Option<&str>,
        role: Option<&str>,
        replace: bool,
    ) -> Result<SeasonWrite> {
        let person = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::UnknownIdentity(id.to_string()))?;

        let team = match self.teams.normalize(raw_team) {
            Some(team) => team,
            None => return Ok(SeasonWrite::NoAssignment),
        };

        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| categorize_team(&team).to_string());

        match person.seasons.get_mut(season) {
            Some(existing) if replace => {
                existing.team = team;
                existing.category = category;
                Ok(SeasonWrite::Replaced)
            }
            Some(_) => Ok(SeasonWrite::AlreadyAssigned),
            None => {
                let role = role
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_ROLE);
                person.seasons.insert(
                    season.to_string(),
                    SeasonAssignment {
                        team,
                        category,
                        role: role.to_string(),
                    },
                );
                Ok(SeasonWrite::Recorded)
            }
        }
    }

    // ========================================================================
    // REMOVAL / ABSORPTION / PROMOTION
    // ========================================================================

    /// Remove an identity and every key pointing at it
    pub fn remove(&mut self, id: &PersonId) -> Option<PersonIdentity> {
        let removed = self.by_id.remove(id)?;
        self.by_key.retain(|_, target| target != id);
        Some(removed)
    }

    /// Absorb `secondary` into `primary`: missing seasons copied, empty
    /// scalar fields filled, keys re-pointed, secondary deleted.
    pub fn absorb(&mut self, primary: &PersonId, secondary: &PersonId) -> Result<AbsorbOutcome> {
        let primary = self.canonical_id(primary);
        let secondary = self.canonical_id(secondary);
        if primary == secondary {
            return Err(Error::SelfMerge(primary.to_string()));
        }
        if !self.by_id.contains_key(&primary) {
            return Err(Error::UnknownIdentity(primary.to_string()));
        }

        let absorbed = self
            .by_id
            .remove(&secondary)
            .ok_or_else(|| Error::UnknownIdentity(secondary.to_string()))?;

        let target = self
            .by_id
            .get_mut(&primary)
            .ok_or_else(|| Error::UnknownIdentity(primary.to_string()))?;
        let seasons_copied = target.absorb_seasons(&absorbed);
        let fields_filled = target.fill_empty_from(&absorbed);

        self.repoint(&secondary, &primary, RedirectKind::Merged);
        debug!(primary = %primary, secondary = %secondary, seasons_copied, "absorbed identity");

        Ok(AbsorbOutcome {
            primary,
            secondary,
            seasons_copied,
            fields_filled,
        })
    }

    /// Move a synthetic identity onto an authoritative id. The name is taken
    /// from the authoritative record; gender is taken when supplied;
    /// birthdate only fills an empty one.
    pub fn promote(
        &mut self,
        synthetic: &PersonId,
        authoritative: &PersonId,
        name: &str,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
    ) -> Result<()> {
        let from = self.canonical_id(synthetic);
        if self.by_id.contains_key(authoritative) || self.redirects.contains_key(authoritative) {
            return Err(Error::IdConflict(authoritative.to_string()));
        }

        let mut person = self
            .by_id
            .remove(&from)
            .ok_or_else(|| Error::UnknownIdentity(from.to_string()))?;

        person.id = authoritative.clone();
        person.source_kind = SourceKind::Authoritative;
        person.promoted_from = Some(from.clone());
        if !name.trim().is_empty() {
            person.canonical_name = name.trim().to_string();
        }
        if gender.is_some() {
            person.gender = gender;
        }
        if person.birthdate.is_none() {
            person.birthdate = birthdate;
        }

        let (name, nickname) = (person.canonical_name.clone(), person.nickname.clone());
        self.by_id.insert(authoritative.clone(), person);
        self.repoint(&from, authoritative, RedirectKind::Promoted);
        self.register_keys(authoritative, &name, &nickname);
        debug!(from = %from, to = %authoritative, "promoted synthetic identity");
        Ok(())
    }

    fn repoint(&mut self, from: &PersonId, to: &PersonId, kind: RedirectKind) {
        for target in self.by_key.values_mut() {
            if target == from {
                *target = to.clone();
            }
        }
        for redirect in self.redirects.values_mut() {
            if &redirect.target == from {
                redirect.target = to.clone();
            }
        }
        self.redirects.insert(
            from.clone(),
            Redirect {
                target: to.clone(),
                kind,
            },
        );
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Drop identities without any season (recorded), then mark the rest
    /// retained. Returns the dropped ids.
    pub fn finalize(&mut self) -> Vec<PersonId> {
        let dropped: Vec<PersonId> = self
            .by_id
            .values()
            .filter(|p| !p.has_seasons())
            .map(|p| p.id.clone())
            .collect();

        for id in &dropped {
            self.remove(id);
            self.diagnostics.record(DiagnosticEvent::Dropped {
                id: id.clone(),
                reason: "no season assignment".to_string(),
            });
        }

        self.finalized = true;
        dropped
    }

    /// Identities with at least one season, ordered by id
    pub fn export(&self) -> Vec<PersonIdentity> {
        self.by_id
            .values()
            .filter(|p| p.has_seasons())
            .cloned()
            .collect()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
