// 🎯 Multi-Pass Matcher - find-or-create over ordered strategies
//
// Strategies run in priority order and the first unique hit wins:
//   1. exact key       {full, root surname} × {given, nickname}
//   2. simplified key  {full, root surname} × first word of {given, nickname}
//   3. fuzzy key       folded surname × {given, nickname}
//   4. birthdate + normalized surname  (scan, only with a birthdate)
//   5. birthdate + folded surname      (scan, only with a birthdate)
//
// A strategy that finds more than one distinct identity is ambiguous:
// it is recorded and the next strategy runs. Nothing is ever guessed.

use crate::diagnostics::DiagnosticEvent;
use crate::entities::{Enrichment, Gender, PersonId};
use crate::error::Result;
use crate::keys::{KeyGenerator, MatchKey};
use crate::names::{self, ParsedName};
use crate::registry::IdentityRegistry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// QUERY
// ============================================================================

/// One name-only sighting to resolve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
    pub name: String,
    pub nickname: String,
    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
}

impl MatchQuery {
    pub fn new(name: impl Into<String>, nickname: impl Into<String>) -> Self {
        MatchQuery {
            name: name.into(),
            nickname: nickname.into(),
            ..Default::default()
        }
    }

    pub fn with_gender(mut self, gender: Option<Gender>) -> Self {
        self.gender = gender;
        self
    }

    pub fn with_birthdate(mut self, birthdate: Option<NaiveDate>) -> Self {
        self.birthdate = birthdate;
        self
    }
}

/// Query with the name parsed once and every variant precomputed
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub parsed: ParsedName,

    /// Full surname, then the particle-stripped root when it differs
    pub surnames: Vec<String>,

    /// Parsed given name, then the nickname when it differs
    pub givens: Vec<String>,

    pub normalized_surname: String,

    /// Empty when the fold leaves nothing
    pub folded_surname: String,

    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
}

impl PreparedQuery {
    pub fn new(keys: &KeyGenerator, query: &MatchQuery) -> Self {
        let parsed = names::parse_name_with_hint(&query.name, Some(&query.nickname));

        let mut surnames = vec![parsed.surname.clone()];
        if let Some(root) = parsed.root_surname() {
            surnames.push(root);
        }

        let mut givens = Vec::new();
        for given in [parsed.given.trim(), query.nickname.trim()] {
            if !given.is_empty() && !givens.iter().any(|g: &String| g == given) {
                givens.push(given.to_string());
            }
        }

        PreparedQuery {
            normalized_surname: names::normalize(&parsed.surname),
            folded_surname: keys.fold_surname(&parsed.surname),
            parsed,
            surnames,
            givens,
            gender: query.gender,
            birthdate: query.birthdate,
        }
    }

    /// Exact keys for the full surname and every given variant
    pub fn exact_keys(&self, keys: &KeyGenerator) -> Vec<MatchKey> {
        self.givens
            .iter()
            .filter_map(|g| keys.exact(&self.parsed.surname, g))
            .collect()
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    ExactKey,
    SimplifiedKey,
    FuzzyKey,
    BirthdateSurname,
    BirthdateFuzzySurname,
}

impl MatchPass {
    pub fn is_birthdate_assisted(&self) -> bool {
        matches!(self, MatchPass::BirthdateSurname | MatchPass::BirthdateFuzzySurname)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPass::ExactKey => "exact_key",
            MatchPass::SimplifiedKey => "simplified_key",
            MatchPass::FuzzyKey => "fuzzy_key",
            MatchPass::BirthdateSurname => "birthdate_surname",
            MatchPass::BirthdateFuzzySurname => "birthdate_fuzzy_surname",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Hit(PersonId),
    Miss,
    Ambiguous(Vec<PersonId>),
}

impl StrategyOutcome {
    /// Collapse a candidate list (already in scan order) into an outcome
    pub fn from_candidates(mut candidates: Vec<PersonId>) -> Self {
        let mut seen = Vec::with_capacity(candidates.len());
        candidates.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(id.clone());
                true
            }
        });

        match candidates.len() {
            0 => StrategyOutcome::Miss,
            1 => StrategyOutcome::Hit(candidates.remove(0)),
            _ => StrategyOutcome::Ambiguous(candidates),
        }
    }
}

/// One lookup strategy. Read-only against the registry so each can be
/// tested on its own and reordered freely.
pub trait MatchStrategy: Send + Sync {
    fn pass(&self) -> MatchPass;

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome;
}

fn lookup_all(registry: &IdentityRegistry, keys: impl IntoIterator<Item = MatchKey>) -> StrategyOutcome {
    let candidates = keys
        .into_iter()
        .filter_map(|k| registry.lookup_id_by_key(&k))
        .collect();
    StrategyOutcome::from_candidates(candidates)
}

pub struct ExactKeyStrategy;

impl MatchStrategy for ExactKeyStrategy {
    fn pass(&self) -> MatchPass {
        MatchPass::ExactKey
    }

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome {
        let keys = registry.keys();
        let candidates = query.surnames.iter().flat_map(|s| {
            query.givens.iter().filter_map(move |g| keys.exact(s, g))
        });
        lookup_all(registry, candidates.collect::<Vec<_>>())
    }
}

pub struct SimplifiedKeyStrategy;

impl MatchStrategy for SimplifiedKeyStrategy {
    fn pass(&self) -> MatchPass {
        MatchPass::SimplifiedKey
    }

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome {
        let keys = registry.keys();
        let candidates = query.surnames.iter().flat_map(|s| {
            query.givens.iter().filter_map(move |g| keys.simplified(s, g))
        });
        lookup_all(registry, candidates.collect::<Vec<_>>())
    }
}

pub struct FuzzyKeyStrategy;

impl MatchStrategy for FuzzyKeyStrategy {
    fn pass(&self) -> MatchPass {
        MatchPass::FuzzyKey
    }

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome {
        let keys = registry.keys();
        let candidates: Vec<MatchKey> = query
            .givens
            .iter()
            .filter_map(|g| keys.fuzzy(&query.parsed.surname, g))
            .collect();
        lookup_all(registry, candidates)
    }
}

pub struct BirthdateSurnameStrategy;

impl MatchStrategy for BirthdateSurnameStrategy {
    fn pass(&self) -> MatchPass {
        MatchPass::BirthdateSurname
    }

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome {
        let (Some(birthdate), false) = (query.birthdate, query.normalized_surname.is_empty()) else {
            return StrategyOutcome::Miss;
        };
        let candidates = registry
            .iter()
            .filter(|p| p.birthdate == Some(birthdate))
            .filter(|p| p.normalized_surname() == query.normalized_surname)
            .map(|p| p.id.clone())
            .collect();
        StrategyOutcome::from_candidates(candidates)
    }
}

pub struct BirthdateFuzzySurnameStrategy;

impl MatchStrategy for BirthdateFuzzySurnameStrategy {
    fn pass(&self) -> MatchPass {
        MatchPass::BirthdateFuzzySurname
    }

    fn find(&self, registry: &IdentityRegistry, query: &PreparedQuery) -> StrategyOutcome {
        let (Some(birthdate), false) = (query.birthdate, query.folded_surname.is_empty()) else {
            return StrategyOutcome::Miss;
        };
        let keys = registry.keys();
        let candidates = registry
            .iter()
            .filter(|p| p.birthdate == Some(birthdate))
            .filter(|p| keys.fold_surname(&p.parsed_name().surname) == query.folded_surname)
            .map(|p| p.id.clone())
            .collect();
        StrategyOutcome::from_candidates(candidates)
    }
}

// ============================================================================
// MATCHER
// ============================================================================

/// Result of a read-only match attempt
#[derive(Debug, Clone, Default)]
pub struct MatchAttempt {
    pub hit: Option<(PersonId, MatchPass)>,
    pub ambiguous: Vec<(MatchPass, Vec<PersonId>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResolution {
    pub id: PersonId,

    /// Pass that found the identity; `None` when it was just created
    pub pass: Option<MatchPass>,
}

impl MatchResolution {
    pub fn created(&self) -> bool {
        self.pass.is_none()
    }
}

pub struct Matcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Matcher {
    /// The five standard strategies in precision order
    pub fn new() -> Self {
        Matcher {
            strategies: vec![
                Box::new(ExactKeyStrategy),
                Box::new(SimplifiedKeyStrategy),
                Box::new(FuzzyKeyStrategy),
                Box::new(BirthdateSurnameStrategy),
                Box::new(BirthdateFuzzySurnameStrategy),
            ],
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Matcher { strategies }
    }

    pub fn passes(&self) -> Vec<MatchPass> {
        self.strategies.iter().map(|s| s.pass()).collect()
    }

    /// Run strategies in order without touching the registry
    pub fn find(&self, registry: &IdentityRegistry, query: &MatchQuery) -> MatchAttempt {
        let prepared = PreparedQuery::new(registry.keys(), query);
        let mut attempt = MatchAttempt::default();

        for strategy in &self.strategies {
            match strategy.find(registry, &prepared) {
                StrategyOutcome::Hit(id) => {
                    attempt.hit = Some((id, strategy.pass()));
                    break;
                }
                StrategyOutcome::Ambiguous(candidates) => {
                    attempt.ambiguous.push((strategy.pass(), candidates));
                }
                StrategyOutcome::Miss => {}
            }
        }

        attempt
    }

    /// Find the identity for a name-only sighting, or mint a synthetic one.
    ///
    /// On a hit the identity's empty birthdate/gender are filled from the
    /// sighting. A birthdate-assisted hit also registers the sighting's
    /// exact keys on the identity so the next sighting hits at pass 1.
    pub fn find_or_create(
        &self,
        registry: &mut IdentityRegistry,
        query: &MatchQuery,
    ) -> Result<MatchResolution> {
        let attempt = self.find(registry, query);
        let was_ambiguous = !attempt.ambiguous.is_empty();

        for (pass, candidates) in attempt.ambiguous {
            debug!(name = %query.name, pass = pass.as_str(), count = candidates.len(), "ambiguous match");
            registry.diagnostics_mut().record(DiagnosticEvent::AmbiguousMatch {
                stage: pass.as_str().to_string(),
                subject: query.name.clone(),
                candidates,
            });
        }

        let Some((id, pass)) = attempt.hit else {
            // After an ambiguous miss the candidates keep their keys
            let id = if was_ambiguous {
                registry.create_synthetic_yielding(&query.name, &query.nickname, query.gender, query.birthdate)
            } else {
                registry.create_synthetic(&query.name, &query.nickname, query.gender, query.birthdate)
            };
            return Ok(MatchResolution { id, pass: None });
        };

        if let Some(birthdate) = query.birthdate {
            registry.enrich(&id, Enrichment::Birthdate(birthdate))?;
        }
        if let Some(gender) = query.gender {
            registry.enrich(&id, Enrichment::Gender(gender))?;
        }

        if pass.is_birthdate_assisted() {
            let prepared = PreparedQuery::new(registry.keys(), query);
            let learned = prepared.exact_keys(registry.keys());
            for key in learned {
                registry.register_key(key, &id);
            }
        }

        debug!(name = %query.name, id = %id, pass = pass.as_str(), "matched sighting");
        Ok(MatchResolution { id, pass: Some(pass) })
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a (surname, given) pair through exact → simplified → fuzzy key
/// lookup. Used by curated directives and correction rows.
pub fn resolve_by_name(registry: &IdentityRegistry, surname: &str, given: &str) -> Option<PersonId> {
    let keys = registry.keys();
    [
        keys.exact(surname, given),
        keys.simplified(surname, given),
        keys.fuzzy(surname, given),
    ]
    .into_iter()
    .flatten()
    .find_map(|key| registry.lookup_id_by_key(&key))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_finds_authoritative_identity_by_exact_key() {
        // Scenario 1
        let mut registry = IdentityRegistry::new();
        let n123 = registry.register_with_id(
            "N123",
            "Jansen, J. (Jan)",
            "Jan",
            Some(Gender::Male),
            date(2005, 4, 1),
        );
        registry.add_season(&n123, "2021-2022", "A3", None, None).unwrap();

        let matcher = Matcher::new();
        let query = MatchQuery::new("Jansen, Jan", "Jan").with_gender(Some(Gender::Male));
        let resolution = matcher.find_or_create(&mut registry, &query).unwrap();

        assert_eq!(resolution.id.as_str(), "N123");
        assert_eq!(resolution.pass, Some(MatchPass::ExactKey));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_or_create_is_idempotent() {
        let mut registry = IdentityRegistry::new();
        let matcher = Matcher::new();
        let query = MatchQuery::new("Piet Bakker", "")
            .with_gender(Some(Gender::Male))
            .with_birthdate(date(1999, 9, 9));

        let first = matcher.find_or_create(&mut registry, &query).unwrap();
        let second = matcher.find_or_create(&mut registry, &query).unwrap();

        assert!(first.created());
        assert!(!second.created());
        assert_eq!(first.id, second.id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_root_surname_variant_is_found() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N1", "Berg, Jan van der", "", None, None);
        let matcher = Matcher::new();

        let with_particles = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Jan van der Berg", ""))
            .unwrap();
        assert_eq!(with_particles.id, id);
    }

    #[test]
    fn test_fuzzy_spelling_variant_is_found() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N7", "Bruyn, Daphne", "Daphne", None, None);
        let matcher = Matcher::new();

        let resolution = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Daphne Bruijn", ""))
            .unwrap();
        assert_eq!(resolution.id, id);
        assert_eq!(resolution.pass, Some(MatchPass::FuzzyKey));
    }

    #[test]
    fn test_hit_fills_empty_fields_only() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N1", "Jansen, Jan", "", Some(Gender::Male), None);
        let matcher = Matcher::new();

        let query = MatchQuery::new("Jan Jansen", "")
            .with_gender(Some(Gender::Female))
            .with_birthdate(date(2005, 4, 1));
        matcher.find_or_create(&mut registry, &query).unwrap();

        let person = registry.get(&id).unwrap();
        assert_eq!(person.gender, Some(Gender::Male));
        assert_eq!(person.birthdate, date(2005, 4, 1));
    }

    #[test]
    fn test_birthdate_scan_learns_exact_key() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N9", "Koning, Kees", "", None, date(1980, 1, 2));
        let matcher = Matcher::new();

        // Different given name: no key hits, birthdate + surname does
        let query = MatchQuery::new("Cornelis Koning", "").with_birthdate(date(1980, 1, 2));
        let resolution = matcher.find_or_create(&mut registry, &query).unwrap();
        assert_eq!(resolution.id, id);
        assert_eq!(resolution.pass, Some(MatchPass::BirthdateSurname));

        // Learned key: same sighting without birthdate now hits at pass 1
        let again = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Cornelis Koning", ""))
            .unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.pass, Some(MatchPass::ExactKey));
    }

    #[test]
    fn test_birthdate_fuzzy_scan() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N10", "Dekkers, Anna", "", None, date(1990, 6, 1));
        let matcher = Matcher::new();

        let query = MatchQuery::new("Annelies Dekker", "").with_birthdate(date(1990, 6, 1));
        let resolution = matcher.find_or_create(&mut registry, &query).unwrap();
        assert_eq!(resolution.id, id);
        assert_eq!(resolution.pass, Some(MatchPass::BirthdateFuzzySurname));
    }

    #[test]
    fn test_birthdate_scan_needs_birthdate() {
        let mut registry = IdentityRegistry::new();
        registry.register_with_id("N9", "Koning, Kees", "", None, date(1980, 1, 2));
        let matcher = Matcher::new();

        let resolution = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Cornelis Koning", ""))
            .unwrap();
        assert!(resolution.created());
        assert!(resolution.id.as_str().starts_with("OW-"));
    }

    #[test]
    fn test_ambiguous_candidates_are_never_guessed() {
        let mut registry = IdentityRegistry::new();
        registry.register_with_id("N1", "Jansen, Jan", "", None, date(2000, 1, 1));
        registry.register_with_id("N2", "Jansen, Janneke", "", None, date(2000, 1, 1));
        let matcher = Matcher::new();

        // given "Jan" hits N1, nickname "Janneke" hits N2
        let query = MatchQuery::new("Jansen, Jan", "Janneke").with_birthdate(date(2000, 1, 1));
        let resolution = matcher.find_or_create(&mut registry, &query).unwrap();

        assert!(resolution.created());
        assert!(registry.diagnostics().count("ambiguous_match") >= 1);
    }

    #[test]
    fn test_synthetic_after_ambiguity_leaves_candidate_keys_alone() {
        let mut registry = IdentityRegistry::new();
        let n1 = registry.register_with_id("N1", "Jansen, Johannes (Hans)", "", None, None);
        let n2 = registry.register_with_id("N2", "Jansen, Johannes", "Joop", None, None);
        let matcher = Matcher::new();

        // given "Johannes" reaches N2, nickname "Hans" reaches N1
        let ambiguous = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Jansen, Johannes", "Hans"))
            .unwrap();
        assert!(ambiguous.created());
        assert!(registry.diagnostics().count("key_collision") >= 1);

        let hans = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Jansen, Hans", ""))
            .unwrap();
        assert_eq!(hans.id, n1);

        let johannes = matcher
            .find_or_create(&mut registry, &MatchQuery::new("Johannes Jansen", ""))
            .unwrap();
        assert_eq!(johannes.id, n2);
    }

    #[test]
    fn test_custom_strategy_order() {
        let mut registry = IdentityRegistry::new();
        registry.register_with_id("N1", "Jansen, Jan", "", None, None);
        let matcher = Matcher::with_strategies(vec![Box::new(FuzzyKeyStrategy)]);

        assert_eq!(matcher.passes(), vec![MatchPass::FuzzyKey]);
        let attempt = matcher.find(&registry, &MatchQuery::new("Jan Janssen", ""));
        assert_eq!(attempt.hit, Some((PersonId::new("N1"), MatchPass::FuzzyKey)));
    }

    #[test]
    fn test_resolve_by_name_cascade() {
        let mut registry = IdentityRegistry::new();
        let id = registry.register_with_id("N5", "Ooijen, Marloes van", "", None, None);

        assert_eq!(resolve_by_name(&registry, "Ooijen, Marloes van", ""), None);
        assert_eq!(resolve_by_name(&registry, "Ooijen", "Marloes van"), Some(id.clone()));
        assert_eq!(resolve_by_name(&registry, "Ooijen", "Marloes"), Some(id.clone()));
        assert_eq!(resolve_by_name(&registry, "Ooyen", "Marloes"), Some(id));
        assert_eq!(resolve_by_name(&registry, "Visser", "Marloes"), None);
    }

    #[test]
    fn test_outcome_from_candidates_dedups() {
        let a = PersonId::new("A");
        let b = PersonId::new("B");
        assert_eq!(StrategyOutcome::from_candidates(vec![]), StrategyOutcome::Miss);
        assert_eq!(
            StrategyOutcome::from_candidates(vec![a.clone(), a.clone()]),
            StrategyOutcome::Hit(a.clone())
        );
        assert_eq!(
            StrategyOutcome::from_candidates(vec![a.clone(), b.clone(), a.clone()]),
            StrategyOutcome::Ambiguous(vec![a, b])
        );
    }
}
