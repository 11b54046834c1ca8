// 🩺 Diagnostics - Audit trail of every skip, collision and merge decision
//
// Nothing in the resolution engine is fatal at row or directive level, so
// every decision that drops or reshapes data is recorded here instead.

use crate::entities::{season_years, PersonId, PersonIdentity};
use crate::names;
use crate::registry::IdentityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeVia {
    Curated,
    BirthdateSurname,
    BirthdateFuzzySurname,
    RosterKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Whole source could not be read
    SourceUnreadable { source: String, reason: String },

    /// Name-only source listed before an authoritative one; moved back
    SourceReordered { source: String },

    /// One row rejected; the rest of its source continues
    RowMalformed { source: String, row: usize, reason: String },

    /// Key already pointed at a different identity; last write won
    KeyCollision { key: String, previous: PersonId, current: PersonId },

    /// More than one candidate at a strategy; nothing was guessed
    AmbiguousMatch { stage: String, subject: String, candidates: Vec<PersonId> },

    /// Correction row that matched no identity
    UnmatchedCorrection { source: String, row: usize, name: String },

    /// Operation on an id the registry does not hold
    UnknownIdentity { id: String, context: String },

    /// Curated directive skipped
    DirectiveUnresolvable {
        index: usize,
        primary: String,
        secondary: String,
        reason: String,
    },

    Merged {
        primary: PersonId,
        secondary: PersonId,
        via: MergeVia,
        seasons_copied: usize,
    },

    Promoted { from: PersonId, to: PersonId },

    /// Automatic match found but the promote/merge was refused
    ReconciliationSkipped { id: PersonId, target: PersonId, reason: String },

    /// Removed at export: no season assignment left
    Dropped { id: PersonId, reason: String },
}

impl DiagnosticEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticEvent::SourceUnreadable { .. } => "source_unreadable",
            DiagnosticEvent::SourceReordered { .. } => "source_reordered",
            DiagnosticEvent::RowMalformed { .. } => "row_malformed",
            DiagnosticEvent::KeyCollision { .. } => "key_collision",
            DiagnosticEvent::AmbiguousMatch { .. } => "ambiguous_match",
            DiagnosticEvent::UnmatchedCorrection { .. } => "unmatched_correction",
            DiagnosticEvent::UnknownIdentity { .. } => "unknown_identity",
            DiagnosticEvent::DirectiveUnresolvable { .. } => "directive_unresolvable",
            DiagnosticEvent::Merged { .. } => "merged",
            DiagnosticEvent::Promoted { .. } => "promoted",
            DiagnosticEvent::ReconciliationSkipped { .. } => "reconciliation_skipped",
            DiagnosticEvent::Dropped { .. } => "dropped",
        }
    }
}

// ============================================================================
// DIAGNOSTICS LOG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn record(&mut self, event: DiagnosticEvent) {
        self.events.push(event);
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    /// Event counts by kind, sorted by kind
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .counts()
            .iter()
            .map(|(kind, n)| format!("{}={}", kind, n))
            .collect();
        format!("{} events ({})", self.events.len(), parts.join(", "))
    }
}

// ============================================================================
// MISSED-MATCH SUGGESTIONS
// ============================================================================

/// A synthetic identity that may belong to an authoritative one.
/// Reported for manual curation, never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub synthetic_id: PersonId,
    pub synthetic_name: String,
    pub candidate_id: PersonId,
    pub candidate_name: String,
    pub overlapping_seasons: Vec<String>,
    pub reason: String,
}

fn first_given_words(person: &PersonIdentity) -> BTreeSet<String> {
    person
        .given_variants()
        .iter()
        .filter_map(|v| names::first_word(v).map(names::normalize))
        .filter(|w| !w.is_empty())
        .collect()
}

fn prefix3(s: &str) -> String {
    s.chars().take(3).collect()
}

/// Seasons of `a` ending within one year of a season of `b` starting
fn seasons_adjacent(a: &PersonIdentity, b: &PersonIdentity) -> bool {
    a.seasons.keys().filter_map(|s| season_years(s)).any(|(_, a_end)| {
        b.seasons
            .keys()
            .filter_map(|s| season_years(s))
            .any(|(b_start, _)| (a_end - b_start).abs() <= 1)
    })
}

/// Look for authoritative candidates for every remaining synthetic identity:
/// 1. fuzzy surname + shared first given word
/// 2. equal birthdate + first three characters of the fuzzy fold
/// 3. (only when 1 and 2 found nothing) shared first given word + adjacent seasons
pub fn suggest_missed_matches(registry: &IdentityRegistry) -> Vec<MatchSuggestion> {
    let keys = registry.keys();
    let authoritative: Vec<&PersonIdentity> =
        registry.iter().filter(|p| !p.is_synthetic()).collect();

    let mut suggestions = Vec::new();

    for synthetic in registry.iter().filter(|p| p.is_synthetic()) {
        let fold = keys.fold_surname(&synthetic.parsed_name().surname);
        let given_words = first_given_words(synthetic);
        let mut found: Vec<MatchSuggestion> = Vec::new();

        let suggest = |candidate: &PersonIdentity, reason: String| MatchSuggestion {
            synthetic_id: synthetic.id.clone(),
            synthetic_name: synthetic.canonical_name.clone(),
            candidate_id: candidate.id.clone(),
            candidate_name: candidate.canonical_name.clone(),
            overlapping_seasons: synthetic
                .seasons
                .keys()
                .filter(|s| candidate.seasons.contains_key(*s))
                .cloned()
                .collect(),
            reason,
        };

        for candidate in authoritative.iter().copied() {
            let candidate_fold = keys.fold_surname(&candidate.parsed_name().surname);

            if !fold.is_empty()
                && fold == candidate_fold
                && !given_words.is_disjoint(&first_given_words(candidate))
            {
                found.push(suggest(candidate, format!("fuzzy surname ({})", fold)));
                continue;
            }

            if synthetic.birthdate.is_some()
                && synthetic.birthdate == candidate.birthdate
                && !fold.is_empty()
                && prefix3(&fold) == prefix3(&candidate_fold)
            {
                found.push(suggest(
                    candidate,
                    format!("birthdate + surname start ({})", prefix3(&fold)),
                ));
            }
        }

        if found.is_empty() {
            for candidate in authoritative.iter().copied() {
                let shared = given_words
                    .intersection(&first_given_words(candidate))
                    .next()
                    .cloned();
                if let Some(word) = shared {
                    if seasons_adjacent(synthetic, candidate) || seasons_adjacent(candidate, synthetic)
                    {
                        found.push(suggest(
                            candidate,
                            format!("adjacent seasons + given name ({})", word),
                        ));
                    }
                }
            }
        }

        suggestions.extend(found);
    }

    suggestions
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Gender;
    use chrono::NaiveDate;

    #[test]
    fn test_counts_and_summary() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(DiagnosticEvent::RowMalformed {
            source: "opstelling-2012".to_string(),
            row: 4,
            reason: "no name".to_string(),
        });
        diagnostics.record(DiagnosticEvent::RowMalformed {
            source: "opstelling-2012".to_string(),
            row: 9,
            reason: "no name".to_string(),
        });
        diagnostics.record(DiagnosticEvent::Promoted {
            from: PersonId::new("OW-0001"),
            to: PersonId::new("NAB12C3"),
        });

        assert_eq!(diagnostics.count("row_malformed"), 2);
        assert_eq!(diagnostics.count("promoted"), 1);
        assert_eq!(
            diagnostics.summary(),
            "3 events (promoted=1, row_malformed=2)"
        );
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = DiagnosticEvent::Dropped {
            id: PersonId::new("N1"),
            reason: "no seasons".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "dropped");
        assert_eq!(value["id"], "N1");
    }

    #[test]
    fn test_suggests_fuzzy_surname_candidate() {
        let mut registry = IdentityRegistry::new();
        let sl = registry.register_with_id("N100", "Bruyn, D. (Daphne)", "Daphne", Some(Gender::Female), None);
        registry.add_season(&sl, "2022-2023", "S2", None, None).unwrap();

        let ow = registry.create_synthetic("Daphne Bruijn", "", None, None);
        registry.add_season(&ow, "2015-2016", "B1", None, None).unwrap();

        let suggestions = suggest_missed_matches(&registry);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].synthetic_id, ow);
        assert_eq!(suggestions[0].candidate_id, sl);
        assert!(suggestions[0].reason.starts_with("fuzzy surname"));
    }

    #[test]
    fn test_suggests_birthdate_surname_start() {
        let mut registry = IdentityRegistry::new();
        let birthdate = NaiveDate::from_ymd_opt(2001, 2, 3);
        registry.register_with_id("N200", "Kamerman, Zoe", "Zoe", None, birthdate);
        registry.create_synthetic("Kamezman, Zoey", "", None, birthdate);

        let suggestions = suggest_missed_matches(&registry);
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].reason.starts_with("birthdate + surname start"));
    }

    #[test]
    fn test_suggests_adjacent_seasons_as_last_resort() {
        let mut registry = IdentityRegistry::new();
        let sl = registry.register_with_id("N300", "Haksteen-Opstal, Tamara", "Tamara", None, None);
        registry.add_season(&sl, "2019-2020", "S3", None, None).unwrap();

        let ow = registry.create_synthetic("Tamara Haksteen", "", None, None);
        registry.add_season(&ow, "2018-2019", "S4", None, None).unwrap();

        let suggestions = suggest_missed_matches(&registry);
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].reason.starts_with("adjacent seasons"));
    }

    #[test]
    fn test_no_suggestion_for_unrelated_people() {
        let mut registry = IdentityRegistry::new();
        let sl = registry.register_with_id("N400", "Visser, Diana", "Diana", None, None);
        registry.add_season(&sl, "2010-2011", "S1", None, None).unwrap();
        let ow = registry.create_synthetic("Piet Bakker", "", None, None);
        registry.add_season(&ow, "2020-2021", "S1", None, None).unwrap();

        assert!(suggest_missed_matches(&registry).is_empty());
    }
}
