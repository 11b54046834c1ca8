// 🔄 Pipeline - One batch run from sightings to the final identity list
//
// Stage order is part of correctness:
//   1. ingest sources, authoritative-id sources first
//   2. curated merge pass
//   3. automatic reconciliation pass
//   4. curated pass again (directives naming freshly promoted ids)
//   5. drop seasonless identities, export
//
// A failing source or row is recorded and skipped. Only a run with no
// usable sighting at all fails.

use crate::config::RunConfig;
use crate::diagnostics::{suggest_missed_matches, DiagnosticEvent, Diagnostics, MatchSuggestion};
use crate::entities::{PersonId, PersonIdentity, TeamNormalizer};
use crate::error::{Error, Result};
use crate::keys::KeyGenerator;
use crate::matching::{resolve_by_name, MatchQuery, Matcher};
use crate::merge::{CuratedReport, DirectiveSet, MergeDirective, MergeEngine};
use crate::names;
use crate::reconciliation::{AuthoritativeRoster, ReconciliationEngine, ReconciliationReport};
use crate::registry::{IdentityRegistry, SyntheticIds};
use crate::sources::{CsvSightingSource, Sighting, SightingKind, SightingSource};
use crate::tally::SeasonTally;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// RUN OUTPUT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources_read: usize,
    pub sources_failed: usize,
    pub sightings_ingested: usize,
    pub rows_rejected: usize,
    pub curated: CuratedReport,
    pub curated_second_pass: CuratedReport,
    pub reconciliation: ReconciliationReport,
    pub dropped: usize,
    pub identities: usize,
    pub authoritative: usize,
    pub synthetic: usize,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} identities ({} authoritative, {} synthetic) from {} sightings in {} sources; \
             {} rows rejected, {} sources failed, {} curated merges, {} promoted, {} auto-merged, {} dropped",
            self.identities,
            self.authoritative,
            self.synthetic,
            self.sightings_ingested,
            self.sources_read,
            self.rows_rejected,
            self.sources_failed,
            self.curated.applied + self.curated_second_pass.applied,
            self.reconciliation.promoted,
            self.reconciliation.merged,
            self.dropped,
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Identities with at least one season, ordered by id
    pub identities: Vec<PersonIdentity>,
    pub diagnostics: Diagnostics,
    pub summary: RunSummary,
    pub suggestions: Vec<MatchSuggestion>,
    pub tally: SeasonTally,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    keys: KeyGenerator,
    teams: TeamNormalizer,
    synthetic: SyntheticIds,
    matcher: Matcher,
    reconciliation: ReconciliationEngine,
    directives: Vec<MergeDirective>,
    roster: Option<AuthoritativeRoster>,

    /// Problems found before the run started (unreadable roster)
    preflight: Vec<DiagnosticEvent>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            keys: KeyGenerator::new(),
            teams: TeamNormalizer::default(),
            synthetic: SyntheticIds::default(),
            matcher: Matcher::new(),
            reconciliation: ReconciliationEngine::new(),
            directives: Vec::new(),
            roster: None,
            preflight: Vec::new(),
        }
    }

    /// Pipeline as described by a run config. The directive file must load;
    /// an unreadable roster is recorded and the run goes on without it.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let directives = match &config.merge.directives {
            Some(path) => {
                DirectiveSet::load(path)
                    .map_err(|e| Error::Config(format!("merge directives {}: {}", path.display(), e)))?
                    .directives
            }
            None => Vec::new(),
        };

        let mut pipeline = Pipeline::new()
            .with_synthetic_ids(config.synthetic_ids())
            .with_teams(TeamNormalizer::new(config.teams.org_prefix.clone()))
            .with_directives(directives);

        if let Some(roster) = &config.roster {
            match AuthoritativeRoster::from_path(&roster.path, &pipeline.keys) {
                Ok(loaded) => {
                    info!(members = loaded.len(), path = %roster.path.display(), "roster loaded");
                    pipeline.roster = Some(loaded);
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(path = %roster.path.display(), %reason, "roster unreadable");
                    pipeline.preflight.push(DiagnosticEvent::SourceUnreadable {
                        source: "roster".to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(pipeline)
    }

    pub fn with_teams(mut self, teams: TeamNormalizer) -> Self {
        self.teams = teams;
        self
    }

    pub fn with_synthetic_ids(mut self, synthetic: SyntheticIds) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn with_directives(mut self, directives: Vec<MergeDirective>) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_roster(mut self, roster: AuthoritativeRoster) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn run(&self, sources: &[Box<dyn SightingSource>]) -> Result<RunOutput> {
        let mut registry =
            IdentityRegistry::with_parts(self.keys.clone(), self.teams.clone(), self.synthetic.clone());
        for event in &self.preflight {
            registry.diagnostics_mut().record(event.clone());
        }

        let mut summary = RunSummary::default();
        self.ingest_all(&mut registry, sources, &mut summary);

        if summary.sightings_ingested == 0 {
            return Err(Error::NoUsableInput(format!(
                "{} sources, {} readable, no usable sighting",
                sources.len(),
                summary.sources_read
            )));
        }

        let roster = self.roster.as_ref();
        if let Some(roster) = roster {
            for rejection in &roster.rejected {
                registry.diagnostics_mut().record(DiagnosticEvent::RowMalformed {
                    source: "roster".to_string(),
                    row: rejection.row,
                    reason: rejection.reason.clone(),
                });
            }
        }

        let mut merge = MergeEngine::new();
        summary.curated = merge.run_curated(&mut registry, &self.directives);
        summary.reconciliation = self.reconciliation.run(&mut registry, roster)?;
        summary.curated_second_pass = merge.run_curated(&mut registry, &self.directives);
        merge.finish(&mut registry);

        summary.dropped = registry.finalize().len();
        let suggestions = suggest_missed_matches(&registry);
        let identities = registry.export();
        let tally = SeasonTally::from_identities(&identities);

        summary.identities = identities.len();
        summary.synthetic = identities.iter().filter(|p| p.is_synthetic()).count();
        summary.authoritative = summary.identities - summary.synthetic;

        info!(
            identities = summary.identities,
            synthetic = summary.synthetic,
            suggestions = suggestions.len(),
            diagnostics = registry.diagnostics().events.len(),
            "run complete"
        );

        Ok(RunOutput {
            identities,
            diagnostics: registry.diagnostics().clone(),
            summary,
            suggestions,
            tally,
        })
    }

    // ========================================================================
    // INGEST
    // ========================================================================

    fn ingest_all(
        &self,
        registry: &mut IdentityRegistry,
        sources: &[Box<dyn SightingSource>],
        summary: &mut RunSummary,
    ) {
        for source in order_sources(sources, registry.diagnostics_mut()) {
            let batch = match source.read() {
                Ok(batch) => batch,
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(source = source.name(), %reason, "source unreadable");
                    summary.sources_failed += 1;
                    registry.diagnostics_mut().record(DiagnosticEvent::SourceUnreadable {
                        source: source.name().to_string(),
                        reason,
                    });
                    continue;
                }
            };
            summary.sources_read += 1;

            for rejection in batch.rejected {
                summary.rows_rejected += 1;
                registry.diagnostics_mut().record(DiagnosticEvent::RowMalformed {
                    source: source.name().to_string(),
                    row: rejection.row,
                    reason: rejection.reason,
                });
            }

            let mut ingested = 0;
            for (row, sighting) in batch.sightings {
                match self.ingest(registry, source.name(), row, &sighting) {
                    Ok(()) => ingested += 1,
                    Err(reason) => {
                        summary.rows_rejected += 1;
                        registry.diagnostics_mut().record(DiagnosticEvent::RowMalformed {
                            source: source.name().to_string(),
                            row,
                            reason,
                        });
                    }
                }
            }

            summary.sightings_ingested += ingested;
            info!(
                source = source.name(),
                authoritative = source.is_authoritative(),
                ingested,
                identities = registry.len(),
                "source ingested"
            );
        }
    }

    /// Route one sighting. `Err` carries the rejection reason.
    fn ingest(
        &self,
        registry: &mut IdentityRegistry,
        source: &str,
        row: usize,
        sighting: &Sighting,
    ) -> std::result::Result<(), String> {
        match sighting.kind {
            SightingKind::Retirement => {
                let Some(id) = resolve_existing(registry, sighting) else {
                    registry.diagnostics_mut().record(DiagnosticEvent::UnknownIdentity {
                        id: sighting
                            .stable_source_id
                            .clone()
                            .unwrap_or_else(|| sighting.raw_name.clone()),
                        context: format!("retirement notice {}:{}", source, row),
                    });
                    return Ok(());
                };
                registry
                    .mark_retired(&id, &sighting.season)
                    .map_err(|e| e.to_string())
            }

            SightingKind::Correction => {
                let Some(id) = resolve_existing(registry, sighting) else {
                    registry.diagnostics_mut().record(DiagnosticEvent::UnmatchedCorrection {
                        source: source.to_string(),
                        row,
                        name: sighting.raw_name.clone(),
                    });
                    return Ok(());
                };
                registry
                    .override_season(
                        &id,
                        &sighting.season,
                        &sighting.raw_team,
                        sighting.category.as_deref(),
                        sighting.role.as_deref(),
                    )
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }

            SightingKind::Roster => {
                let id = match &sighting.stable_source_id {
                    Some(stable) => self.register_stable(registry, stable, sighting)?,
                    None => self.match_name_only(registry, sighting)?,
                };
                registry
                    .add_season(
                        &id,
                        &sighting.season,
                        &sighting.raw_team,
                        sighting.category.as_deref(),
                        sighting.role.as_deref(),
                    )
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn register_stable(
        &self,
        registry: &mut IdentityRegistry,
        stable: &str,
        sighting: &Sighting,
    ) -> std::result::Result<PersonId, String> {
        let known = registry.contains(&registry.canonical_id(&PersonId::new(stable.trim())));
        if sighting.raw_name.trim().is_empty() && !known {
            return Err(format!("id {} without a name is not known yet", stable));
        }
        Ok(registry.register_with_id(
            stable,
            &sighting.raw_name,
            &sighting.nickname,
            sighting.gender,
            sighting.birthdate,
        ))
    }

    fn match_name_only(
        &self,
        registry: &mut IdentityRegistry,
        sighting: &Sighting,
    ) -> std::result::Result<PersonId, String> {
        if !names::looks_like_person_name(&sighting.raw_name) {
            return Err(format!("'{}' is not a person name", sighting.raw_name));
        }

        let parsed = names::parse_name_with_hint(&sighting.raw_name, Some(&sighting.nickname));
        if parsed.is_parse_failure() {
            return Err(format!("'{}' has no usable surname", sighting.raw_name));
        }
        let derived = registry
            .keys()
            .derive(&parsed.surname, &[parsed.given.as_str(), sighting.nickname.as_str()]);
        if derived.is_empty() {
            return Err(format!("'{}' yields no match key", sighting.raw_name));
        }

        let query = MatchQuery::new(sighting.raw_name.clone(), sighting.nickname.clone())
            .with_gender(sighting.gender)
            .with_birthdate(sighting.birthdate);
        self.matcher
            .find_or_create(registry, &query)
            .map(|resolution| resolution.id)
            .map_err(|e| e.to_string())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Sightings sources for a run config, in configured order
pub fn sources_from_config(config: &RunConfig) -> Vec<Box<dyn SightingSource>> {
    config
        .sources
        .iter()
        .map(|s| {
            Box::new(CsvSightingSource::new(s.name.clone(), s.path.clone(), s.authoritative))
                as Box<dyn SightingSource>
        })
        .collect()
}

/// Stable reorder: authoritative sources first, configured order otherwise.
/// A name-only source listed ahead of an authoritative one is recorded.
fn order_sources<'a>(
    sources: &'a [Box<dyn SightingSource>],
    diagnostics: &mut Diagnostics,
) -> Vec<&'a dyn SightingSource> {
    for (i, source) in sources.iter().enumerate() {
        if !source.is_authoritative() && sources[i + 1..].iter().any(|s| s.is_authoritative()) {
            warn!(source = source.name(), "name-only source moved behind authoritative sources");
            diagnostics.record(DiagnosticEvent::SourceReordered {
                source: source.name().to_string(),
            });
        }
    }

    let mut ordered: Vec<&dyn SightingSource> = sources.iter().map(|s| s.as_ref()).collect();
    ordered.sort_by_key(|s| !s.is_authoritative());
    ordered
}

/// Existing identity for a correction or retirement row; never creates one
fn resolve_existing(registry: &IdentityRegistry, sighting: &Sighting) -> Option<PersonId> {
    if let Some(stable) = &sighting.stable_source_id {
        let id = registry.canonical_id(&PersonId::new(stable.trim()));
        return registry.contains(&id).then_some(id);
    }

    let parsed = names::parse_name(&sighting.raw_name);
    if parsed.is_parse_failure() {
        return None;
    }
    let found = [parsed.given.as_str(), sighting.nickname.as_str()]
        .into_iter()
        .filter(|g| !g.trim().is_empty())
        .find_map(|given| resolve_by_name(registry, &parsed.surname, given));
    found
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{categorize_team, Gender};
    use crate::merge::IdentitySpec;
    use crate::reconciliation::RosterMember;
    use crate::sources::MemorySource;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn source(name: &str, authoritative: bool, sightings: Vec<Sighting>) -> Box<dyn SightingSource> {
        Box::new(MemorySource::new(name, authoritative, sightings))
    }

    fn teams_sheet() -> Box<dyn SightingSource> {
        source(
            "teams-2021",
            true,
            vec![Sighting::new("Jansen, J. (Jan)", "2021-2022", "A3")
                .with_id("N123")
                .with_nickname("Jan")
                .with_gender(Some(Gender::Male))
                .with_birthdate(date(2005, 4, 1))],
        )
    }

    #[test]
    fn test_authoritative_sources_are_ingested_first() {
        let sources = vec![
            source(
                "opstelling-2019",
                false,
                vec![Sighting::new("Jansen, Jan", "2019-2020", "B1")],
            ),
            teams_sheet(),
        ];

        let output = Pipeline::new().run(&sources).unwrap();

        assert_eq!(output.identities.len(), 1);
        let jan = &output.identities[0];
        assert_eq!(jan.id.as_str(), "N123");
        assert_eq!(jan.seasons.len(), 2);
        assert_eq!(output.diagnostics.count("source_reordered"), 1);
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let build = || {
            vec![
                teams_sheet(),
                source(
                    "opstelling-2012",
                    false,
                    vec![
                        Sighting::new("Piet Bakker", "2012-2013", "S4"),
                        Sighting::new("Kees Koning", "2012-2013", "S5"),
                        Sighting::new("Piet Bakker", "2013-2014", "S3"),
                    ],
                ),
            ]
        };

        let first = Pipeline::new().run(&build()).unwrap();
        let second = Pipeline::new().run(&build()).unwrap();

        assert_eq!(first.identities, second.identities);
        let ids: Vec<&str> = first.identities.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["N123", "OW-0001", "OW-0002"]);
        assert_eq!(first.identities[1].seasons.len(), 2);
    }

    #[test]
    fn test_no_usable_input_fails_the_run() {
        let sources = vec![
            Box::new(CsvSightingSource::new("ghost", "/nonexistent/ghost.csv", true))
                as Box<dyn SightingSource>,
        ];
        assert!(matches!(Pipeline::new().run(&sources), Err(Error::NoUsableInput(_))));
        assert!(matches!(Pipeline::new().run(&[]), Err(Error::NoUsableInput(_))));
    }

    #[test]
    fn test_unreadable_source_is_isolated() {
        let sources = vec![
            Box::new(CsvSightingSource::new("ghost", "/nonexistent/ghost.csv", true))
                as Box<dyn SightingSource>,
            teams_sheet(),
        ];
        let output = Pipeline::new().run(&sources).unwrap();
        assert_eq!(output.summary.sources_failed, 1);
        assert_eq!(output.identities.len(), 1);
        assert_eq!(output.diagnostics.count("source_unreadable"), 1);
    }

    #[test]
    fn test_supplied_category_is_kept() {
        let sources = vec![source(
            "teams-2018",
            true,
            vec![
                Sighting::new("Visser, Diana", "2018-2019", "S2")
                    .with_id("N77")
                    .with_category("Recreanten"),
                Sighting::new("Visser, Diana", "2019-2020", "S2").with_id("N77"),
            ],
        )];
        let output = Pipeline::new().run(&sources).unwrap();

        let diana = &output.identities[0];
        assert_eq!(diana.seasons["2018-2019"].category, "Recreanten");
        assert_eq!(diana.seasons["2019-2020"].category, categorize_team("S2"));
    }

    #[test]
    fn test_label_rows_are_rejected() {
        let sources = vec![source(
            "opstelling-2015",
            false,
            vec![
                Sighting::new("Trainers", "2015-2016", "S1"),
                Sighting::new("S5 S6", "2015-2016", "S1"),
                Sighting::new("Mila de Graaf", "2015-2016", "S1"),
            ],
        )];
        let output = Pipeline::new().run(&sources).unwrap();
        assert_eq!(output.identities.len(), 1);
        assert_eq!(output.summary.rows_rejected, 2);
        assert_eq!(output.diagnostics.count("row_malformed"), 2);
    }

    #[test]
    fn test_corrections_override_and_unmatched_are_recorded() {
        let sources = vec![
            teams_sheet(),
            source(
                "corrections",
                false,
                vec![
                    Sighting::new("Jansen, Jan", "2021-2022", "B1").with_kind(SightingKind::Correction),
                    Sighting::new("Nobody Known", "2021-2022", "S1").with_kind(SightingKind::Correction),
                ],
            ),
        ];
        let output = Pipeline::new().run(&sources).unwrap();

        let jan = &output.identities[0];
        assert_eq!(jan.seasons["2021-2022"].team, "B1");
        assert_eq!(output.identities.len(), 1);
        assert_eq!(output.diagnostics.count("unmatched_correction"), 1);
    }

    #[test]
    fn test_retirement_and_seasonless_drop() {
        let sources = vec![
            teams_sheet(),
            source(
                "stoppers",
                true,
                vec![
                    Sighting::new("", "2022-2023", "").with_id("N123").with_kind(SightingKind::Retirement),
                    Sighting::new("", "2022-2023", "").with_id("N999").with_kind(SightingKind::Retirement),
                    Sighting::new("Bakker, Piet", "2022-2023", "stopt").with_id("N500"),
                ],
            ),
        ];
        let output = Pipeline::new().run(&sources).unwrap();

        assert_eq!(output.identities.len(), 1);
        assert_eq!(output.identities[0].retired_season.as_deref(), Some("2022-2023"));
        assert_eq!(output.diagnostics.count("unknown_identity"), 1);
        assert_eq!(output.summary.dropped, 1);
        assert_eq!(output.diagnostics.count("dropped"), 1);
    }

    #[test]
    fn test_full_flow_curated_then_promotion() {
        let sources = vec![
            teams_sheet(),
            source(
                "opstelling-2010",
                false,
                vec![
                    Sighting::new("Babette Meuhlhaus", "2010-2011", "A1")
                        .with_birthdate(date(1993, 2, 2)),
                    Sighting::new("Babette Meulhaus", "2011-2012", "S1"),
                ],
            ),
        ];
        let directives = vec![MergeDirective {
            primary: IdentitySpec::Name {
                surname: "Meuhlhaus".to_string(),
                given: "Babette".to_string(),
            },
            secondary: IdentitySpec::Name {
                surname: "Meulhaus".to_string(),
                given: "Babette".to_string(),
            },
            note: None,
        }];
        let roster = AuthoritativeRoster::new(
            vec![RosterMember {
                id: PersonId::new("NGD97S8"),
                name: "Meuhlhaus, Babette".to_string(),
                gender: Some(Gender::Female),
                birthdate: date(1993, 2, 2),
                member_since: None,
                member_until: None,
            }],
            &KeyGenerator::new(),
        );

        let output = Pipeline::new()
            .with_directives(directives)
            .with_roster(roster)
            .run(&sources)
            .unwrap();

        assert_eq!(output.summary.curated.applied, 1);
        assert_eq!(output.summary.reconciliation.promoted, 1);
        let ids: Vec<&str> = output.identities.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["N123", "NGD97S8"]);

        let babette = &output.identities[1];
        assert_eq!(babette.seasons.len(), 2);
        assert_eq!(babette.gender, Some(Gender::Female));
        assert_eq!(output.summary.synthetic, 0);
        assert_eq!(output.tally.season("2021-2022").unwrap().male, 1);
    }

    #[test]
    fn test_roster_match_on_curated_away_id_merges_into_survivor() {
        let sources = vec![
            source(
                "teams-2022",
                true,
                vec![
                    Sighting::new("Valk, Marlies", "2021-2022", "S2").with_id("NKK27G4"),
                    Sighting::new("Valk, M.E.", "2022-2023", "S2").with_id("NML43T8"),
                ],
            ),
            source(
                "opstelling-2016",
                false,
                vec![Sighting::new("Marly Valk", "2016-2017", "B1").with_birthdate(date(2004, 5, 6))],
            ),
        ];
        let directives = vec![MergeDirective {
            primary: IdentitySpec::Id { id: "NKK27G4".to_string() },
            secondary: IdentitySpec::Id { id: "NML43T8".to_string() },
            note: None,
        }];
        let roster = AuthoritativeRoster::new(
            vec![RosterMember {
                id: PersonId::new("NML43T8"),
                name: "Valk, M.E.".to_string(),
                gender: Some(Gender::Female),
                birthdate: date(2004, 5, 6),
                member_since: None,
                member_until: None,
            }],
            &KeyGenerator::new(),
        );

        let output = Pipeline::new()
            .with_directives(directives)
            .with_roster(roster)
            .run(&sources)
            .unwrap();

        assert_eq!(output.summary.curated.applied, 1);
        assert_eq!(output.summary.reconciliation.merged, 1);
        assert_eq!(output.identities.len(), 1);
        let marlies = &output.identities[0];
        assert_eq!(marlies.id.as_str(), "NKK27G4");
        assert_eq!(marlies.seasons.len(), 3);
    }

    #[test]
    fn test_run_from_config_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("teams.csv"),
            "id,name,nickname,gender,birthdate,season,team\n\
             N123,\"Jansen, J. (Jan)\",Jan,M,2005-04-01,2021-2022,A3\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("opstelling.csv"),
            "name,season,team\n\
             \"Jansen, Jan\",2020-2021,B2\n\
             Daphne Bruijn,2020-2021,S6x1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("merge.toml"),
            "[[directive]]\nprimary = { id = \"N123\" }\nsecondary = { id = \"N404\" }\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("run.toml"),
            r#"
                [[sources]]
                name = "opstelling"
                path = "opstelling.csv"

                [[sources]]
                name = "teams"
                path = "teams.csv"
                authoritative = true

                [roster]
                path = "missing-roster.csv"

                [merge]
                directives = "merge.toml"
            "#,
        )
        .unwrap();

        let config = RunConfig::load(&dir.path().join("run.toml")).unwrap();
        let pipeline = Pipeline::from_config(&config).unwrap();
        let output = pipeline.run(&sources_from_config(&config)).unwrap();

        let ids: Vec<&str> = output.identities.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["N123", "OW-0001"]);
        assert_eq!(output.identities[0].seasons.len(), 2);
        assert_eq!(output.identities[1].seasons["2020-2021"].team, "S6");

        // Missing roster recorded, run continued; directive could not resolve
        assert_eq!(output.diagnostics.count("source_unreadable"), 1);
        assert_eq!(output.diagnostics.count("source_reordered"), 1);
        assert_eq!(output.summary.curated.skipped, 1);
        assert_eq!(output.summary.curated_second_pass.skipped, 1);
        assert_eq!(output.diagnostics.count("directive_unresolvable"), 1);
    }
}
