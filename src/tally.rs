// 📊 Season Tally - Per-season head counts by team and gender
// Read-only view over the exported identity list.

use crate::entities::{Gender, PersonIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCount {
    #[serde(rename = "M")]
    pub male: usize,

    #[serde(rename = "V")]
    pub female: usize,

    pub unknown: usize,
}

impl TeamCount {
    pub fn total(&self) -> usize {
        self.male + self.female + self.unknown
    }

    fn add(&mut self, gender: Option<Gender>) {
        match gender {
            Some(Gender::Male) => self.male += 1,
            Some(Gender::Female) => self.female += 1,
            None => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonCount {
    pub total: usize,
    pub male: usize,
    pub female: usize,

    /// team code → counts, sorted by team
    pub teams: BTreeMap<String, TeamCount>,
}

/// season label → counts, sorted by season
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonTally(pub BTreeMap<String, SeasonCount>);

impl SeasonTally {
    pub fn from_identities(identities: &[PersonIdentity]) -> Self {
        let mut tally: BTreeMap<String, SeasonCount> = BTreeMap::new();

        for person in identities {
            for (season, assignment) in &person.seasons {
                let count = tally.entry(season.clone()).or_default();
                count.total += 1;
                match person.gender {
                    Some(Gender::Male) => count.male += 1,
                    Some(Gender::Female) => count.female += 1,
                    None => {}
                }
                count
                    .teams
                    .entry(assignment.team.clone())
                    .or_default()
                    .add(person.gender);
            }
        }

        SeasonTally(tally)
    }

    pub fn season(&self, label: &str) -> Option<&SeasonCount> {
        self.0.get(label)
    }

    pub fn seasons(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

// ============================================================================
// TESTS
// ============================================================================
