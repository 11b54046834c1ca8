// 🧍 Person Identity - One canonical record per real person
//
// "The id is IDENTITY (never reused), the name is a VALUE (can be refreshed)"
//
// Identities come from two places:
// - authoritative feeds that carry a stable relation number
// - synthetic ids minted locally when nothing matched

use crate::names::{self, ParsedName};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// PERSON ID
// ============================================================================

/// Identity id: either a stable external identifier or a synthetic one.
/// Ordering is plain string ordering, which makes exports deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        PersonId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(id: &str) -> Self {
        PersonId::new(id)
    }
}

// ============================================================================
// SOURCE KIND / GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Id supplied by a feed with stable relation numbers
    Authoritative,

    /// Id minted locally (`OW-0001`, ...)
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,

    #[serde(rename = "V")]
    Female,
}

impl Gender {
    /// Accepts the spellings found in roster sheets: M/H (heren) and V/F/D (dames)
    pub fn parse(raw: &str) -> Option<Gender> {
        match raw.trim().to_uppercase().as_str() {
            "M" | "H" | "MAN" | "HEREN" => Some(Gender::Male),
            "V" | "F" | "D" | "VROUW" | "DAMES" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "V",
        }
    }
}

// ============================================================================
// SEASON ASSIGNMENT
// ============================================================================

/// At most one per (identity, season)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonAssignment {
    /// Normalized team code ("S6", "A3", "Senioren")
    pub team: String,

    /// Supplied, or derived from the team code's leading letter
    pub category: String,

    pub role: String,
}

pub const DEFAULT_ROLE: &str = "player";

// ============================================================================
// PERSON IDENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonIdentity {
    pub id: PersonId,

    /// Latest non-empty raw name ("Jansen, J. (Jan)")
    pub canonical_name: String,

    pub nickname: String,

    pub gender: Option<Gender>,

    /// Fill-when-empty only
    pub birthdate: Option<NaiveDate>,

    pub source_kind: SourceKind,

    /// season label → assignment, ordered by label
    pub seasons: BTreeMap<String, SeasonAssignment>,

    pub retired_season: Option<String>,

    /// Synthetic id this identity was promoted from (not exported)
    #[serde(skip)]
    pub promoted_from: Option<PersonId>,
}

impl PersonIdentity {
    pub fn new(
        id: PersonId,
        canonical_name: String,
        nickname: String,
        gender: Option<Gender>,
        birthdate: Option<NaiveDate>,
        source_kind: SourceKind,
    ) -> Self {
        PersonIdentity {
            id,
            canonical_name,
            nickname,
            gender,
            birthdate,
            source_kind,
            seasons: BTreeMap::new(),
            retired_season: None,
            promoted_from: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source_kind == SourceKind::Synthetic
    }

    pub fn has_seasons(&self) -> bool {
        !self.seasons.is_empty()
    }

    /// Parse the canonical name into components
    pub fn parsed_name(&self) -> ParsedName {
        names::parse_name(&self.canonical_name)
    }

    /// Normalized surname, as compared by the birthdate-assisted scans
    pub fn normalized_surname(&self) -> String {
        names::normalize(&self.parsed_name().surname)
    }

    /// Given-name variants used for key registration: parsed given + nickname
    pub fn given_variants(&self) -> Vec<String> {
        let parsed = self.parsed_name();
        let mut variants = Vec::new();
        if !parsed.given.is_empty() {
            variants.push(parsed.given);
        }
        if !self.nickname.is_empty() && !variants.contains(&self.nickname) {
            variants.push(self.nickname.clone());
        }
        variants
    }

    /// Copy seasons missing here from `other`; existing seasons win.
    /// Returns how many seasons were copied.
    pub fn absorb_seasons(&mut self, other: &PersonIdentity) -> usize {
        let mut copied = 0;
        for (season, assignment) in &other.seasons {
            if !self.seasons.contains_key(season) {
                self.seasons.insert(season.clone(), assignment.clone());
                copied += 1;
            }
        }
        copied
    }

    /// Fill empty scalar fields from `other`. Returns the names of the
    /// fields that changed.
    pub fn fill_empty_from(&mut self, other: &PersonIdentity) -> Vec<&'static str> {
        let mut filled = Vec::new();
        if self.gender.is_none() && other.gender.is_some() {
            self.gender = other.gender;
            filled.push("gender");
        }
        if self.birthdate.is_none() && other.birthdate.is_some() {
            self.birthdate = other.birthdate;
            filled.push("birthdate");
        }
        if self.nickname.is_empty() && !other.nickname.is_empty() {
            self.nickname = other.nickname.clone();
            filled.push("nickname");
        }
        if self.retired_season.is_none() && other.retired_season.is_some() {
            self.retired_season = other.retired_season.clone();
            filled.push("retired_season");
        }
        filled
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// synthetic → promoted | merged-away; authoritative → merged-away;
/// anything not merged-away → retained at export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityState {
    Synthetic,
    Authoritative,
    Promoted,
    MergedAway,
    Retained,
}

/// Single-field enrichment; applied only when the field is currently empty
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    Gender(Gender),
    Birthdate(NaiveDate),
    Nickname(String),
    RetiredSeason(String),
}

impl Enrichment {
    pub fn field(&self) -> &'static str {
        match self {
            Enrichment::Gender(_) => "gender",
            Enrichment::Birthdate(_) => "birthdate",
            Enrichment::Nickname(_) => "nickname",
            Enrichment::RetiredSeason(_) => "retired_season",
        }
    }
}

/// "2015-2016" → (2015, 2016)
pub fn season_years(season: &str) -> Option<(i32, i32)> {
    let (start, end) = season.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> PersonIdentity {
        PersonIdentity::new(
            PersonId::new(id),
            name.to_string(),
            String::new(),
            None,
            None,
            SourceKind::Synthetic,
        )
    }

    fn assignment(team: &str) -> SeasonAssignment {
        SeasonAssignment {
            team: team.to_string(),
            category: "Senioren".to_string(),
            role: DEFAULT_ROLE.to_string(),
        }
    }

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("M"), Some(Gender::Male));
        assert_eq!(Gender::parse(" v "), Some(Gender::Female));
        assert_eq!(Gender::parse("F"), Some(Gender::Female));
        assert_eq!(Gender::parse("?"), None);
        assert_eq!(Gender::parse(""), None);
    }

    #[test]
    fn test_gender_serializes_as_code() {
        let json = serde_json::to_string(&Gender::Female).unwrap();
        assert_eq!(json, "\"V\"");
    }

    #[test]
    fn test_absorb_seasons_keeps_existing() {
        let mut primary = person("N1", "Jansen, Jan");
        primary.seasons.insert("2020-2021".to_string(), assignment("S1"));

        let mut secondary = person("OW-0001", "Jansen, Jan");
        secondary.seasons.insert("2020-2021".to_string(), assignment("S9"));
        secondary.seasons.insert("2019-2020".to_string(), assignment("A1"));

        let copied = primary.absorb_seasons(&secondary);
        assert_eq!(copied, 1);
        assert_eq!(primary.seasons["2020-2021"].team, "S1");
        assert_eq!(primary.seasons["2019-2020"].team, "A1");
    }

    #[test]
    fn test_fill_empty_never_overwrites() {
        let mut primary = person("N1", "Jansen, Jan");
        primary.gender = Some(Gender::Male);

        let mut secondary = person("OW-0001", "Jansen, Jan");
        secondary.gender = Some(Gender::Female);
        secondary.birthdate = NaiveDate::from_ymd_opt(2005, 4, 1);

        let filled = primary.fill_empty_from(&secondary);
        assert_eq!(filled, vec!["birthdate"]);
        assert_eq!(primary.gender, Some(Gender::Male));
        assert_eq!(primary.birthdate, NaiveDate::from_ymd_opt(2005, 4, 1));
    }

    #[test]
    fn test_given_variants() {
        let mut p = person("N1", "Jansen, J. (Jan)");
        p.nickname = "Jantje".to_string();
        assert_eq!(p.given_variants(), vec!["Jan".to_string(), "Jantje".to_string()]);

        p.nickname = "Jan".to_string();
        assert_eq!(p.given_variants(), vec!["Jan".to_string()]);
    }

    #[test]
    fn test_season_years() {
        assert_eq!(season_years("2015-2016"), Some((2015, 2016)));
        assert_eq!(season_years("najaar"), None);
    }

    #[test]
    fn test_export_shape_omits_promotion_marker() {
        let mut p = person("N1", "Jansen, Jan");
        p.promoted_from = Some(PersonId::new("OW-0001"));
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["id"], "N1");
        assert_eq!(value["source_kind"], "synthetic");
        assert!(value.get("promoted_from").is_none());
    }
}
