// Entity Models
// "Identity persists, values change"
//
// - PersonIdentity: stable id + refreshable name values + season track
// - Team codes: normalization and category derivation for season tracks

pub mod person;
pub mod team;

pub use person::{
    season_years, Enrichment, Gender, IdentityState, PersonId, PersonIdentity, SeasonAssignment,
    SourceKind, DEFAULT_ROLE,
};
pub use team::{categorize_team, TeamNormalizer, DEFAULT_ORG_PREFIX};
