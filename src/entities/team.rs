// 🏷️ Team Codes - Normalization + category derivation
//
// Problem solved:
// - "S6x1", "OW S6", "S6" → "S6"
// - "sen", "Senioren", "S" → "Senioren"
// - "-", "stopt", "?", "" → no assignment

use regex::Regex;
use std::sync::LazyLock;

static MULTIPLICITY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]+\d+)x\d+$").expect("valid regex"));
static SENIOR_TEAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^S\d").expect("valid regex"));

/// Placeholder values that mean "not on a team this season"
const INACTIVE_VALUES: &[&str] = &["-", "stopt", "gestopt", "ar", "?", "x1", ""];

/// Generic aliases that map onto one canonical team label
const TEAM_ALIASES: &[(&str, &str)] = &[
    ("sen", "Senioren"),
    ("senioren", "Senioren"),
    ("s", "Senioren"),
];

pub const DEFAULT_ORG_PREFIX: &str = "OW";

// ============================================================================
// TEAM NORMALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct TeamNormalizer {
    /// Organizational prefix stripped from team codes ("OW S6" → "S6")
    org_prefix: String,
}

impl TeamNormalizer {
    pub fn new(org_prefix: impl Into<String>) -> Self {
        TeamNormalizer {
            org_prefix: org_prefix.into(),
        }
    }

    /// Normalize a raw team cell. `None` means "no assignment".
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut team = raw.trim();
        if is_inactive(team) {
            return None;
        }

        if !self.org_prefix.is_empty() {
            if let Some(rest) = team.strip_prefix(self.org_prefix.as_str()) {
                if rest.starts_with(char::is_whitespace) {
                    team = rest.trim_start();
                }
            }
        }

        let team = match MULTIPLICITY_SUFFIX.captures(team) {
            Some(caps) => caps[1].to_string(),
            None => team.to_string(),
        };

        if is_inactive(&team) {
            return None;
        }

        let lower = team.to_lowercase();
        for (alias, canonical) in TEAM_ALIASES {
            if lower == *alias {
                return Some(canonical.to_string());
            }
        }

        Some(team)
    }
}

impl Default for TeamNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_ORG_PREFIX)
    }
}

fn is_inactive(team: &str) -> bool {
    INACTIVE_VALUES.contains(&team.to_lowercase().as_str())
}

// ============================================================================
// CATEGORY TABLE
// ============================================================================

/// Age category from the team code's leading letter
pub fn categorize_team(team: &str) -> &'static str {
    let t = team.trim().to_uppercase();

    if t == "SENIOREN" || t.starts_with("MW") || t.starts_with("JOW") || SENIOR_TEAM.is_match(&t) {
        return "Senioren";
    }
    if t.starts_with("U1") {
        return "A-Junioren";
    }

    match t.chars().next() {
        Some('A') => "A-Junioren",
        Some('B') => "B-Aspiranten",
        Some('C') => "C-Aspiranten",
        Some('D') => "D-Pupillen",
        Some('E') => "E-Pupillen",
        Some('F') => "F-Pupillen",
        Some('K') => "Kangoeroes",
        Some('J') => "Jeugd",
        _ => "Senioren",
    }
}

// ============================================================================
// TESTS
// ============================================================================
