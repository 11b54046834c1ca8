// 🔤 Name Parser - Raw roster names → structured components
// Handles the three layouts seen across sixteen years of roster sheets:
//   "Surname, Initial(s) (Nickname)"
//   "Surname (Nickname)"
//   "Given [particles] Surname"

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// ============================================================================
// PREFIX PARTICLES
// ============================================================================

/// Closed set of surname prefix particles ("tussenvoegsels")
pub const PREFIX_PARTICLES: &[&str] = &[
    "van", "de", "den", "der", "het", "ten", "ter", "in", "t", "'t", "in't", "vd", "v/d",
];

/// Check whether a single word is a prefix particle (case-insensitive)
pub fn is_particle(word: &str) -> bool {
    let lower = word.to_lowercase();
    PREFIX_PARTICLES.contains(&lower.as_str())
}

static PAREN_NICKNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("valid regex"));
static LEADING_INITIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Z]\.)+\s*").expect("valid regex"));
static SURNAME_WITH_NICKNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+\(([^)]+)\)$").expect("valid regex"));
static DOTTED_INITIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z]\.\s*").expect("valid regex"));
static PAREN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// ============================================================================
// PARSED NAME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedName {
    /// Surname including any particles ("van der Berg")
    pub surname: String,

    /// Given name or nickname, nickname preferred when present
    pub given: String,

    /// Dotted initials found in the raw string, letters only ("VZE")
    pub initials: Option<String>,
}

impl ParsedName {
    /// Parse failure: the caller treats this as "no usable name"
    pub fn is_parse_failure(&self) -> bool {
        self.surname.trim().is_empty()
    }

    /// Leading particles of the surname, lowercased ("van der Berg" → ["van", "der"])
    pub fn particles(&self) -> Vec<String> {
        self.surname
            .split_whitespace()
            .take_while(|w| is_particle(w))
            .map(|w| w.to_lowercase())
            .collect()
    }

    /// Surname with particles stripped, only when that changes anything
    pub fn root_surname(&self) -> Option<String> {
        root_surname(&self.surname)
    }
}

/// Strip particles from a multi-word surname. `None` when the root equals
/// the input or is empty.
pub fn root_surname(surname: &str) -> Option<String> {
    let parts: Vec<&str> = surname.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let root = parts
        .iter()
        .filter(|p| !is_particle(p))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    if root.is_empty() || root == surname.trim() {
        None
    } else {
        Some(root)
    }
}

/// First whitespace-separated word of a given name
pub fn first_word(given: &str) -> Option<&str> {
    given.split_whitespace().next()
}

// ============================================================================
// PARSING
// ============================================================================

/// Parse a raw name string into surname / given / initials.
///
/// Malformed input (empty, no letters) yields an empty surname. A single
/// token becomes the surname with an empty given name.
pub fn parse_name(raw: &str) -> ParsedName {
    let name = raw.trim();
    if name.is_empty() || !name.chars().any(char::is_alphabetic) {
        return ParsedName::default();
    }

    if let Some((surname, rest)) = name.split_once(',') {
        return parse_comma_form(surname.trim(), rest.trim());
    }

    if let Some(caps) = SURNAME_WITH_NICKNAME.captures(name) {
        return ParsedName {
            surname: caps[1].to_string(),
            given: caps[2].trim().to_string(),
            initials: None,
        };
    }

    parse_given_first_form(name)
}

/// Parse with an external nickname hint: the hint fills an empty given name
pub fn parse_name_with_hint(raw: &str, nickname_hint: Option<&str>) -> ParsedName {
    let mut parsed = parse_name(raw);
    if parsed.given.is_empty() {
        if let Some(hint) = nickname_hint.map(str::trim).filter(|h| !h.is_empty()) {
            parsed.given = hint.to_string();
        }
    }
    parsed
}

/// "Surname, J. (Jan)" / "Surname, V.Z.E." / "Jong, Bas de"
fn parse_comma_form(surname: &str, rest: &str) -> ParsedName {
    let initials = LEADING_INITIALS.find(rest).map(|m| {
        m.as_str()
            .chars()
            .filter(|c| c.is_alphabetic())
            .collect::<String>()
    });

    let given = match PAREN_NICKNAME.captures(rest) {
        Some(caps) => caps[1].trim().to_string(),
        None => {
            let stripped = LEADING_INITIALS.replace(rest, "").trim().to_string();
            if stripped.is_empty() {
                rest.to_string()
            } else {
                stripped
            }
        }
    };

    ParsedName {
        surname: surname.to_string(),
        given,
        initials,
    }
}

/// "Jan van der Berg" / "Jan (Janneke) Jansen"
fn parse_given_first_form(name: &str) -> ParsedName {
    let nickname = PAREN_NICKNAME
        .captures(name)
        .map(|caps| caps[1].trim().to_string());
    let without_parens = PAREN_TEXT.replace_all(name, " ");
    let parts: Vec<&str> = without_parens.split_whitespace().collect();

    match parts.as_slice() {
        [] => ParsedName::default(),
        [single] => ParsedName {
            surname: single.to_string(),
            given: nickname.unwrap_or_default(),
            initials: None,
        },
        [first, rest @ ..] => ParsedName {
            surname: rest.join(" "),
            given: nickname.unwrap_or_else(|| first.to_string()),
            initials: None,
        },
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Explicit diacritic substitution table, applied after lowercasing.
/// Combining marks come last so decomposed input folds as well.
const DIACRITICS: &[(&str, &str)] = &[
    ("e\u{0308}", "e"), ("o\u{0308}", "o"), ("u\u{0308}", "u"),
    ("ë", "e"), ("ö", "o"), ("ü", "u"), ("é", "e"), ("è", "e"), ("ê", "e"),
    ("ï", "i"), ("í", "i"), ("ì", "i"), ("î", "i"),
    ("á", "a"), ("à", "a"), ("ä", "a"), ("â", "a"), ("ã", "a"), ("å", "a"),
    ("ó", "o"), ("ò", "o"), ("ô", "o"), ("õ", "o"), ("ø", "o"),
    ("ú", "u"), ("ù", "u"), ("û", "u"),
    ("ç", "c"), ("č", "c"), ("ć", "c"), ("ñ", "n"),
    ("ş", "s"), ("š", "s"), ("ğ", "g"), ("ı", "i"), ("ž", "z"),
    ("\u{0327}", ""), ("\u{0302}", ""), ("\u{0301}", ""), ("\u{0300}", ""), ("\u{0308}", ""),
];

/// Characters dropped as stray punctuation. Apostrophes, hyphens and
/// slashes carry meaning in surnames ("'t", "Visser-Michelsen", "v/d").
const STRAY_PUNCTUATION: &[char] = &[',', '.', '*', '"', ';', ':'];

/// Normalize a name fragment for key building: lowercase, dotted initials
/// and parenthesized text removed, diacritics folded, punctuation dropped,
/// whitespace collapsed.
pub fn normalize(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return String::new();
    }

    let no_initials = DOTTED_INITIAL.replace_all(&lower, "");
    let no_parens = PAREN_TEXT.replace_all(&no_initials, "");

    let mut folded = no_parens.into_owned();
    for (from, to) in DIACRITICS {
        if folded.contains(from) {
            folded = folded.replace(from, to);
        }
    }

    let cleaned: String = folded
        .chars()
        .filter(|c| !STRAY_PUNCTUATION.contains(c))
        .collect();

    WHITESPACE.replace_all(cleaned.trim(), " ").into_owned()
}

// ============================================================================
// LABEL-ROW REJECTION
// ============================================================================

const NON_NAME_LABELS: &[&str] = &[
    "naam", "dames", "heren", "opstelling", "vacature", "trainers", "trainer", "coach",
    "begeleiders", "begeleider", "verzorgers", "verzorging", "team begeleiding",
    "hoofdtrainer", "assistent", "scheidsrechter", "staf", "eigen trainers",
    "algemene reserves", "ar lijst", "kangoeroes",
];

const NON_NAME_KEYWORDS: &[&str] = &[
    "trainer", "coach", "begeleider", "scheidsrechter", "verzorg", "opstelling",
    "selectie", "klasse", "vacature", "coordinat", "coördinat", "techniek", "manager",
    "carrousel", "tc-lid",
];

static TEAM_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]\d+(?:/[A-Z]\d+)?\s+[A-Z\d/]").expect("valid regex"));
static TEAM_PREFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:veld|zaal)\s+team\b|team\s+)").expect("valid regex")
});
static GENDER_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Heren|Dames|Heer|Dame)\s+").expect("valid regex"));
static COMPETITION_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d/\d\s*\+?\s*\d/\d").expect("valid regex"));
static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?\d*$").expect("valid regex"));

/// Heuristic used by adapters/ingest: does this cell hold a person's name,
/// or a header/staff/team label that leaked into a name column?
pub fn looks_like_person_name(text: &str) -> bool {
    let text = text.trim();
    if text.chars().count() < 3 || NUMERIC.is_match(text) {
        return false;
    }

    let lower = text.to_lowercase();
    if NON_NAME_LABELS.contains(&lower.as_str())
        || NON_NAME_KEYWORDS.iter().any(|kw| lower.contains(kw))
    {
        return false;
    }

    if TEAM_LABEL.is_match(text)
        || TEAM_PREFIXED.is_match(text)
        || GENDER_HEADER.is_match(text)
        || COMPETITION_FORMAT.is_match(text)
    {
        return false;
    }

    if !text.chars().next().is_some_and(char::is_uppercase) {
        return false;
    }

    text.contains(',') || text.split_whitespace().count() >= 2
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_form_with_nickname() {
        let parsed = parse_name("Jansen, J. (Jan)");
        assert_eq!(parsed.surname, "Jansen");
        assert_eq!(parsed.given, "Jan");
        assert_eq!(parsed.initials, Some("J".to_string()));
    }

    #[test]
    fn test_nickname_beats_initials() {
        let parsed = parse_name("Valk, M.E. (Marlies)");
        assert_eq!(parsed.given, "Marlies");
        assert_eq!(parsed.initials, Some("ME".to_string()));
    }

    #[test]
    fn test_initials_only_are_kept_as_given() {
        // Nothing fuller available, so the initials stay
        let parsed = parse_name("Klink, X.");
        assert_eq!(parsed.surname, "Klink");
        assert_eq!(parsed.given, "X.");
    }

    #[test]
    fn test_initials_stripped_when_fuller_name_follows() {
        let parsed = parse_name("Boer, E. Esmee");
        assert_eq!(parsed.given, "Esmee");
    }

    #[test]
    fn test_parse_comma_form_trailing_particle() {
        let parsed = parse_name("Jong, Bas de");
        assert_eq!(parsed.surname, "Jong");
        assert_eq!(parsed.given, "Bas de");
    }

    #[test]
    fn test_parse_surname_with_nickname_no_comma() {
        let parsed = parse_name("Valk (Jarno)");
        assert_eq!(parsed.surname, "Valk");
        assert_eq!(parsed.given, "Jarno");
    }

    #[test]
    fn test_parse_given_first_keeps_particles() {
        let parsed = parse_name("Jan van der Berg");
        assert_eq!(parsed.surname, "van der Berg");
        assert_eq!(parsed.given, "Jan");
        assert_eq!(parsed.particles(), vec!["van", "der"]);
        assert_eq!(parsed.root_surname(), Some("Berg".to_string()));
    }

    #[test]
    fn test_parse_single_token_falls_back_to_surname() {
        let parsed = parse_name("Kardinaal");
        assert_eq!(parsed.surname, "Kardinaal");
        assert_eq!(parsed.given, "");
        assert!(!parsed.is_parse_failure());
    }

    #[test]
    fn test_parse_malformed_is_failure() {
        assert!(parse_name("").is_parse_failure());
        assert!(parse_name("  ").is_parse_failure());
        assert!(parse_name("12-34").is_parse_failure());
    }

    #[test]
    fn test_hint_fills_empty_given() {
        let parsed = parse_name_with_hint("Kardinaal", Some("Leo"));
        assert_eq!(parsed.given, "Leo");

        let parsed = parse_name_with_hint("Kardinaal, Leo", Some("Lennart"));
        assert_eq!(parsed.given, "Leo");
    }

    #[test]
    fn test_normalize_diacritics_and_punctuation() {
        assert_eq!(normalize("Zoë"), "zoe");
        assert_eq!(normalize("Renée"), "renee");
        assert_eq!(normalize("  Müller,  Jürgen "), "muller jurgen");
        assert_eq!(normalize("Jansen, J. (Jan)"), "jansen");
        assert_eq!(normalize("St. Nicolaas"), "st nicolaas");
    }

    #[test]
    fn test_normalize_keeps_meaningful_marks() {
        assert_eq!(normalize("in 't Veld"), "in 't veld");
        assert_eq!(normalize("Visser-Michelsen"), "visser-michelsen");
    }

    #[test]
    fn test_root_surname() {
        assert_eq!(root_surname("van der Wall"), Some("Wall".to_string()));
        assert_eq!(root_surname("Wall"), None);
        assert_eq!(root_surname("Rubio Cubillos"), None);
    }

    #[test]
    fn test_looks_like_person_name() {
        assert!(looks_like_person_name("Jansen, Jan"));
        assert!(looks_like_person_name("Jan van der Berg"));

        assert!(!looks_like_person_name("Trainer"));
        assert!(!looks_like_person_name("Hoofdtrainer Jan"));
        assert!(!looks_like_person_name("S5 S6"));
        assert!(!looks_like_person_name("A1/A2   4/4 + 5/5"));
        assert!(!looks_like_person_name("Team B1"));
        assert!(!looks_like_person_name("Heren selectie"));
        assert!(!looks_like_person_name("Jansen"));
        assert!(!looks_like_person_name("jansen, jan"));
        assert!(!looks_like_person_name("12"));
    }
}
