// 🔑 Key Generator - Candidate match keys per (surname, given) pair
//
// Four derivations:
//   exact      "berg|jan"        normalized surname + normalized given
//   root       "berg|jan"        surname with leading particles stripped
//   hyphen     "visser|diana"    first segment of a compound surname
//   fuzzy      "~deker|jan"      phonetic-style fold of the surname
//
// Exact, simplified, root and hyphen keys share one namespace on purpose:
// a root key registered from "van der Berg" must be hit by an exact lookup
// on a source that wrote "Berg". Fuzzy keys live in their own namespace.

use crate::names::{self, is_particle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// MATCH KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchKey {
    /// Exact / simplified / root / hyphen keys
    Name(String),

    /// Fuzzy keys, never comparable with `Name` keys
    Fuzzy(String),
}

impl MatchKey {
    pub fn is_fuzzy(&self) -> bool {
        matches!(self, MatchKey::Fuzzy(_))
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKey::Name(k) => write!(f, "{}", k),
            MatchKey::Fuzzy(k) => write!(f, "~{}", k),
        }
    }
}

/// How a registered key was derived (kept for diagnostics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOrigin {
    Exact,
    Simplified,
    Root,
    Hyphen,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub key: MatchKey,
    pub origin: KeyOrigin,
}

// ============================================================================
// SURNAME FOLD (replaceable fuzzy strategy)
// ============================================================================

/// Folds a surname into a spelling-insensitive bucket.
///
/// The fold decides the precision/recall trade-off of every fuzzy lookup,
/// so it is swappable per `KeyGenerator`.
pub trait SurnameFold: Send + Sync {
    fn fold(&self, surname: &str) -> String;

    fn name(&self) -> &str;
}

/// Dutch spelling variants: ij/y, ei/ey, long vowels, ck/k, ph/f, th/t,
/// dt/t, sch/s, doubled letters and a trailing s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DutchSpellingFold;

const DUTCH_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("ij", "y"),
    ("ei", "ey"),
    ("oo", "o"),
    ("ee", "e"),
    ("aa", "a"),
    ("ck", "k"),
    ("ph", "f"),
    ("th", "t"),
    ("dt", "t"),
    ("sch", "s"),
];

impl SurnameFold for DutchSpellingFold {
    fn fold(&self, surname: &str) -> String {
        let normalized = names::normalize(surname);
        let mut s = normalized
            .split_whitespace()
            .filter(|p| !is_particle(p))
            .collect::<Vec<_>>()
            .join(" ");

        for (from, to) in DUTCH_SUBSTITUTIONS {
            s = s.replace(from, to);
        }

        // wall → wal, zwoll → zwol, koornneef → korneef
        let mut chars: Vec<char> = s.chars().collect();
        chars.dedup();

        // dekkers → dekker
        if chars.len() > 3 && chars.last() == Some(&'s') {
            chars.pop();
        }

        chars.into_iter().collect()
    }

    fn name(&self) -> &str {
        "dutch-spelling"
    }
}

// ============================================================================
// KEY GENERATOR
// ============================================================================

#[derive(Clone)]
pub struct KeyGenerator {
    fold: Arc<dyn SurnameFold>,
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("fold", &self.fold.name())
            .finish()
    }
}

impl KeyGenerator {
    /// Generator with the default Dutch spelling fold
    pub fn new() -> Self {
        KeyGenerator {
            fold: Arc::new(DutchSpellingFold),
        }
    }

    pub fn with_fold(fold: Arc<dyn SurnameFold>) -> Self {
        KeyGenerator { fold }
    }

    pub fn fold_name(&self) -> &str {
        self.fold.name()
    }

    /// Fuzzy-folded surname (empty when nothing survives the fold)
    pub fn fold_surname(&self, surname: &str) -> String {
        self.fold.fold(surname)
    }

    /// `normalize(surname)|normalize(given)`; `None` if either side is empty
    pub fn exact(&self, surname: &str, given: &str) -> Option<MatchKey> {
        let s = names::normalize(surname);
        let g = names::normalize(given);
        if s.is_empty() || g.is_empty() {
            return None;
        }
        Some(MatchKey::Name(format!("{}|{}", s, g)))
    }

    /// Surname + first word of the given name. A leading particle in the
    /// given name ("de Bas") yields no simplified key.
    pub fn simplified(&self, surname: &str, given: &str) -> Option<MatchKey> {
        let word = names::first_word(given)?;
        if is_particle(word) {
            return None;
        }
        self.exact(surname, word)
    }

    /// Prefix-stripped surname + first given word
    pub fn root(&self, surname: &str, given: &str) -> Option<MatchKey> {
        let root = names::root_surname(surname)?;
        self.simplified(&root, given)
    }

    /// First hyphen segment of a compound surname + first given word
    pub fn hyphen(&self, surname: &str, given: &str) -> Option<MatchKey> {
        let (first, _) = surname.split_once('-')?;
        let first = first.trim();
        if first.is_empty() {
            return None;
        }
        self.simplified(first, given)
    }

    /// Folded surname + first word of the normalized given name
    pub fn fuzzy(&self, surname: &str, given: &str) -> Option<MatchKey> {
        let folded = self.fold_surname(surname);
        let given_norm = names::normalize(given);
        let word = given_norm.split_whitespace().next()?;
        if folded.is_empty() {
            return None;
        }
        Some(MatchKey::Fuzzy(format!("{}|{}", folded, word)))
    }

    /// Every key registered for an identity, over all supplied given-name
    /// variants (typically the parsed given name and the nickname).
    /// Duplicates are dropped; the first origin wins.
    pub fn derive(&self, surname: &str, givens: &[&str]) -> Vec<DerivedKey> {
        let mut keys: Vec<DerivedKey> = Vec::new();

        for given in givens.iter().filter(|g| !g.trim().is_empty()) {
            let candidates = [
                (self.exact(surname, given), KeyOrigin::Exact),
                (self.simplified(surname, given), KeyOrigin::Simplified),
                (self.root(surname, given), KeyOrigin::Root),
                (self.hyphen(surname, given), KeyOrigin::Hyphen),
                (self.fuzzy(surname, given), KeyOrigin::Fuzzy),
            ];

            for (key, origin) in candidates {
                if let Some(key) = key {
                    if !keys.iter().any(|d| d.key == key) {
                        keys.push(DerivedKey { key, origin });
                    }
                }
            }
        }

        keys
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name_key(s: &str) -> MatchKey {
        MatchKey::Name(s.to_string())
    }

    #[test]
    fn test_exact_key() {
        let keys = KeyGenerator::new();
        assert_eq!(keys.exact("Jansen", "Jan"), Some(name_key("jansen|jan")));
        assert_eq!(keys.exact("Müller", "Zoë"), Some(name_key("muller|zoe")));
    }

    #[test]
    fn test_empty_components_are_discarded() {
        let keys = KeyGenerator::new();
        assert_eq!(keys.exact("", "Jan"), None);
        assert_eq!(keys.exact("Jansen", ""), None);
        assert_eq!(keys.fuzzy("Jansen", ""), None);
        assert!(keys.derive("Kardinaal", &[""]).is_empty());
    }

    #[test]
    fn test_simplified_key_uses_first_word() {
        let keys = KeyGenerator::new();
        assert_eq!(keys.simplified("Jong", "Bas de"), Some(name_key("jong|bas")));
        assert_eq!(keys.simplified("Jong", "de Bas"), None);
    }

    #[test]
    fn test_root_key_strips_particles() {
        let keys = KeyGenerator::new();
        assert_eq!(keys.root("van der Wall", "Jeffrey"), Some(name_key("wall|jeffrey")));
        assert_eq!(keys.root("Wall", "Jeffrey"), None);
    }

    #[test]
    fn test_hyphen_key_uses_first_segment() {
        let keys = KeyGenerator::new();
        assert_eq!(
            keys.hyphen("Kleingeld-Wibbens", "Liesbeth"),
            Some(name_key("kleingeld|liesbeth"))
        );
        assert_eq!(keys.hyphen("Kleingeld", "Liesbeth"), None);
    }

    #[test]
    fn test_fuzzy_namespace_is_distinct() {
        let keys = KeyGenerator::new();
        let fuzzy = keys.fuzzy("Berg", "Jan").unwrap();
        let exact = keys.exact("Berg", "Jan").unwrap();
        assert!(fuzzy.is_fuzzy());
        assert_ne!(fuzzy, exact);
        assert_eq!(fuzzy.to_string(), "~berg|jan");
        assert_eq!(exact.to_string(), "berg|jan");
    }

    #[test]
    fn test_fold_known_variants_share_bucket() {
        let fold = DutchSpellingFold;
        let pairs = [
            ("Dekkers", "Dekker"),
            ("van der Wall", "Wal"),
            ("Zwoll", "Zwol"),
            ("Ooyen", "van Ooijen"),
            ("Koornneef", "Korneef"),
            ("Janssen", "Jansen"),
            ("Smidt", "Smit"),
        ];
        for (a, b) in pairs {
            assert_eq!(fold.fold(a), fold.fold(b), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_fold_keeps_unrelated_prefix_sharers_apart() {
        let fold = DutchSpellingFold;
        assert_ne!(fold.fold("Berg"), fold.fold("Bergman"));
        assert_ne!(fold.fold("Jans"), fold.fold("Jansen"));
        assert_ne!(fold.fold("Kamer"), fold.fold("Kamerman"));
    }

    #[test]
    fn test_derive_covers_all_origins() {
        let keys = KeyGenerator::new();
        let derived = keys.derive("van der Berg-Smit", &["Jan Willem", "Jan"]);
        let origins: Vec<KeyOrigin> = derived.iter().map(|d| d.origin).collect();

        assert!(origins.contains(&KeyOrigin::Exact));
        assert!(origins.contains(&KeyOrigin::Simplified));
        assert!(origins.contains(&KeyOrigin::Root));
        assert!(origins.contains(&KeyOrigin::Hyphen));
        assert!(origins.contains(&KeyOrigin::Fuzzy));

        // "Jan" as second variant repeats the simplified key; no duplicates
        let mut seen = derived.iter().map(|d| d.key.clone()).collect::<Vec<_>>();
        let before = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), before);
    }

    #[test]
    fn test_custom_fold_is_used() {
        struct Identity;
        impl SurnameFold for Identity {
            fn fold(&self, surname: &str) -> String {
                names::normalize(surname)
            }
            fn name(&self) -> &str {
                "identity"
            }
        }

        let keys = KeyGenerator::with_fold(Arc::new(Identity));
        assert_eq!(keys.fold_name(), "identity");
        assert_ne!(keys.fuzzy("Dekkers", "Jan"), keys.fuzzy("Dekker", "Jan"));
    }
}
