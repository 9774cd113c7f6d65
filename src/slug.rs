//! Slug generation and validation.
//!
//! `create_slug` is lenient (any text in, a usable slug out) while
//! `is_valid_slug` is strict: raw text like `a__b` or `a--b` is rejected
//! even though `create_slug` turns it into a valid slug.

use std::sync::OnceLock;

use rand::Rng;
use regex_lite::Regex;

/// Length of the random suffix used by [`create_unique_slug`].
const UNIQUE_SUFFIX_LEN: usize = 6;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9 _-]").expect("valid regex"))
}

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ _]+").expect("valid regex"))
}

fn hyphen_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("valid regex"))
}

fn valid_slug() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid regex"))
}

/// Turn arbitrary text into a slug. Empty input yields an empty string.
pub fn create_slug(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = disallowed_chars().replace_all(&lowered, "");
    let hyphenated = separator_runs().replace_all(&stripped, "-");
    let collapsed = hyphen_runs().replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

/// True iff `slug` is lowercase alphanumeric groups joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    valid_slug().is_match(slug)
}

/// Slug with a random 6-character `[a-z0-9]` suffix.
///
/// Collisions are possible in theory (36^6 space) but negligible in practice.
pub fn create_unique_slug(text: &str) -> String {
    let base = create_slug(text);
    let suffix = random_suffix();
    if base.is_empty() {
        suffix
    } else {
        format!("{}-{}", base, suffix)
    }
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..UNIQUE_SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_slug_basic() {
        assert_eq!(create_slug("Daily Backup"), "daily-backup");
        assert_eq!(create_slug("  Hello   World  "), "hello-world");
        assert_eq!(create_slug("snake_case__name"), "snake-case-name");
        assert_eq!(create_slug("a - b"), "a-b");
        assert_eq!(create_slug("--Leading and trailing--"), "leading-and-trailing");
        assert_eq!(create_slug("Report (v2)!"), "report-v2");
    }

    #[test]
    fn test_create_slug_empty() {
        assert_eq!(create_slug(""), "");
        assert_eq!(create_slug("!!!"), "");
        assert_eq!(create_slug("---"), "");
    }

    #[test]
    fn test_create_slug_idempotent() {
        for input in [
            "Daily Backup",
            "  x__y--z  ",
            "Ünïcödé Name 42",
            "already-a-slug",
            "a_-_b",
            "",
        ] {
            let once = create_slug(input);
            assert_eq!(create_slug(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_generated_slugs_are_valid() {
        for input in ["Daily Backup", "x__y--z", "42", "A b_C-d", "tab\tseparated"] {
            let slug = create_slug(input);
            assert!(is_valid_slug(&slug), "{:?} -> {:?}", input, slug);
        }
    }

    #[test]
    fn test_is_valid_slug_is_stricter_than_generator() {
        assert!(is_valid_slug("daily-backup"));
        assert!(is_valid_slug("a1"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-a"));
        assert!(!is_valid_slug("a-"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("a_b"));
        assert!(!is_valid_slug("a  b"));
        assert!(!is_valid_slug("Upper"));

        // The generator accepts the same raw text and fixes it up
        assert!(is_valid_slug(&create_slug("a_b")));
        assert!(is_valid_slug(&create_slug("a--b")));
    }

    #[test]
    fn test_create_unique_slug() {
        let a = create_unique_slug("Daily Backup");
        let b = create_unique_slug("Daily Backup");

        assert!(a.starts_with("daily-backup-"));
        assert_eq!(a.len(), "daily-backup-".len() + UNIQUE_SUFFIX_LEN);
        assert!(is_valid_slug(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn test_create_unique_slug_empty_base() {
        let slug = create_unique_slug("!!!");
        assert_eq!(slug.len(), UNIQUE_SUFFIX_LEN);
        assert!(is_valid_slug(&slug));
    }
}
