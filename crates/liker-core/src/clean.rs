//! Name cleanup for text scraped out of profile links.
//!
//! Link text often carries an invisible accessibility echo glued to the visible
//! name, e.g. `Ben RodgersView Ben Rodgers' profile`. [`clean_name`] strips
//! those echoes and collapses duplicated names.

use regex::Regex;
use std::sync::LazyLock;

/// Used when nothing name-like survives cleaning.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Longest plausible display name.
const MAX_NAME_CHARS: usize = 50;

/// The host site's own name, never part of a person's name.
const SITE_NAME: &str = "linkedin";

/// Trailing accessibility phrases, tried in order.
static TRAILING_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)view\s+(.+?)['’]s?\s+profile\s*$",
        r"(?i)view\s+profile\s*$",
        r"(?i)view\s+(.+?)\s+profile\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// `<NameA>view <NameB>[’s profile ...]`
static NAME_VIEW_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)view\s+(.+?)(?:['’]s?)?(?:\s*profile.*)?$").expect("valid regex")
});

/// Leftover view/profile fragments, removed in order.
static RESIDUE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)view\s+[^'’]*['’]?s?\s*profile.*", ""),
        (r"(?i)view\s+profile.*", ""),
        (r"(?i)^view\s+", ""),
        (r"(?i)\s+view(\s|$)", " "),
        (r"(?i)\b(?:view|profile)\b", " "),
    ]
    .iter()
    .map(|(p, r)| (Regex::new(p).expect("valid regex"), *r))
    .collect()
});

static SUSPICIOUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)view|profile").expect("valid regex"));

/// Clean a scraped name. Returns [`UNKNOWN_NAME`] when nothing usable remains.
///
/// Idempotent: `clean_name(&clean_name(s)) == clean_name(s)`.
pub fn clean_name(raw: &str) -> String {
    let mut current = collapse_whitespace(raw);
    loop {
        let next = clean_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    if current.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        current
    }
}

/// One sweep of every cleanup step. Each step only removes text.
fn clean_pass(input: &str) -> String {
    let mut s = input.to_string();

    for re in TRAILING_PHRASES.iter() {
        s = re.replace_all(&s, "").into_owned();
    }

    s = collapse_view_duplicate(&s);
    s = collapse_repeated_halves(&s);

    for (re, replacement) in RESIDUE.iter() {
        s = re.replace_all(&s, *replacement).into_owned();
    }
    s = trim_to_letters(&collapse_whitespace(&s));

    if s.chars().count() > MAX_NAME_CHARS || SUSPICIOUS.is_match(&s) {
        s = leading_name_words(&s).unwrap_or(s);
    }

    collapse_whitespace(&s)
}

/// `Jane DoeView Jane Doe's profile` -> `Jane Doe`, when the two names agree.
fn collapse_view_duplicate(s: &str) -> String {
    let Some(caps) = NAME_VIEW_NAME.captures(s) else {
        return s.to_string();
    };
    let first = caps[1].trim();
    let second = caps[2].trim();
    if first.is_empty() || second.is_empty() {
        return s.to_string();
    }
    let (a, b) = (squash(first), squash(second));
    if a.contains(&b) || b.contains(&a) {
        if first.len() >= second.len() {
            first.to_string()
        } else {
            second.to_string()
        }
    } else {
        s.to_string()
    }
}

/// Fewest words for a string to count as a doubled name. Two-word names like
/// `Li Li` are left alone.
const MIN_DOUBLED_WORDS: usize = 4;

/// `John Doe John Doe` -> `John Doe`.
fn collapse_repeated_halves(s: &str) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() < MIN_DOUBLED_WORDS || words.len() % 2 != 0 {
        return s.to_string();
    }
    let (first, second) = words.split_at(words.len() / 2);
    let first = first.join(" ");
    if first.to_lowercase() == second.join(" ").to_lowercase() {
        first
    } else {
        s.to_string()
    }
}

/// First two or three word tokens that look like parts of a name.
fn leading_name_words(s: &str) -> Option<String> {
    let words: Vec<&str> = s
        .split_whitespace()
        .filter(|w| w.chars().count() > 1 && w.chars().any(char::is_alphabetic))
        .filter(|w| {
            let lower = w.to_lowercase();
            !lower.contains("view") && !lower.contains("profile") && !lower.contains(SITE_NAME)
        })
        .collect();
    (words.len() >= 2).then(|| words[..words.len().min(3)].join(" "))
}

/// Lowercase with whitespace and apostrophes removed, for name comparison.
fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '’')
        .flat_map(char::to_lowercase)
        .collect()
}

fn trim_to_letters(s: &str) -> String {
    s.trim_matches(|c: char| !c.is_alphabetic()).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
