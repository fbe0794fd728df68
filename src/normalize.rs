use std::collections::HashMap;

use lazy_static::lazy_static;
use log::{info, warn};
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use crate::error::Error;
use crate::Review;

// Matched only as whole whitespace-separated tokens.
const EMOTICONS: &[(&str, &str)] = &[
    (":'(", "crying"),
    ("</3", "heartbroken"),
    (":-)", "smiley"),
    (":-(", "frown"),
    (":-D", "laughing"),
    (":-P", "playful"),
    (":-p", "playful"),
    (";-)", "wink"),
    (":-/", "skeptical"),
    ("^_^", "happy"),
    ("-_-", "annoyed"),
    (":)", "smiley"),
    ("(:", "smiley"),
    (":(", "frown"),
    ("):", "frown"),
    (":D", "laughing"),
    (":P", "playful"),
    (":p", "playful"),
    (";)", "wink"),
    (":|", "indifferent"),
    (":O", "surprised"),
    (":o", "surprised"),
    ("<3", "love"),
];

const SYMBOLS: &[(&str, &str)] = &[
    ("w/", "with"),
    ("&", "and"),
    ("%", "percent"),
    ("$", "dollar"),
    ("@", "at"),
    ("#", "number"),
    ("+", "plus"),
    ("=", "equals"),
];

lazy_static! {
    static ref EMOTICON_WORDS: HashMap<&'static str, &'static str> = EMOTICONS.iter().cloned().collect();
    static ref SYMBOL_WORDS: HashMap<&'static str, &'static str> = SYMBOLS.iter().cloned().collect();
    // "w/" only at the start of a word, so "how/why" is left alone.
    static ref SYMBOL_REGEX: Regex = {
        let alternation: Vec<String> = SYMBOLS
            .iter()
            .map(|&(pattern, _)| {
                if pattern.starts_with(char::is_alphabetic) {
                    format!(r"\b{}", regex::escape(pattern))
                } else {
                    regex::escape(pattern)
                }
            })
            .collect();
        Regex::new(&alternation.join("|")).unwrap()
    };
    static ref TOKEN_REGEX: Regex = Regex::new(r"\S+").unwrap();
    static ref PUNCTUATION_REGEX: Regex = Regex::new(r"[[:punct:]]").unwrap();
    static ref DIGIT_REGEX: Regex = Regex::new(r"[0-9]+").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Clone, Copy)]
pub struct Transform {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl Transform {
    pub fn new(name: &'static str, apply: fn(&str) -> String) -> Self {
        Self { name, apply }
    }
}

#[derive(Clone)]
pub struct Normalizer {
    steps: Vec<Transform>,
}

impl Normalizer {
    pub fn new(steps: Vec<Transform>) -> Self {
        Self { steps }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Transform::new("strip_noise", strip_noise),
            Transform::new("collapse_elongation", collapse_elongation),
            Transform::new("replace_emoticons_symbols", replace_emoticons_symbols),
            Transform::new("strip_punctuation", strip_punctuation),
            Transform::new("to_ascii", to_ascii),
            Transform::new("strip_digits", strip_digits),
            Transform::new("collapse_whitespace", collapse_whitespace),
            Transform::new("lowercase", lowercase),
        ])
    }

    pub fn steps(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(|t| t.name)
    }

    pub fn apply(&self, text: &str) -> String {
        self.steps
            .iter()
            .fold(text.to_owned(), |acc, step| (step.apply)(&acc))
    }

    /// Text after every step, in order.
    pub fn trace(&self, text: &str) -> Vec<(&'static str, String)> {
        let mut current = text.to_owned();
        self.steps
            .iter()
            .map(|step| {
                current = (step.apply)(&current);
                (step.name, current.clone())
            })
            .collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub kept: usize,
    pub dropped: Vec<usize>,
}

/// Cleans every review and drops those left with no text. Identifiers are
/// carried through untouched and order is preserved.
pub fn normalize_reviews(reviews: Vec<Review>, normalizer: &Normalizer) -> (Vec<Review>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut kept = Vec::with_capacity(reviews.len());

    for review in reviews {
        let text = normalizer.apply(&review.raw_text);
        if text.is_empty() {
            warn!("dropping: {}", Error::EmptyDocument(review.document_id));
            report.dropped.push(review.document_id);
            continue;
        }
        kept.push(review.with_text(text));
    }

    report.kept = kept.len();
    info!(
        "normalized {} reviews, dropped {} empty",
        report.kept,
        report.dropped.len()
    );

    (kept, report)
}

/// Removes characters that are neither alphanumeric, whitespace nor ASCII
/// punctuation: control characters, pictographs, typographic marks.
pub fn strip_noise(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation() {
                Some(c)
            } else if ('\u{2010}'..='\u{2015}').contains(&c) {
                Some(' ')
            } else {
                None
            }
        })
        .collect()
}

enum RunChar {
    Letter(char),
    // Removed by a later step without leaving a space.
    Transparent,
    Break,
}

fn run_char(c: char) -> RunChar {
    if c == '\'' {
        return RunChar::Transparent;
    }
    match std::iter::once(c).nfkd().find(char::is_ascii_alphanumeric) {
        Some(base) if base.is_ascii_alphabetic() => RunChar::Letter(base.to_ascii_lowercase()),
        Some(_) => RunChar::Break,
        None if c.is_whitespace() || c.is_ascii_punctuation() => RunChar::Break,
        None => RunChar::Transparent,
    }
}

/// Runs of three or more of the same letter are cut to two: "sooooo" -> "soo",
/// "cooool" -> "cool". Letters compare by lowercase ASCII base form, and
/// characters later steps delete (apostrophes, letters with no ASCII form)
/// do not end a run, so "soo'o" -> "soo'".
pub fn collapse_elongation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_key = None;
    let mut run_len = 0;

    for c in text.chars() {
        match run_char(c) {
            RunChar::Letter(key) => {
                if run_key == Some(key) {
                    run_len += 1;
                } else {
                    run_key = Some(key);
                    run_len = 1;
                }
                if run_len <= 2 {
                    out.push(c);
                }
            }
            RunChar::Transparent => out.push(c),
            RunChar::Break => {
                run_key = None;
                run_len = 0;
                out.push(c);
            }
        }
    }

    out
}

/// A token that is exactly an emoticon becomes its word; symbols are
/// replaced anywhere inside a token.
pub fn replace_emoticons_symbols(text: &str) -> String {
    TOKEN_REGEX
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            match EMOTICON_WORDS.get(token) {
                Some(word) => format!(" {} ", word),
                None => replace_symbols(token),
            }
        })
        .into_owned()
}

fn replace_symbols(token: &str) -> String {
    SYMBOL_REGEX
        .replace_all(token, |caps: &Captures| {
            let word = SYMBOL_WORDS.get(&caps[0]).copied().unwrap_or("");
            format!(" {} ", word)
        })
        .into_owned()
}

/// Apostrophes are deleted so contractions stay one word ("it's" -> "its");
/// any other punctuation becomes a space.
pub fn strip_punctuation(text: &str) -> String {
    let joined = text.replace('\'', "");
    PUNCTUATION_REGEX.replace_all(&joined, " ").into_owned()
}

/// Compatibility-decomposes and keeps the ASCII letters and digits; accents
/// and other marks are dropped, Unicode spaces become plain spaces.
pub fn to_ascii(text: &str) -> String {
    text.nfkd()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect()
}

pub fn strip_digits(text: &str) -> String {
    DIGIT_REGEX.replace_all(text, " ").into_owned()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").trim().to_owned()
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_order() {
        let steps: Vec<_> = Normalizer::standard().steps().collect();
        assert_eq!(steps.len(), 8);
        assert_eq!(steps[2], "replace_emoticons_symbols");
        assert_eq!(steps[3], "strip_punctuation");
        assert_eq!(steps[7], "lowercase");
    }

    #[test]
    fn each_step() {
        assert_eq!(strip_noise("fun 🎮!\u{0007}"), "fun !");
        assert_eq!(collapse_elongation("Sooooo gooood!!!"), "Soo good!!!");
        assert_eq!(collapse_elongation("AAAaaa"), "AA");
        assert_eq!(collapse_elongation("coffee"), "coffee");
        assert_eq!(replace_emoticons_symbols("ok :-) 5%"), "ok  smiley  5 percent ");
        assert_eq!(strip_punctuation("it's great, really."), "its great  really ");
        assert_eq!(to_ascii("Café naïve"), "Cafe naive");
        assert_eq!(strip_digits("ps4 and 2 games"), "ps  and   games");
        assert_eq!(collapse_whitespace("  a \t b\n\nc "), "a b c");
        assert_eq!(lowercase("GREAT"), "great");
    }

    #[test]
    fn emoticons_survive_until_replaced() {
        let normalizer = Normalizer::standard();
        assert_eq!(normalizer.apply("Loved it :) <3"), "loved it smiley love");
        assert_eq!(normalizer.apply("Broken :( 100% refund"), "broken frown percent refund");
    }

    #[test]
    fn emoticons_need_a_whole_token() {
        let normalizer = Normalizer::standard();
        assert_eq!(normalizer.apply("Shipped in <30 minutes"), "shipped in minutes");
        assert_eq!(normalizer.apply("Great pad (PS4): works"), "great pad ps works");
        assert_eq!(normalizer.apply("Rating:Decent"), "rating decent");
        assert_eq!(normalizer.apply("fun :D but <3"), "fun laughing but love");
        assert_eq!(replace_emoticons_symbols("how/why"), "how/why");
        assert_eq!(replace_emoticons_symbols("w/o"), " with o");
    }

    #[test]
    fn apostrophes_do_not_split_runs() {
        let normalizer = Normalizer::standard();
        assert_eq!(collapse_elongation("soo'o good"), "soo' good");
        let once = normalizer.apply("soo'o good");
        assert_eq!(once, "soo good");
        assert_eq!(normalizer.apply(&once), once);
        assert_eq!(normalizer.apply("nooo'o''oo"), "noo");
    }

    #[test]
    fn full_pipeline() {
        let normalizer = Normalizer::standard();
        assert_eq!(normalizer.apply("This game is great and fun!!"), "this game is great and fun");
        assert_eq!(
            normalizer.apply("Terrible broken game, waste of money."),
            "terrible broken game waste of money"
        );
        assert_eq!(normalizer.apply("It's okay, nothing special."), "its okay nothing special");
        assert_eq!(normalizer.apply("1234 !!! ..."), "");
    }

    #[test]
    fn trace_ends_with_apply() {
        let normalizer = Normalizer::standard();
        let text = "WOOOW, $20 w/ DLC :D";
        let trace = normalizer.trace(text);
        assert_eq!(trace.len(), 8);
        assert_eq!(trace.last().map(|t| t.1.clone()), Some(normalizer.apply(text)));
        assert_eq!(normalizer.apply(text), "woow dollar with dlc laughing");
    }

    #[test]
    fn drops_empty_documents() {
        let reviews = vec![
            Review::new(0, 5, "Nice!"),
            Review::new(1, 1, "!!! 111"),
            Review::new(2, 3, "fine"),
        ];
        let (kept, report) = normalize_reviews(reviews, &Normalizer::standard());
        assert_eq!(report.dropped, vec![1]);
        assert_eq!(report.kept, 2);
        let ids: Vec<_> = kept.iter().map(|r| r.document_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(kept[0].raw_text, "nice");
    }
}
