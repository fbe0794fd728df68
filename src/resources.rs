use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

const BUILTIN_STOP_WORDS: &str = include_str!("../resources/stopwords.txt");
const BUILTIN_LEMMAS: &str = include_str!("../resources/lemmas.tsv");
const BUILTIN_POLARITY: &str = include_str!("../resources/polarity.csv");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Polarity {
    Negative,
    Neutral,
    Positive,
}

impl Polarity {
    pub fn score(self) -> i8 {
        match self {
            Polarity::Negative => -1,
            Polarity::Neutral => 0,
            Polarity::Positive => 1,
        }
    }
}

pub trait StopWords {
    /// Case-insensitive exact match.
    fn is_stop_word(&self, word: &str) -> bool;
}

pub trait LemmaDictionary {
    fn lemma(&self, word: &str) -> Option<&str>;

    /// Dictionary lemma, or the word itself when it has no entry.
    fn lemmatize(&self, word: &str) -> String {
        self.lemma(word).unwrap_or(word).to_owned()
    }
}

pub trait PolarityLexicon {
    /// `Neutral` for words the lexicon does not know.
    fn polarity(&self, lemma: &str) -> Polarity;
}

fn entries<'a>(text: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

#[derive(Debug, Clone, Default)]
pub struct WordSet {
    words: HashSet<String>,
}

impl WordSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn english() -> Self {
        Self::parse(BUILTIN_STOP_WORDS)
    }

    // One word per line.
    pub fn parse(text: &str) -> Self {
        Self::new(entries(text).map(|(_, word)| word))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::parse(&read(path.as_ref())?))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

impl StopWords for WordSet {
    fn is_stop_word(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LemmaTable {
    lemmas: HashMap<String, String>,
}

impl LemmaTable {
    pub fn english() -> Self {
        // Checked by `builtin_tables_parse`.
        Self::parse(BUILTIN_LEMMAS, Path::new("<builtin lemmas>")).unwrap_or_default()
    }

    // `inflected<TAB>lemma` per line; both sides are lowercased.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut lemmas = HashMap::new();
        for (line, entry) in entries(text) {
            let mut fields = entry.split('\t').map(str::trim);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(form), Some(lemma), None) if !form.is_empty() && !lemma.is_empty() => {
                    lemmas.insert(form.to_lowercase(), lemma.to_lowercase());
                }
                _ => {
                    return Err(Error::Resource {
                        path: PathBuf::from(origin),
                        line,
                        reason: "expected `inflected<TAB>lemma`".into(),
                    })
                }
            }
        }
        Ok(Self { lemmas })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(&read(path)?, path)
    }

    pub fn insert<S: AsRef<str>>(&mut self, form: S, lemma: S) {
        self.lemmas
            .insert(form.as_ref().to_lowercase(), lemma.as_ref().to_lowercase());
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }
}

impl LemmaDictionary for LemmaTable {
    fn lemma(&self, word: &str) -> Option<&str> {
        self.lemmas.get(word).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolarityTable {
    words: HashMap<String, Polarity>,
}

impl PolarityTable {
    pub fn english() -> Self {
        Self::parse(BUILTIN_POLARITY, Path::new("<builtin polarity>")).unwrap_or_default()
    }

    // `word,positive` or `word,negative` per line.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut words = HashMap::new();
        for (line, entry) in entries(text) {
            let (word, label) = match entry.split_once(',') {
                Some((word, label)) => (word.trim(), label.trim()),
                None => ("", ""),
            };
            let polarity = match label.to_lowercase().as_str() {
                "positive" => Polarity::Positive,
                "negative" => Polarity::Negative,
                _ => {
                    return Err(Error::Resource {
                        path: PathBuf::from(origin),
                        line,
                        reason: format!("expected `word,positive|negative`, got `{}`", entry),
                    })
                }
            };
            if word.is_empty() {
                return Err(Error::Resource {
                    path: PathBuf::from(origin),
                    line,
                    reason: "empty word".into(),
                });
            }
            words.insert(word.to_lowercase(), polarity);
        }
        Ok(Self { words })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(&read(path)?, path)
    }

    pub fn insert<S: AsRef<str>>(&mut self, word: S, polarity: Polarity) {
        self.words.insert(word.as_ref().to_lowercase(), polarity);
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl PolarityLexicon for PolarityTable {
    fn polarity(&self, lemma: &str) -> Polarity {
        self.words.get(lemma).copied().unwrap_or(Polarity::Neutral)
    }
}

/// The three lookups a run needs.
pub struct Resources {
    pub stop_words: Box<dyn StopWords>,
    pub lemmas: Box<dyn LemmaDictionary>,
    pub lexicon: Box<dyn PolarityLexicon>,
}

impl Resources {
    pub fn new(
        stop_words: Box<dyn StopWords>,
        lemmas: Box<dyn LemmaDictionary>,
        lexicon: Box<dyn PolarityLexicon>,
    ) -> Self {
        Self {
            stop_words,
            lemmas,
            lexicon,
        }
    }

    pub fn english() -> Self {
        Self::new(
            Box::new(WordSet::english()),
            Box::new(LemmaTable::english()),
            Box::new(PolarityTable::english()),
        )
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_parse() {
        assert!(LemmaTable::parse(BUILTIN_LEMMAS, Path::new("lemmas")).is_ok());
        assert!(PolarityTable::parse(BUILTIN_POLARITY, Path::new("polarity")).is_ok());
        assert!(WordSet::english().len() > 150);
        assert!(LemmaTable::english().len() > 500);
        assert!(PolarityTable::english().len() > 200);
    }

    #[test]
    fn stop_words_ignore_case() {
        let stop = WordSet::english();
        assert!(stop.is_stop_word("the"));
        assert!(stop.is_stop_word("The"));
        assert!(stop.is_stop_word("its"));
        assert!(!stop.is_stop_word("game"));
        assert!(!stop.is_stop_word("nothing"));
        assert!(!stop.is_stop_word("okay"));
    }

    #[test]
    fn lemma_lookup_falls_back_to_word() {
        let lemmas = LemmaTable::english();
        assert_eq!(lemmas.lemmatize("playing"), "play");
        assert_eq!(lemmas.lemmatize("games"), "game");
        assert_eq!(lemmas.lemmatize("broken"), "break");
        assert_eq!(lemmas.lemmatize("zelda"), "zelda");
    }

    #[test]
    fn inserted_entries_match_lowercase_lookups() {
        let mut lemmas = LemmaTable::default();
        lemmas.insert("Games", "Game");
        assert_eq!(lemmas.lemmatize("games"), "game");

        let mut lexicon = PolarityTable::default();
        lexicon.insert("Superb", Polarity::Positive);
        assert_eq!(lexicon.polarity("superb"), Polarity::Positive);
    }

    #[test]
    fn polarity_lookup() {
        let lexicon = PolarityTable::english();
        assert_eq!(lexicon.polarity("great"), Polarity::Positive);
        assert_eq!(lexicon.polarity("terrible"), Polarity::Negative);
        assert_eq!(lexicon.polarity("game"), Polarity::Neutral);
        assert_eq!(Polarity::Negative.score(), -1);
    }

    #[test]
    fn malformed_lines_are_reported() {
        let err = LemmaTable::parse("# header\ngames\tgame\nbroken\n", Path::new("l.tsv")).unwrap_err();
        match err {
            Error::Resource { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }

        let err = PolarityTable::parse("good,positive\nbad,meh\n", Path::new("p.csv")).unwrap_err();
        assert!(matches!(err, Error::Resource { line: 2, .. }));
    }

    #[test]
    fn custom_resources() {
        let stop = WordSet::new(vec!["Foo", "bar"]);
        assert!(stop.is_stop_word("foo"));
        let mut lexicon = PolarityTable::default();
        lexicon.insert("meh", Polarity::Negative);
        assert_eq!(lexicon.polarity("meh"), Polarity::Negative);
    }
}
