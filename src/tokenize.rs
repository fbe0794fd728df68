use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};
use crate::resources::{LemmaDictionary, Resources, StopWords};
use crate::Review;

/// One surviving token occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRecord {
    pub document_id: usize,
    pub token: String,
    pub lemma: String,
}

pub struct Tokenizer<'r> {
    stop_words: &'r dyn StopWords,
    lemmas: &'r dyn LemmaDictionary,
}

impl<'r> Tokenizer<'r> {
    pub fn new(resources: &'r Resources) -> Self {
        Self {
            stop_words: resources.stop_words.as_ref(),
            lemmas: resources.lemmas.as_ref(),
        }
    }

    /// Unicode word segmentation with stop words removed.
    pub fn tokens<'t>(&self, text: &'t str) -> Vec<&'t str> {
        text.unicode_words()
            .filter(|word| !self.stop_words.is_stop_word(word))
            .collect()
    }

    pub fn records(&self, review: &Review) -> Vec<TokenRecord> {
        self.tokens(&review.raw_text)
            .into_iter()
            .map(|token| TokenRecord {
                document_id: review.document_id,
                token: token.to_owned(),
                lemma: self.lemmas.lemmatize(token),
            })
            .collect()
    }
}

/// Token records for every review, in document order. A review that loses
/// all its words to the stop list contributes no rows but stays in the corpus.
pub fn tokenize_reviews(reviews: &[Review], resources: &Resources) -> Vec<TokenRecord> {
    let tokenizer = Tokenizer::new(resources);
    let records: Vec<TokenRecord> = reviews
        .iter()
        .flat_map(|review| tokenizer.records(review))
        .collect();

    info!("{} tokens from {} reviews", records.len(), reviews.len());
    records
}

/// Writes the token table as newline-delimited JSON.
pub fn write_token_table<P: AsRef<Path>>(path: P, records: &[TokenRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut out, record).map_err(|e| Error::io(path, e.into()))?;
        out.write_all(b"\n").map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))?;

    Ok(())
}
