use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use log::info;

use crate::config::SentimentMean;
use crate::resources::{Polarity, PolarityLexicon};
use crate::tokenize::TokenRecord;
use crate::Review;

/// Lemma polarities and per-document mean sentiment.
#[derive(Debug, Clone, Default)]
pub struct SentimentTable {
    lemmas: HashMap<String, Polarity>,
    documents: IndexMap<usize, f64>,
    by_rating: BTreeMap<u8, f64>,
}

impl SentimentTable {
    /// Scores every review. Documents with no tokens (or, with
    /// `MatchedTokens`, no lexicon hits) score 0.
    pub fn score(
        reviews: &[Review],
        records: &[TokenRecord],
        lexicon: &dyn PolarityLexicon,
        mean: SentimentMean,
    ) -> Self {
        let mut lemmas = HashMap::new();
        // doc -> (sum, denominator)
        let mut sums: HashMap<usize, (f64, usize)> = HashMap::new();

        for record in records {
            let polarity = *lemmas
                .entry(record.lemma.clone())
                .or_insert_with(|| lexicon.polarity(&record.lemma));
            let counted = match mean {
                SentimentMean::AllTokens => true,
                SentimentMean::MatchedTokens => polarity != Polarity::Neutral,
            };
            if counted {
                let entry = sums.entry(record.document_id).or_insert((0.0, 0));
                entry.0 += f64::from(polarity.score());
                entry.1 += 1;
            }
        }

        let documents: IndexMap<usize, f64> = reviews
            .iter()
            .map(|review| {
                let score = match sums.get(&review.document_id) {
                    Some(&(sum, n)) if n > 0 => sum / n as f64,
                    _ => 0.0,
                };
                (review.document_id, score)
            })
            .collect();

        let mut per_rating: BTreeMap<u8, (f64, usize)> = BTreeMap::new();
        for review in reviews {
            let entry = per_rating.entry(review.rating).or_insert((0.0, 0));
            entry.0 += documents[&review.document_id];
            entry.1 += 1;
        }
        let by_rating: BTreeMap<u8, f64> = per_rating
            .into_iter()
            .map(|(rating, (sum, n))| (rating, sum / n as f64))
            .collect();

        for (rating, score) in &by_rating {
            info!("mean sentiment for rating {}: {:+.3}", rating, score);
        }

        Self {
            lemmas,
            documents,
            by_rating,
        }
    }

    /// Polarity of a lemma seen during scoring.
    pub fn polarity(&self, lemma: &str) -> Option<Polarity> {
        self.lemmas.get(lemma).copied()
    }

    pub fn document(&self, doc_id: usize) -> f64 {
        self.documents.get(&doc_id).copied().unwrap_or(0.0)
    }

    pub fn documents(&self) -> &IndexMap<usize, f64> {
        &self.documents
    }

    /// Mean document sentiment per rating class.
    pub fn by_rating(&self) -> &BTreeMap<u8, f64> {
        &self.by_rating
    }
}
