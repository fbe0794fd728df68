use indexmap::IndexMap;
use serde::Serialize;

use std::iter::FromIterator;

pub mod config;
pub mod error;
pub mod evaluate;
pub mod forest;
pub mod loader;
mod math;
pub mod normalize;
pub mod pipeline;
pub mod resources;
pub mod sentiment;
pub mod split;
pub mod tokenize;
pub mod topics;
pub mod vectorize;

pub use config::{ForestConfig, Inference, ParsePolicy, PipelineConfig, SentimentMean, TopicConfig};
pub use error::{Error, Result};
pub use evaluate::{evaluate, ClassStats, ConfusionMatrix};
pub use forest::{RandomForest, RandomForestBuilder};
pub use loader::{load_reviews, read_reviews, LoadReport};
pub use normalize::{normalize_reviews, NormalizeReport, Normalizer, Transform};
pub use pipeline::{Branch, ClassificationReport, Pipeline, RunReport, TopicReport};
pub use resources::{LemmaDictionary, Polarity, PolarityLexicon, Resources, StopWords};
pub use sentiment::SentimentTable;
pub use split::{stratified_split, Split};
pub use tokenize::{tokenize_reviews, write_token_table, TokenRecord, Tokenizer};
pub use topics::{
    fit_topics, top_terms, GibbsLda, GibbsLdaBuilder, OnlineLda, OnlineLdaBuilder, Topic, TopicFit, TopicModel,
};
pub use vectorize::{DocumentTermMatrix, Weighting};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    // Row index among the loaded records
    pub document_id: usize,
    pub rating: u8,
    pub raw_text: String,
}

impl Review {
    pub fn new<S: Into<String>>(document_id: usize, rating: u8, raw_text: S) -> Self {
        Self {
            document_id,
            rating,
            raw_text: raw_text.into(),
        }
    }

    /// Same review with its text replaced.
    pub fn with_text(self, raw_text: String) -> Self {
        Self { raw_text, ..self }
    }
}

/// Sparse bag of words: term index -> weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub words: IndexMap<usize, f64>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            words: IndexMap::new(),
        }
    }

    pub fn total(&self) -> f64 {
        self.words.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<'a> FromIterator<&'a usize> for Document {
    fn from_iter<I: IntoIterator<Item = &'a usize>>(iter: I) -> Self {
        let mut doc = Self::new();

        for i in iter {
            *doc.words.entry(*i).or_insert(0_f64) += 1_f64;
        }

        doc
    }
}
