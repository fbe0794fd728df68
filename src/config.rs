use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What the loader does with a line that is not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Log the line, count it and keep reading.
    Skip,
    /// Abort the load with `Error::Parse`.
    FailFast,
}

/// How token polarities are averaged into a document score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentMean {
    /// Mean over every token; lemmas missing from the lexicon count as 0.
    AllTokens,
    /// Mean over lexicon hits only.
    MatchedTokens,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inference {
    Gibbs,
    OnlineVariational,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_documents: usize,
    pub parse_policy: ParsePolicy,
    // Keep terms present in at least this fraction of documents
    pub min_doc_fraction: f64,
    pub train_fraction: f64,
    pub seed: u64,
    pub sentiment_mean: SentimentMean,
    pub forest: ForestConfig,
    pub topics: TopicConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_documents: 5000,
            parse_policy: ParsePolicy::Skip,
            min_doc_fraction: 0.01,
            train_fraction: 0.7,
            seed: 42,
            sentiment_mean: SentimentMean::AllTokens,
            forest: ForestConfig::default(),
            topics: TopicConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    // Candidate features per split, floor(sqrt(p)) when unset
    pub max_features: Option<usize>,
    pub min_node_size: usize,
    pub max_depth: Option<usize>,
    // How many ranked features the report prints
    pub report_top_features: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: None,
            min_node_size: 1,
            max_depth: None,
            report_top_features: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub k: usize,
    pub top_n: usize,
    // Gibbs sweeps
    pub iterations: usize,
    // Online variational Bayes: passes over the subset, documents per update
    pub passes: usize,
    pub batch_size: usize,
    // Dirichlet prior on document-topic mixtures; 50/k for Gibbs and 1/k
    // for online variational Bayes when unset
    pub alpha: Option<f64>,
    // Dirichlet prior on topic-term distributions
    pub eta: f64,
    pub inference: Inference,
    pub satisfied: Vec<u8>,
    pub dissatisfied: Vec<u8>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            k: 3,
            top_n: 15,
            iterations: 500,
            passes: 10,
            batch_size: 256,
            alpha: None,
            eta: 0.1,
            inference: Inference::Gibbs,
            satisfied: vec![4, 5],
            dissatisfied: vec![1, 2],
        }
    }
}

impl TopicConfig {
    pub fn alpha(&self) -> f64 {
        let k = self.k as f64;
        self.alpha.unwrap_or(match self.inference {
            Inference::Gibbs => 50.0 / k,
            Inference::OnlineVariational => 1.0 / k,
        })
    }
}

impl PipelineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_documents == 0 {
            return Err(Error::Config("max_documents must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_doc_fraction) {
            return Err(Error::Config(format!(
                "min_doc_fraction {} is not in [0, 1]",
                self.min_doc_fraction
            )));
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(Error::Config(format!(
                "train_fraction {} is not in (0, 1)",
                self.train_fraction
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(Error::Config("forest.n_trees must be positive".into()));
        }
        if self.forest.max_features == Some(0) {
            return Err(Error::Config("forest.max_features must be positive".into()));
        }
        if self.forest.min_node_size == 0 {
            return Err(Error::Config("forest.min_node_size must be positive".into()));
        }
        let topics = &self.topics;
        if topics.k == 0 {
            return Err(Error::Config("topics.k must be positive".into()));
        }
        if topics.iterations == 0 || topics.passes == 0 || topics.batch_size == 0 {
            return Err(Error::Config(
                "topic iterations, passes and batch_size must be positive".into(),
            ));
        }
        if topics.alpha() <= 0.0 || topics.eta <= 0.0 {
            return Err(Error::Config("topic priors must be positive".into()));
        }
        for rating in topics.satisfied.iter().chain(topics.dissatisfied.iter()) {
            if !(1..=5).contains(rating) {
                return Err(Error::Config(format!("rating {} is not in 1..=5", rating)));
            }
        }
        if topics
            .satisfied
            .iter()
            .any(|r| topics.dissatisfied.contains(r))
        {
            return Err(Error::Config(
                "satisfied and dissatisfied ratings overlap".into(),
            ));
        }
        Ok(())
    }
}
