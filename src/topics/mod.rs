use std::fmt;

use indexmap::IndexMap;
use log::info;
use ndarray::Array2;

use crate::config::{Inference, TopicConfig};
use crate::error::{Error, Result};
use crate::vectorize::{DocumentTermMatrix, Weighting};
use crate::Document;

mod gibbs;
mod online;

pub use self::gibbs::{GibbsLda, GibbsLdaBuilder};
pub use self::online::{OnlineLda, OnlineLdaBuilder};

pub trait TopicModel {
    fn n_topics(&self) -> usize;

    /// Topic-term weights, `n_topics x n_terms`, every row summing to 1.
    fn beta(&self) -> Array2<f64>;

    /// Document-topic weights, `n_documents x n_topics`, every row summing to 1.
    fn gamma(&self) -> Array2<f64>;
}

/// A fitted topic model detached from its sampler state. Topic ids are
/// labels only: fits with different seeds may order the same topics
/// differently.
#[derive(Debug, Clone)]
pub struct TopicFit {
    pub terms: Vec<String>,
    // Rows of `gamma`, in order
    pub doc_ids: Vec<usize>,
    pub beta: Array2<f64>,
    pub gamma: Array2<f64>,
}

impl TopicFit {
    pub fn n_topics(&self) -> usize {
        self.beta.nrows()
    }

    /// Topic mixture of one fitted document.
    pub fn mixture(&self, doc_id: usize) -> Option<Vec<f64>> {
        let row = self.doc_ids.iter().position(|&id| id == doc_id)?;
        Some(self.gamma.row(row).to_vec())
    }
}

/// Fits `config.k` topics on the rows of a count matrix. Rows without any
/// term are left out of the fit.
pub fn fit_topics(dtm: &DocumentTermMatrix, config: &TopicConfig, seed: u64) -> Result<TopicFit> {
    if dtm.weighting() != Weighting::Count {
        return Err(Error::fit("topics", "topic models need a count matrix"));
    }
    if dtm.n_terms() == 0 {
        return Err(Error::VocabularyEmpty("topics".into()));
    }

    let (doc_ids, docs): (Vec<usize>, Vec<Document>) = dtm
        .doc_ids()
        .iter()
        .zip(dtm.rows())
        .filter(|(_, row)| !row.is_empty())
        .map(|(&id, row)| (id, row.clone()))
        .unzip();
    if docs.is_empty() {
        return Err(Error::fit("topics", "every document is empty"));
    }
    if docs.len() < dtm.n_docs() {
        info!("fitting topics on {} of {} documents", docs.len(), dtm.n_docs());
    }

    let (beta, gamma) = match config.inference {
        Inference::Gibbs => {
            let mut lda = GibbsLdaBuilder::new(dtm.n_terms(), config.k)
                .alpha(config.alpha())
                .eta(config.eta)
                .seed(seed)
                .build(&docs)?;
            lda.train(config.iterations);
            (lda.beta(), lda.gamma())
        }
        Inference::OnlineVariational => {
            let mut lda = OnlineLdaBuilder::new(dtm.n_terms(), docs.len(), config.k)
                .alpha(config.alpha())
                .eta(config.eta)
                .seed(fold_seed(seed))
                .build()?;
            for _ in 0..config.passes {
                for batch in docs.chunks(config.batch_size) {
                    lda.update(batch)?;
                }
            }
            lda.infer(&docs)?;
            (lda.beta(), lda.gamma())
        }
    };

    Ok(TopicFit {
        terms: dtm.terms().map(str::to_owned).collect(),
        doc_ids,
        beta,
        gamma,
    })
}

/// A topic's heaviest terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub id: usize,
    pub terms: Vec<(String, f64)>,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "topic {}:", self.id)?;
        for (term, p) in &self.terms {
            writeln!(f, "  {0: <20}  \t---\t  {1:.4}", term, p)?;
        }
        Ok(())
    }
}

// randomkit takes a 32-bit seed.
fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// The `n` heaviest terms of every topic, ranked by beta.
pub fn top_terms(fit: &TopicFit, n: usize) -> IndexMap<usize, Vec<(String, f64)>> {
    fit.beta
        .rows()
        .into_iter()
        .enumerate()
        .map(|(topic, row)| {
            let mut weights: Vec<(usize, f64)> = row.iter().cloned().enumerate().collect();
            weights.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            weights.truncate(n);
            let terms = weights
                .into_iter()
                .map(|(idx, p)| (fit.terms[idx].clone(), p))
                .collect();
            (topic, terms)
        })
        .collect()
}

pub fn topics(fit: &TopicFit, n: usize) -> Vec<Topic> {
    top_terms(fit, n)
        .into_iter()
        .map(|(id, terms)| Topic { id, terms })
        .collect()
}
