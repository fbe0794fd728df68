use std::collections::HashMap;

use indexmap::IndexSet;
use log::debug;
use ndarray::Array2;

use crate::tokenize::TokenRecord;
use crate::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weighting {
    Count,
    TfIdf,
}

impl Weighting {
    pub fn name(self) -> &'static str {
        match self {
            Weighting::Count => "count",
            Weighting::TfIdf => "tfidf",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    weighting: Weighting,
    doc_ids: Vec<usize>,
    rows: Vec<Document>,
    terms: IndexSet<String>,
}

impl DocumentTermMatrix {
    /// Lemma counts for `doc_ids`. Documents without token records get an
    /// empty row; records of other documents are ignored.
    pub fn counts(doc_ids: &[usize], records: &[TokenRecord]) -> Self {
        let position: HashMap<usize, usize> = doc_ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        let mut terms = IndexSet::new();
        let mut rows = vec![Document::new(); doc_ids.len()];

        for record in records {
            if let Some(&row) = position.get(&record.document_id) {
                let (term, _) = terms.insert_full(record.lemma.clone());
                *rows[row].words.entry(term).or_insert(0_f64) += 1_f64;
            }
        }

        Self {
            weighting: Weighting::Count,
            doc_ids: doc_ids.to_vec(),
            rows,
            terms,
        }
    }

    /// tf = count / document total, idf = ln(n_documents / document frequency).
    /// Every stored count cell keeps a stored tf-idf cell, even when idf is 0.
    pub fn tf_idf(&self) -> Self {
        let n_docs = self.n_docs() as f64;
        let idf: Vec<f64> = self
            .document_frequency()
            .into_iter()
            .map(|df| if df == 0 { 0.0 } else { (n_docs / df as f64).ln() })
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let total = row.total();
                let mut doc = Document::new();
                for (&term, &count) in row.words.iter() {
                    doc.words.insert(term, count / total * idf[term]);
                }
                doc
            })
            .collect();

        Self {
            weighting: Weighting::TfIdf,
            doc_ids: self.doc_ids.clone(),
            rows,
            terms: self.terms.clone(),
        }
    }

    /// Drops columns stored in fewer than `min_doc_fraction * n_documents`
    /// documents, and columns whose weights are all zero. Rows are kept.
    pub fn prune(&self, min_doc_fraction: f64) -> Self {
        let min_df = min_doc_fraction * self.n_docs() as f64;
        let df = self.document_frequency();
        let mut nonzero = vec![false; self.n_terms()];
        for row in &self.rows {
            for (&term, &weight) in row.words.iter() {
                if weight != 0.0 {
                    nonzero[term] = true;
                }
            }
        }

        let mut terms = IndexSet::new();
        let mut remap = vec![None; self.n_terms()];
        for (idx, term) in self.terms.iter().enumerate() {
            if df[idx] > 0 && df[idx] as f64 >= min_df && nonzero[idx] {
                let (new_idx, _) = terms.insert_full(term.clone());
                remap[idx] = Some(new_idx);
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| Document {
                words: row
                    .words
                    .iter()
                    .filter_map(|(&term, &weight)| remap[term].map(|t| (t, weight)))
                    .collect(),
            })
            .collect();

        debug!(
            "{} matrix pruned from {} to {} terms (min df {:.2})",
            self.weighting.name(),
            self.n_terms(),
            terms.len(),
            min_df
        );

        Self {
            weighting: self.weighting,
            doc_ids: self.doc_ids.clone(),
            rows,
            terms,
        }
    }

    /// Number of documents storing each term.
    pub fn document_frequency(&self) -> Vec<usize> {
        let mut df = vec![0; self.n_terms()];
        for row in &self.rows {
            for &term in row.words.keys() {
                df[term] += 1;
            }
        }
        df
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    pub fn n_docs(&self) -> usize {
        self.rows.len()
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|row| row.words.len()).sum()
    }

    pub fn doc_ids(&self) -> &[usize] {
        &self.doc_ids
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.terms.get_index_of(term)
    }

    pub fn rows(&self) -> &[Document] {
        &self.rows
    }

    pub fn row(&self, doc_id: usize) -> Option<&Document> {
        self.doc_ids
            .iter()
            .position(|&id| id == doc_id)
            .map(|row| &self.rows[row])
    }

    pub fn get(&self, doc_id: usize, term: &str) -> f64 {
        match (self.row(doc_id), self.term_index(term)) {
            (Some(row), Some(term)) => row.words.get(&term).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Dense `doc_ids.len() x n_terms` copy of the requested rows; unknown
    /// identifiers give zero rows.
    pub fn dense(&self, doc_ids: &[usize]) -> Array2<f64> {
        let position: HashMap<usize, usize> = self
            .doc_ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        let mut dense = Array2::zeros((doc_ids.len(), self.n_terms()));
        for (out_row, id) in doc_ids.iter().enumerate() {
            if let Some(&row) = position.get(id) {
                for (&term, &weight) in self.rows[row].words.iter() {
                    dense[[out_row, term]] = weight;
                }
            }
        }
        dense
    }
}
