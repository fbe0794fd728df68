use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Input
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },

    // Cleaning
    #[error("document {0} is empty after normalization")]
    EmptyDocument(usize),

    // Modelling
    #[error("no terms left after pruning for {0}")]
    VocabularyEmpty(String),

    #[error("model fit failed for {branch}: {reason}")]
    ModelFit { branch: String, reason: String },

    // Ambient
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad resource {}, line {line}: {reason}", path.display())]
    Resource {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl Error {
    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fit<B: Into<String>, R: Into<String>>(branch: B, reason: R) -> Self {
        Error::ModelFit {
            branch: branch.into(),
            reason: reason.into(),
        }
    }

    /// Names the branch a model or vocabulary failure belongs to.
    pub fn in_branch(self, name: &str) -> Self {
        match self {
            Error::ModelFit { reason, .. } => Error::ModelFit {
                branch: name.to_owned(),
                reason,
            },
            Error::VocabularyEmpty(_) => Error::VocabularyEmpty(name.to_owned()),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
