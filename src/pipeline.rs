use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::{error, info};
use ndarray::{concatenate, Array1, Array2, Axis};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::evaluate::{evaluate, ConfusionMatrix};
use crate::forest::RandomForestBuilder;
use crate::loader::{load_reviews, LoadReport};
use crate::normalize::{normalize_reviews, NormalizeReport, Normalizer};
use crate::resources::Resources;
use crate::sentiment::SentimentTable;
use crate::split::{stratified_split, Split};
use crate::tokenize::{tokenize_reviews, TokenRecord};
use crate::topics::{fit_topics, topics, Topic, TopicFit};
use crate::vectorize::{DocumentTermMatrix, Weighting};
use crate::Review;

pub const SENTIMENT_FEATURE: &str = "sentiment_score";

/// Outcome of one independent part of a run.
#[derive(Debug)]
pub struct Branch<T> {
    pub name: String,
    pub result: Result<T>,
}

impl<T> Branch<T> {
    fn new(name: &str, result: Result<T>) -> Self {
        if let Err(e) = &result {
            error!("branch {} failed: {}", name, e);
        }
        Self {
            name: name.to_owned(),
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn ok(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }
}

#[derive(Debug)]
pub struct ClassificationReport {
    pub weighting: Weighting,
    pub n_train: usize,
    pub n_test: usize,
    // Terms plus the sentiment column
    pub n_features: usize,
    pub confusion: ConfusionMatrix,
    pub importance: Vec<(String, f64)>,
    pub oob_error: Option<f64>,
}

#[derive(Debug)]
pub struct TopicReport {
    pub ratings: Vec<u8>,
    pub n_documents: usize,
    pub n_terms: usize,
    pub topics: Vec<Topic>,
    pub fit: TopicFit,
}

#[derive(Debug)]
pub struct RunReport {
    pub load: Option<LoadReport>,
    pub normalize: NormalizeReport,
    pub tokens: Vec<TokenRecord>,
    pub sentiment: SentimentTable,
    pub split: Split,
    pub vocabulary: HashMap<Weighting, usize>,
    pub classification: Vec<Branch<ClassificationReport>>,
    pub topics: Vec<Branch<TopicReport>>,
}

impl RunReport {
    pub fn failed_branches(&self) -> Vec<&str> {
        let classification = self
            .classification
            .iter()
            .filter(|b| !b.is_ok())
            .map(|b| b.name.as_str());
        let topics = self.topics.iter().filter(|b| !b.is_ok()).map(|b| b.name.as_str());
        classification.chain(topics).collect()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    resources: Resources,
    normalizer: Normalizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            resources: Resources::english(),
            normalizer: Normalizer::standard(),
        })
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<RunReport> {
        let (reviews, load) = load_reviews(path, self.config.max_documents, self.config.parse_policy)?;
        let mut report = self.run_reviews(reviews)?;
        report.load = Some(load);
        Ok(report)
    }

    /// Runs every stage after loading. Errors are returned only for stages
    /// every branch depends on.
    pub fn run_reviews(&self, reviews: Vec<Review>) -> Result<RunReport> {
        let config = &self.config;

        let (reviews, normalize) = normalize_reviews(reviews, &self.normalizer);
        if reviews.is_empty() {
            return Err(Error::fit("corpus", "no reviews left after normalization"));
        }

        let tokens = tokenize_reviews(&reviews, &self.resources);
        let sentiment = SentimentTable::score(
            &reviews,
            &tokens,
            &*self.resources.lexicon,
            config.sentiment_mean,
        );

        // Vocabulary is pruned over the whole corpus, before the split.
        let doc_ids: Vec<usize> = reviews.iter().map(|r| r.document_id).collect();
        let counts = DocumentTermMatrix::counts(&doc_ids, &tokens);
        let tf_idf = counts.tf_idf().prune(config.min_doc_fraction);
        let counts = counts.prune(config.min_doc_fraction);
        let mut vocabulary = HashMap::new();
        for dtm in [&counts, &tf_idf].iter() {
            info!("{} vocabulary: {} terms", dtm.weighting().name(), dtm.n_terms());
            vocabulary.insert(dtm.weighting(), dtm.n_terms());
        }

        let split = stratified_split(&reviews, config.train_fraction, config.seed);
        let ratings: HashMap<usize, u8> = reviews.iter().map(|r| (r.document_id, r.rating)).collect();

        let classification = [&counts, &tf_idf]
            .iter()
            .map(|dtm| {
                let name = dtm.weighting().name();
                let result = self
                    .classify(dtm, &split, &sentiment, &ratings)
                    .map_err(|e| e.in_branch(name));
                Branch::new(name, result)
            })
            .collect();

        let topic_branches = [
            ("satisfied", &config.topics.satisfied),
            ("dissatisfied", &config.topics.dissatisfied),
        ]
        .iter()
        .map(|(name, subset)| {
            let result = self
                .model_topics(&reviews, &tokens, subset)
                .map_err(|e| e.in_branch(name));
            Branch::new(name, result)
        })
        .collect();

        Ok(RunReport {
            load: None,
            normalize,
            tokens,
            sentiment,
            split,
            vocabulary,
            classification,
            topics: topic_branches,
        })
    }

    fn classify(
        &self,
        dtm: &DocumentTermMatrix,
        split: &Split,
        sentiment: &SentimentTable,
        ratings: &HashMap<usize, u8>,
    ) -> Result<ClassificationReport> {
        if dtm.n_terms() == 0 {
            return Err(Error::VocabularyEmpty(dtm.weighting().name().into()));
        }
        let forest_config = &self.config.forest;

        let mut feature_names: Vec<String> = dtm.terms().map(str::to_owned).collect();
        feature_names.push(SENTIMENT_FEATURE.to_owned());
        let n_features = feature_names.len();

        let mut builder = RandomForestBuilder::new(forest_config.n_trees);
        builder
            .min_node_size(forest_config.min_node_size)
            .seed(self.config.seed);
        if let Some(m) = forest_config.max_features {
            builder.max_features(m);
        }
        if let Some(depth) = forest_config.max_depth {
            builder.max_depth(depth);
        }

        let forest = {
            let x = features(dtm, &split.train, sentiment)?;
            let y = labels(&split.train, ratings);
            builder.fit(&x, &y, feature_names)?
        };

        let predicted = {
            let x = features(dtm, &split.test, sentiment)?;
            forest.predict(&x)
        };
        let actual = labels(&split.test, ratings);
        let confusion = evaluate(&predicted, &actual);
        info!(
            "{}: accuracy {:.4} on {} test documents",
            dtm.weighting().name(),
            confusion.accuracy(),
            actual.len()
        );

        let mut importance = forest.feature_importance();
        importance.truncate(forest_config.report_top_features);

        Ok(ClassificationReport {
            weighting: dtm.weighting(),
            n_train: split.train.len(),
            n_test: split.test.len(),
            n_features,
            confusion,
            importance,
            oob_error: forest.oob_error(),
        })
    }

    fn model_topics(&self, reviews: &[Review], tokens: &[TokenRecord], subset: &[u8]) -> Result<TopicReport> {
        let doc_ids: Vec<usize> = reviews
            .iter()
            .filter(|r| subset.contains(&r.rating))
            .map(|r| r.document_id)
            .collect();
        if doc_ids.is_empty() {
            return Err(Error::fit("topics", format!("no reviews rated {:?}", subset)));
        }

        let counts = DocumentTermMatrix::counts(&doc_ids, tokens).prune(self.config.min_doc_fraction);
        let fit = fit_topics(&counts, &self.config.topics, self.config.seed)?;

        Ok(TopicReport {
            ratings: subset.to_vec(),
            n_documents: fit.doc_ids.len(),
            n_terms: counts.n_terms(),
            topics: topics(&fit, self.config.topics.top_n),
            fit,
        })
    }
}

/// Dense term weights for `doc_ids` with the document sentiment appended
/// as the last column.
fn features(dtm: &DocumentTermMatrix, doc_ids: &[usize], sentiment: &SentimentTable) -> Result<Array2<f64>> {
    let terms = dtm.dense(doc_ids);
    let scores: Array1<f64> = doc_ids.iter().map(|&id| sentiment.document(id)).collect();
    let scores = scores.insert_axis(Axis(1));
    concatenate(Axis(1), &[terms.view(), scores.view()])
        .map_err(|e| Error::fit(dtm.weighting().name(), e.to_string()))
}

fn labels(doc_ids: &[usize], ratings: &HashMap<usize, u8>) -> Vec<u8> {
    doc_ids.iter().filter_map(|id| ratings.get(id).copied()).collect()
}

impl<T: fmt::Display> fmt::Display for Branch<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.result {
            Ok(report) => write!(f, "== {} ==\n{}", self.name, report),
            Err(e) => writeln!(f, "== {} == FAILED: {}", self.name, e),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} train / {} test documents, {} features",
            self.n_train, self.n_test, self.n_features
        )?;
        write!(f, "{}", self.confusion)?;
        let missed = self.confusion.missed_classes();
        if !missed.is_empty() {
            writeln!(f, "warning: ratings {:?} were never predicted correctly", missed)?;
        }
        if let Some(oob) = self.oob_error {
            writeln!(f, "out-of-bag error {:.4}", oob)?;
        }
        writeln!(f, "feature importance:")?;
        for (term, score) in &self.importance {
            writeln!(f, "  {0: <20}  \t---\t  {1:.4}", term, score)?;
        }
        Ok(())
    }
}

impl fmt::Display for TopicReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "ratings {:?}: {} documents, {} terms",
            self.ratings, self.n_documents, self.n_terms
        )?;
        for topic in &self.topics {
            write!(f, "{}", topic)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(load) = &self.load {
            writeln!(
                f,
                "loaded {} reviews from {} lines ({} malformed, {} incomplete)",
                load.kept, load.lines, load.malformed, load.incomplete
            )?;
        }
        writeln!(
            f,
            "{} reviews after cleaning ({} empty dropped), {} tokens",
            self.normalize.kept,
            self.normalize.dropped.len(),
            self.tokens.len()
        )?;
        writeln!(f, "mean sentiment by rating:")?;
        for (rating, score) in self.sentiment.by_rating() {
            writeln!(f, "  {}: {:+.4}", rating, score)?;
        }
        writeln!(f)?;
        for branch in &self.classification {
            writeln!(f, "{}", branch)?;
        }
        for branch in &self.topics {
            writeln!(f, "{}", branch)?;
        }
        Ok(())
    }
}
