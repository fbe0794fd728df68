use log::debug;
use ndarray::{Array1, Array2, Axis};
use randomkit::Rng;

use super::TopicModel;
use crate::error::{Error, Result};
use crate::math;
use crate::Document;

const MEAN_CHANGE_THRESHOLD: f64 = 0.001;
const MAX_E_STEP_ITERATIONS: usize = 100;

/// Online variational Bayes for LDA (Hoffman, Blei and Bach, 2010).
pub struct OnlineLda {
    rng: Rng,
    // Vocabulary size
    w: usize,
    // Number of topics
    k: usize,
    // Total number of documents in the population
    d: usize,
    // Hyperparameter for prior on weight vectors theta
    alpha: f64,
    // Hyperparameter for prior on topics beta
    eta: f64,
    // A (positive) learning parameter that downweights early iterations
    tau0: f64,
    // Learning rate: exponential decay rate, in (0.5, 1.0] for
    // asymptotic convergence.
    kappa: f64,
    // Mini-batch iteration number
    updatect: f64,

    // Variational parameters of the topics
    lambda: Array2<f64>,
    // E[log(beta)]
    elogbeta: Array2<f64>,
    // exp(E[log(beta)])
    expelogbeta: Array2<f64>,
    // Normalised document mixtures from the last `infer` call
    theta: Array2<f64>,
}

pub struct OnlineLdaBuilder {
    w: usize,
    k: usize,
    d: usize,
    alpha: f64,
    eta: f64,
    tau0: f64,
    kappa: f64,
    seed: u32,
}

impl OnlineLdaBuilder {
    pub fn new(w: usize, d: usize, k: usize) -> Self {
        Self {
            w,
            d,
            k,
            alpha: 1.0 / k.max(1) as f64,
            eta: 1.0 / k.max(1) as f64,
            tau0: 1025.0,
            kappa: 0.7,
            seed: 1,
        }
    }

    pub fn alpha(&mut self, alpha: f64) -> &mut Self {
        self.alpha = alpha;
        self
    }

    pub fn eta(&mut self, eta: f64) -> &mut Self {
        self.eta = eta;
        self
    }

    pub fn tau0(&mut self, tau0: f64) -> &mut Self {
        self.tau0 = tau0;
        self
    }

    pub fn kappa(&mut self, kappa: f64) -> &mut Self {
        self.kappa = kappa;
        self
    }

    pub fn seed(&mut self, seed: u32) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn build(&self) -> Result<OnlineLda> {
        if self.k == 0 || self.w == 0 || self.d == 0 {
            return Err(Error::fit(
                "online",
                format!("degenerate shape: {} terms, {} documents, {} topics", self.w, self.d, self.k),
            ));
        }
        if !(self.alpha > 0.0 && self.eta > 0.0) {
            return Err(Error::fit("online", "priors must be positive"));
        }

        let mut rng = Rng::from_seed(self.seed);
        let lambda = math::random_gamma(100.0, 0.01, self.k, self.w, &mut rng)?;
        let elogbeta = math::dirichlet_expectation(&lambda);
        let expelogbeta = elogbeta.mapv(f64::exp);

        Ok(OnlineLda {
            rng,
            w: self.w,
            k: self.k,
            d: self.d,
            alpha: self.alpha,
            eta: self.eta,
            tau0: self.tau0,
            kappa: self.kappa,
            updatect: 0.0,
            lambda,
            elogbeta,
            expelogbeta,
            theta: Array2::zeros((0, self.k)),
        })
    }
}

impl OnlineLda {
    /// One stochastic update of lambda from a mini-batch. Returns the
    /// perplexity estimate for the batch.
    pub fn update(&mut self, docs: &[Document]) -> Result<f64> {
        if docs.is_empty() {
            return Err(Error::fit("online", "empty mini-batch"));
        }
        let rhot = (self.tau0 + self.updatect).powf(-self.kappa);
        let (gamma, sstats) = self.e_step(docs)?;
        let bound = self.approx_bound(docs, &gamma);

        let scale = self.d as f64 / docs.len() as f64;
        self.lambda = &self.lambda * (1.0 - rhot) + (sstats * scale + self.eta) * rhot;
        self.elogbeta = math::dirichlet_expectation(&self.lambda);
        self.expelogbeta = self.elogbeta.mapv(f64::exp);
        self.updatect += 1.0;

        let words: f64 = docs.iter().map(Document::total).sum();
        let perwordbound = bound * docs.len() as f64 / (self.d as f64 * words.max(1.0));
        let perplexity = (-perwordbound).exp();
        debug!("online update {}: perplexity {:.3}", self.updatect, perplexity);

        Ok(perplexity)
    }

    /// Fits document mixtures for `docs` against the current topics and
    /// keeps them, row-normalised, for `TopicModel::gamma`.
    pub fn infer(&mut self, docs: &[Document]) -> Result<Array2<f64>> {
        let (mut gamma, _) = self.e_step(docs)?;
        math::normalize_rows(&mut gamma);
        self.theta = gamma.clone();
        Ok(gamma)
    }

    /// The `n` heaviest terms of topic `k` with their share of the topic.
    pub fn topic_top_n(&self, k: usize, n: usize) -> Vec<(usize, f64)> {
        let row = self.lambda.row(k);
        let total = row.sum();
        let mut weights: Vec<(usize, f64)> = row.iter().cloned().enumerate().collect();
        weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        weights.truncate(n);
        weights.into_iter().map(|(idx, p)| (idx, p / total)).collect()
    }

    fn approx_bound(&self, docs: &[Document], gamma: &Array2<f64>) -> f64 {
        let mut score = 0_f64;
        let elogtheta = math::dirichlet_expectation(gamma);

        // E[log p(docs | theta, beta)]
        for (d, doc) in docs.iter().enumerate() {
            let theta_d = elogtheta.row(d);
            for (&term, &count) in doc.words.iter() {
                let temp = &theta_d + &self.elogbeta.column(term);
                let tmax = temp.fold(f64::MIN, |a, &b| a.max(b));
                let phinorm = temp.mapv(|x| (x - tmax).exp()).sum().ln() + tmax;
                score += count * phinorm;
            }
        }

        // E[log p(theta | alpha) - log q(theta | gamma)]
        score += ((self.alpha - gamma) * &elogtheta).sum();
        score += math::ln_gamma_sum(gamma) - math::gammaln(self.alpha) * gamma.len() as f64;
        score += math::gammaln(self.alpha * self.k as f64) * docs.len() as f64 - math::ln_gamma_row_sums(gamma);

        // Compensate for the subsampling of the population of documents
        score *= self.d as f64 / docs.len() as f64;

        // E[log p(beta | eta) - log q (beta | lambda)]
        score += ((self.eta - &self.lambda) * &self.elogbeta).sum();
        score += math::ln_gamma_sum(&self.lambda) - math::gammaln(self.eta) * self.lambda.len() as f64;
        score += math::gammaln(self.eta * self.w as f64) * self.k as f64 - math::ln_gamma_row_sums(&self.lambda);

        score
    }

    fn e_step(&mut self, docs: &[Document]) -> Result<(Array2<f64>, Array2<f64>)> {
        let mut gamma = math::random_gamma(100.0, 0.01, docs.len(), self.k, &mut self.rng)?;
        let expelogtheta = math::exp_dirichlet_expectation(&gamma);
        let mut sstats = Array2::<f64>::zeros(self.lambda.dim());

        for (d, doc) in docs.iter().enumerate() {
            let ids: Vec<usize> = doc.words.keys().cloned().collect();
            if let Some(&bad) = ids.iter().find(|&&id| id >= self.w) {
                return Err(Error::fit(
                    "online",
                    format!("term {} outside vocabulary of {}", bad, self.w),
                ));
            }
            let cts: Array2<f64> = Array1::from(doc.words.values().cloned().collect::<Vec<_>>()).insert_axis(Axis(0));

            let mut gammad = gamma.select(Axis(0), &[d]);
            let mut expelogthetad = expelogtheta.select(Axis(0), &[d]);
            let expelogbetad = self.expelogbeta.select(Axis(1), &ids);
            // phi_{dwk} is proportional to expElogthetad_k * expElogbetad_w;
            // phinorm is the normaliser.
            let mut phinorm = expelogthetad.dot(&expelogbetad) + f64::EPSILON;

            for _ in 0..MAX_E_STEP_ITERATIONS {
                let lastgamma = gammad.clone();
                gammad = &expelogthetad * &(&cts / &phinorm).dot(&expelogbetad.t()) + self.alpha;
                expelogthetad = math::exp_dirichlet_expectation(&gammad);
                phinorm = expelogthetad.dot(&expelogbetad) + f64::EPSILON;

                if math::mean_abs_change(&lastgamma, &gammad) < MEAN_CHANGE_THRESHOLD {
                    break;
                }
            }

            gamma.row_mut(d).assign(&gammad.row(0));

            let sstatsd = expelogthetad.t().dot(&(&cts / &phinorm));
            for (mut target, source) in sstats.rows_mut().into_iter().zip(sstatsd.rows()) {
                for (col, &id) in ids.iter().enumerate() {
                    target[id] += source[col];
                }
            }
        }

        Ok((gamma, sstats * &self.expelogbeta))
    }
}

impl TopicModel for OnlineLda {
    fn n_topics(&self) -> usize {
        self.k
    }

    fn beta(&self) -> Array2<f64> {
        let mut beta = self.lambda.clone();
        math::normalize_rows(&mut beta);
        beta
    }

    fn gamma(&self) -> Array2<f64> {
        self.theta.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        (0..12)
            .map(|i| {
                if i % 2 == 0 {
                    [0, 1, 2, 1, 0].iter().collect()
                } else {
                    [3, 4, 5, 4, 3].iter().collect()
                }
            })
            .collect()
    }

    #[test]
    fn update_reports_finite_perplexity() {
        let docs = corpus();
        let mut olda = OnlineLdaBuilder::new(6, docs.len(), 2).build().unwrap();
        let mut perplexity = 0.0;
        for _ in 0..5 {
            perplexity = olda.update(&docs).unwrap();
        }
        assert!(perplexity.is_finite() && perplexity > 0.0);
    }

    #[test]
    fn topics_are_distributions() {
        let docs = corpus();
        let mut olda = OnlineLdaBuilder::new(6, docs.len(), 3).seed(9).build().unwrap();
        for _ in 0..5 {
            olda.update(&docs).unwrap();
        }
        let gamma = olda.infer(&docs).unwrap();
        assert_eq!(gamma.dim(), (12, 3));
        assert_eq!(olda.gamma(), gamma);
        for row in olda.beta().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        for row in gamma.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }

        let top = olda.topic_top_n(0, 4);
        assert_eq!(top.len(), 4);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn rejects_out_of_vocabulary_terms() {
        let mut olda = OnlineLdaBuilder::new(2, 1, 2).build().unwrap();
        let doc: Document = [0, 7].iter().collect();
        assert!(olda.update(&[doc]).is_err());
        assert!(OnlineLdaBuilder::new(0, 1, 2).build().is_err());
    }
}
