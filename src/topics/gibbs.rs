use log::debug;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::TopicModel;
use crate::error::{Error, Result};
use crate::math;
use crate::Document;

/// LDA fitted by collapsed Gibbs sampling over individual token assignments.
pub struct GibbsLda {
    rng: StdRng,
    // Vocabulary size
    w: usize,
    // Number of topics
    k: usize,
    // Prior on document-topic mixtures
    alpha: f64,
    // Prior on topic-term distributions
    eta: f64,
    sweeps: usize,

    // Term id of every token, per document
    tokens: Vec<Vec<usize>>,
    // Topic of every token, per document
    z: Vec<Vec<usize>>,
    // Tokens of document d assigned to topic t
    ndk: Array2<usize>,
    // Occurrences of term w assigned to topic t
    nkw: Array2<usize>,
    // Tokens assigned to topic t
    nk: Array1<usize>,
}

pub struct GibbsLdaBuilder {
    w: usize,
    k: usize,
    alpha: f64,
    eta: f64,
    seed: u64,
}

impl GibbsLdaBuilder {
    pub fn new(w: usize, k: usize) -> Self {
        Self {
            w,
            k,
            alpha: 50.0 / k.max(1) as f64,
            eta: 0.1,
            seed: 42,
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

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Expands the bags of words into token sequences and draws a uniform
    /// initial topic for every token.
    pub fn build(&self, docs: &[Document]) -> Result<GibbsLda> {
        if self.k == 0 {
            return Err(Error::fit("gibbs", "number of topics must be positive"));
        }
        if self.w == 0 {
            return Err(Error::fit("gibbs", "empty vocabulary"));
        }
        if !(self.alpha > 0.0 && self.eta > 0.0) {
            return Err(Error::fit("gibbs", "priors must be positive"));
        }

        let mut tokens = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut seq = Vec::new();
            for (&term, &count) in doc.words.iter() {
                if term >= self.w {
                    return Err(Error::fit(
                        "gibbs",
                        format!("term {} outside vocabulary of {}", term, self.w),
                    ));
                }
                if count < 0.0 || count.fract() != 0.0 {
                    return Err(Error::fit("gibbs", format!("non-count weight {}", count)));
                }
                seq.extend(std::iter::repeat(term).take(count as usize));
            }
            tokens.push(seq);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ndk = Array2::zeros((docs.len(), self.k));
        let mut nkw = Array2::zeros((self.k, self.w));
        let mut nk = Array1::zeros(self.k);
        let mut z = Vec::with_capacity(tokens.len());

        for (d, seq) in tokens.iter().enumerate() {
            let topics: Vec<usize> = seq
                .iter()
                .map(|&term| {
                    let t = rng.gen_range(0..self.k);
                    ndk[[d, t]] += 1;
                    nkw[[t, term]] += 1;
                    nk[t] += 1;
                    t
                })
                .collect();
            z.push(topics);
        }

        Ok(GibbsLda {
            rng,
            w: self.w,
            k: self.k,
            alpha: self.alpha,
            eta: self.eta,
            sweeps: 0,
            tokens,
            z,
            ndk,
            nkw,
            nk,
        })
    }
}

impl GibbsLda {
    /// One pass of resampling every token's topic from its full conditional
    /// p(t) ~ (ndk + alpha) * (nkw + eta) / (nk + W * eta).
    pub fn sweep(&mut self) {
        let w_eta = self.w as f64 * self.eta;
        let mut weights = vec![0.0; self.k];

        for d in 0..self.tokens.len() {
            for i in 0..self.tokens[d].len() {
                let term = self.tokens[d][i];
                let old = self.z[d][i];
                self.ndk[[d, old]] -= 1;
                self.nkw[[old, term]] -= 1;
                self.nk[old] -= 1;

                let mut total = 0.0;
                for (t, weight) in weights.iter_mut().enumerate() {
                    *weight = (self.ndk[[d, t]] as f64 + self.alpha)
                        * (self.nkw[[t, term]] as f64 + self.eta)
                        / (self.nk[t] as f64 + w_eta);
                    total += *weight;
                }

                let mut u = self.rng.gen::<f64>() * total;
                let mut new = self.k - 1;
                for (t, &weight) in weights.iter().enumerate() {
                    if u < weight {
                        new = t;
                        break;
                    }
                    u -= weight;
                }

                self.z[d][i] = new;
                self.ndk[[d, new]] += 1;
                self.nkw[[new, term]] += 1;
                self.nk[new] += 1;
            }
        }
        self.sweeps += 1;
    }

    pub fn train(&mut self, sweeps: usize) {
        for it in 0..sweeps {
            self.sweep();
            if (it + 1) % 50 == 0 {
                debug!("gibbs sweep {}/{}", it + 1, sweeps);
            }
        }
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn n_tokens(&self) -> usize {
        self.nk.sum()
    }
}

impl TopicModel for GibbsLda {
    fn n_topics(&self) -> usize {
        self.k
    }

    /// phi[t][w] = (nkw + eta) / (nk + W * eta)
    fn beta(&self) -> Array2<f64> {
        let mut beta = self.nkw.mapv(|n| n as f64 + self.eta);
        math::normalize_rows(&mut beta);
        beta
    }

    /// theta[d][t] = (ndk + alpha) / (N_d + K * alpha)
    fn gamma(&self) -> Array2<f64> {
        let mut gamma = self.ndk.mapv(|n| n as f64 + self.alpha);
        math::normalize_rows(&mut gamma);
        gamma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        // two clean themes over a 6-term vocabulary
        let mut docs = Vec::new();
        for _ in 0..10 {
            docs.push([0, 1, 2, 0, 1, 2, 0].iter().collect());
            docs.push([3, 4, 5, 3, 4, 5, 5].iter().collect());
        }
        docs
    }

    #[test]
    fn counts_stay_consistent() {
        let docs = docs();
        let mut lda = GibbsLdaBuilder::new(6, 2).seed(3).build(&docs).unwrap();
        assert_eq!(lda.n_tokens(), 140);
        lda.train(20);
        assert_eq!(lda.sweeps(), 20);
        assert_eq!(lda.n_tokens(), 140);
        assert_eq!(lda.nkw.sum(), 140);
        assert_eq!(lda.ndk.sum(), 140);
    }

    #[test]
    fn distributions_are_normalized() {
        let docs = docs();
        let mut lda = GibbsLdaBuilder::new(6, 3).alpha(0.5).build(&docs).unwrap();
        lda.train(10);

        let beta = lda.beta();
        assert_eq!(beta.dim(), (3, 6));
        for row in beta.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let gamma = lda.gamma();
        assert_eq!(gamma.dim(), (20, 3));
        for row in gamma.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn separates_disjoint_themes() {
        let docs = docs();
        let mut lda = GibbsLdaBuilder::new(6, 2).alpha(0.1).eta(0.01).seed(11).build(&docs).unwrap();
        lda.train(200);

        let beta = lda.beta();
        let first = beta.row(0);
        let theme_a: f64 = first[0] + first[1] + first[2];
        assert!(theme_a > 0.9 || theme_a < 0.1, "mixed topic: {}", theme_a);
    }

    #[test]
    fn same_seed_same_assignments() {
        let docs = docs();
        let mut a = GibbsLdaBuilder::new(6, 2).seed(5).build(&docs).unwrap();
        let mut b = GibbsLdaBuilder::new(6, 2).seed(5).build(&docs).unwrap();
        a.train(5);
        b.train(5);
        assert_eq!(a.z, b.z);
    }

    #[test]
    fn rejects_bad_input() {
        let docs = docs();
        assert!(GibbsLdaBuilder::new(6, 0).build(&docs).is_err());
        assert!(GibbsLdaBuilder::new(3, 2).build(&docs).is_err());

        let mut fractional = Document::new();
        fractional.words.insert(0, 0.5);
        assert!(GibbsLdaBuilder::new(6, 2).build(&[fractional]).is_err());
    }
}
