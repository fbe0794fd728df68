use std::cmp::Ordering;

use log::debug;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

const BRANCH: &str = "random forest";

pub struct RandomForestBuilder {
    n_trees: usize,
    // Candidate features per node, floor(sqrt(p)) when unset
    max_features: Option<usize>,
    // Smallest allowed leaf
    min_node_size: usize,
    max_depth: Option<usize>,
    seed: u64,
}

impl RandomForestBuilder {
    pub fn new(n_trees: usize) -> Self {
        Self {
            n_trees,
            max_features: None,
            min_node_size: 1,
            max_depth: None,
            seed: 42,
        }
    }

    pub fn max_features(&mut self, max_features: usize) -> &mut Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn min_node_size(&mut self, min_node_size: usize) -> &mut Self {
        self.min_node_size = min_node_size.max(1);
        self
    }

    pub fn max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Trains on `x` (rows = documents) against rating labels `y`.
    pub fn fit(&self, x: &Array2<f64>, y: &[u8], feature_names: Vec<String>) -> Result<RandomForest> {
        let (n_samples, n_features) = x.dim();

        if n_samples == 0 {
            return Err(Error::fit(BRANCH, "no training rows"));
        }
        if n_samples != y.len() {
            return Err(Error::fit(
                BRANCH,
                format!("{} rows but {} labels", n_samples, y.len()),
            ));
        }
        if n_features == 0 {
            return Err(Error::fit(BRANCH, "no features"));
        }
        if feature_names.len() != n_features {
            return Err(Error::fit(
                BRANCH,
                format!("{} features but {} names", n_features, feature_names.len()),
            ));
        }
        if self.n_trees == 0 {
            return Err(Error::fit(BRANCH, "forest needs at least one tree"));
        }

        let mut classes: Vec<u8> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(Error::fit(
                BRANCH,
                format!("only rating {} present in training data", classes[0]),
            ));
        }
        let labels: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or(0))
            .collect();

        let max_features = self
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize)
            .max(1)
            .min(n_features);

        let mut trees = Vec::with_capacity(self.n_trees);
        let mut importance = vec![0_f64; n_features];
        let mut oob_votes = Array2::<usize>::zeros((n_samples, classes.len()));

        for t in 0..self.n_trees {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

            let mut in_bag = vec![false; n_samples];
            for &i in &bootstrap {
                in_bag[i] = true;
            }

            let mut grower = Grower {
                x,
                y: &labels,
                n_classes: classes.len(),
                max_features,
                min_node_size: self.min_node_size,
                max_depth: self.max_depth,
                rng: &mut rng,
                importance: &mut importance,
                nodes: Vec::new(),
            };
            grower.grow(bootstrap, 0);
            let tree = Tree {
                nodes: grower.nodes,
            };

            for (i, _) in in_bag.iter().enumerate().filter(|(_, bagged)| !**bagged) {
                oob_votes[[i, tree.predict(x.row(i))]] += 1;
            }

            debug!("tree {}/{}: {} nodes", t + 1, self.n_trees, tree.nodes.len());
            trees.push(tree);
        }

        let total: f64 = importance.iter().sum();
        if total > 0.0 {
            importance.iter_mut().for_each(|v| *v /= total);
        }

        let mut oob_seen = 0;
        let mut oob_wrong = 0;
        for (i, votes) in oob_votes.outer_iter().enumerate() {
            if votes.sum() > 0 {
                oob_seen += 1;
                if argmax(votes.iter().copied()) != labels[i] {
                    oob_wrong += 1;
                }
            }
        }
        let oob_error = if oob_seen > 0 {
            Some(oob_wrong as f64 / oob_seen as f64)
        } else {
            None
        };

        Ok(RandomForest {
            trees,
            classes,
            feature_names,
            importance,
            oob_error,
        })
    }
}

impl Default for RandomForestBuilder {
    fn default() -> Self {
        Self::new(100)
    }
}

pub struct RandomForest {
    trees: Vec<Tree>,
    // Sorted ratings seen in training
    classes: Vec<u8>,
    feature_names: Vec<String>,
    importance: Vec<f64>,
    oob_error: Option<f64>,
}

impl RandomForest {
    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        x.outer_iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn predict_one(&self, row: ArrayView1<f64>) -> u8 {
        let mut votes = vec![0_usize; self.classes.len()];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        self.classes[argmax(votes.into_iter())]
    }

    /// Features by decreasing mean Gini decrease.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.importance.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Out-of-bag misclassification rate.
    pub fn oob_error(&self) -> Option<f64> {
        self.oob_error
    }
}

fn argmax<I: Iterator<Item = usize>>(values: I) -> usize {
    let mut best = (0, 0);
    for (idx, v) in values.enumerate() {
        if v > best.1 {
            best = (idx, v);
        }
    }
    best.0
}

enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: ArrayView1<f64>) -> usize {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { class } => return class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

struct Grower<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    min_node_size: usize,
    max_depth: Option<usize>,
    rng: &'a mut StdRng,
    importance: &'a mut Vec<f64>,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

impl<'a> Grower<'a> {
    fn counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    // Returns the index of the node grown for `samples`.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.counts(&samples);
        let n = samples.len();
        let majority = argmax(counts.iter().copied());
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_deep = self.max_depth.map_or(false, |max| depth >= max);

        if pure || too_deep || n < 2 * self.min_node_size {
            return self.leaf(majority);
        }

        let best = match self.best_split(&samples, &counts) {
            Some(best) => best,
            None => return self.leaf(majority),
        };
        self.importance[best.feature] += best.decrease * n as f64;

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.x[[s, best.feature]] <= best.threshold);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { class: majority });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn leaf(&mut self, class: usize) -> usize {
        self.nodes.push(Node::Leaf { class });
        self.nodes.len() - 1
    }

    fn best_split(&mut self, samples: &[usize], counts: &[usize]) -> Option<BestSplit> {
        let n = samples.len();
        let parent = gini(counts, n);
        let n_features = self.x.ncols();
        let candidates = index::sample(&mut *self.rng, n_features, self.max_features);

        let mut best: Option<BestSplit> = None;
        let mut values: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in candidates.into_iter() {
            values.clear();
            values.extend(samples.iter().map(|&s| (self.x[[s, feature]], self.y[s])));
            values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            if values[0].0 == values[n - 1].0 {
                continue;
            }

            let mut left = vec![0_usize; self.n_classes];
            let mut right = counts.to_vec();
            for i in 0..n - 1 {
                let class = values[i].1;
                left[class] += 1;
                right[class] -= 1;

                let n_left = i + 1;
                let n_right = n - n_left;
                if values[i].0 == values[i + 1].0
                    || n_left < self.min_node_size
                    || n_right < self.min_node_size
                {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                let decrease = parent - weighted;
                if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (values[i].0 + values[i + 1].0) / 2.0,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn learns_separable_classes() {
        // feature 0 decides the class, feature 1 is noise
        let x = array![
            [0.0, 3.0],
            [0.1, 1.0],
            [0.2, 2.0],
            [0.3, 0.0],
            [5.0, 1.0],
            [5.1, 3.0],
            [5.2, 0.0],
            [5.3, 2.0],
        ];
        let y = [1, 1, 1, 1, 5, 5, 5, 5];

        let forest = RandomForestBuilder::new(25)
            .max_features(2)
            .seed(7)
            .fit(&x, &y, names(2))
            .unwrap();

        assert_eq!(forest.classes(), &[1, 5]);
        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.predict(&array![[0.05, 2.0], [5.05, 2.0]]), vec![1, 5]);

        let ranked = forest.feature_importance();
        assert_eq!(ranked[0].0, "f0");
        let total: f64 = ranked.iter().map(|r| r.1).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_forest() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = [1, 2, 1, 2, 1, 2];
        let a = RandomForestBuilder::new(10).seed(3).fit(&x, &y, names(1)).unwrap();
        let b = RandomForestBuilder::new(10).seed(3).fit(&x, &y, names(1)).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
        assert_eq!(a.oob_error(), b.oob_error());
    }

    #[test]
    fn rejects_single_class() {
        let x = array![[1.0], [2.0]];
        match RandomForestBuilder::new(5).fit(&x, &[4, 4], names(1)) {
            Err(Error::ModelFit { reason, .. }) => assert!(reason.contains("only rating 4")),
            _ => panic!("expected ModelFit"),
        }
    }

    #[test]
    fn rejects_empty_inputs() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(RandomForestBuilder::new(5).fit(&x, &[], names(3)).is_err());

        let x = Array2::<f64>::zeros((2, 0));
        assert!(RandomForestBuilder::new(5).fit(&x, &[1, 2], names(0)).is_err());
    }

    #[test]
    fn constant_features_give_majority_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let forest = RandomForestBuilder::new(3).fit(&x, &[2, 2, 3], names(1)).unwrap();
        for tree in &forest.trees {
            assert_eq!(tree.nodes.len(), 1);
        }
        assert!(forest.feature_importance().iter().all(|f| f.1 == 0.0));
    }
}
