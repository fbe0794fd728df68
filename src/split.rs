use std::collections::{BTreeMap, HashMap};

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::Review;

/// Disjoint train/test partition of document identifiers, each side sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles each rating class with one seeded generator and sends
/// `ceil(class size * train_fraction)` of it to train.
pub fn stratified_split(reviews: &[Review], train_fraction: f64, seed: u64) -> Split {
    let mut classes: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for review in reviews {
        classes
            .entry(review.rating)
            .or_insert_with(Vec::new)
            .push(review.document_id);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut ids) in classes {
        ids.shuffle(&mut rng);
        let n_train = ((ids.len() as f64) * train_fraction).ceil() as usize;
        let n_train = n_train.min(ids.len());
        test.extend_from_slice(&ids[n_train..]);
        ids.truncate(n_train);
        train.extend(ids);
    }

    train.sort_unstable();
    test.sort_unstable();
    info!("split {} train / {} test", train.len(), test.len());

    Split { train, test }
}

/// Share of each rating among `ids`.
pub fn class_proportions(ids: &[usize], ratings: &HashMap<usize, u8>) -> BTreeMap<u8, f64> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for id in ids {
        if let Some(&rating) = ratings.get(id) {
            *counts.entry(rating).or_insert(0) += 1;
        }
    }
    let total: usize = counts.values().sum();
    counts
        .into_iter()
        .map(|(rating, n)| (rating, n as f64 / total.max(1) as f64))
        .collect()
}
