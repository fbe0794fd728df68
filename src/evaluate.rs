use std::fmt;

use log::warn;
use ndarray::Array2;

/// Rows are actual ratings, columns predicted ratings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: Vec<u8>,
    counts: Array2<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub class: u8,
    pub support: usize,
    pub sensitivity: f64,
    pub specificity: f64,
    pub precision: f64,
    pub prevalence: f64,
    pub balanced_accuracy: f64,
}

impl ConfusionMatrix {
    /// Classes are the union of ratings seen in either slice.
    pub fn new(predicted: &[u8], actual: &[u8]) -> Self {
        let mut classes: Vec<u8> = predicted.iter().chain(actual.iter()).copied().collect();
        classes.sort_unstable();
        classes.dedup();

        let n = classes.len();
        let mut counts = Array2::zeros((n, n));
        for (p, a) in predicted.iter().zip(actual.iter()) {
            if let (Ok(row), Ok(col)) = (classes.binary_search(a), classes.binary_search(p)) {
                counts[[row, col]] += 1;
            }
        }

        Self { classes, counts }
    }

    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn get(&self, actual: u8, predicted: u8) -> usize {
        match (self.classes.binary_search(&actual), self.classes.binary_search(&predicted)) {
            (Ok(row), Ok(col)) => self.counts[[row, col]],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.counts.diag().sum() as f64 / total as f64
    }

    /// Cohen's kappa: agreement corrected for chance.
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let observed = self.accuracy();
        let expected: f64 = (0..self.classes.len())
            .map(|i| {
                let row = self.counts.row(i).sum() as f64;
                let col = self.counts.column(i).sum() as f64;
                row * col
            })
            .sum::<f64>()
            / (total * total);
        if (1.0 - expected).abs() < f64::EPSILON {
            return 0.0;
        }
        (observed - expected) / (1.0 - expected)
    }

    pub fn class_stats(&self) -> Vec<ClassStats> {
        let total = self.total();
        (0..self.classes.len())
            .map(|i| {
                let tp = self.counts[[i, i]];
                let actual = self.counts.row(i).sum();
                let predicted = self.counts.column(i).sum();
                let fn_ = actual - tp;
                let fp = predicted - tp;
                let tn = total - tp - fn_ - fp;

                let sensitivity = ratio(tp, tp + fn_);
                let specificity = ratio(tn, tn + fp);
                ClassStats {
                    class: self.classes[i],
                    support: actual,
                    sensitivity,
                    specificity,
                    precision: ratio(tp, tp + fp),
                    prevalence: ratio(actual, total),
                    balanced_accuracy: (sensitivity + specificity) / 2.0,
                }
            })
            .collect()
    }

    /// Classes present in the data that were never predicted correctly.
    pub fn missed_classes(&self) -> Vec<u8> {
        self.class_stats()
            .into_iter()
            .filter(|s| s.support > 0 && s.sensitivity == 0.0)
            .map(|s| s.class)
            .collect()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Confusion matrix of predicted vs. actual ratings. Classes with zero
/// sensitivity are logged; with ratings skewed towards 4-5 this is the
/// expected outcome for the minority classes.
pub fn evaluate(predicted: &[u8], actual: &[u8]) -> ConfusionMatrix {
    let matrix = ConfusionMatrix::new(predicted, actual);
    for class in matrix.missed_classes() {
        warn!("rating {} has zero sensitivity", class);
    }
    matrix
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{: >14}", "actual\\pred")?;
        for class in &self.classes {
            write!(f, "{: >7}", class)?;
        }
        writeln!(f)?;
        for (i, class) in self.classes.iter().enumerate() {
            write!(f, "{: >14}", class)?;
            for count in self.counts.row(i) {
                write!(f, "{: >7}", count)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "accuracy {:.4}  kappa {:.4}", self.accuracy(), self.kappa())?;
        writeln!(
            f,
            "{: >6} {: >8} {: >11} {: >11} {: >9} {: >10} {: >8}",
            "class", "support", "sensitivity", "specificity", "precision", "prevalence", "bal.acc"
        )?;
        for s in self.class_stats() {
            writeln!(
                f,
                "{: >6} {: >8} {: >11.4} {: >11.4} {: >9.4} {: >10.4} {: >8.4}",
                s.class, s.support, s.sensitivity, s.specificity, s.precision, s.prevalence, s.balanced_accuracy
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_stats() {
        let actual = [5, 5, 5, 4, 4, 1];
        let predicted = [5, 5, 4, 4, 5, 5];
        let cm = evaluate(&predicted, &actual);

        assert_eq!(cm.classes(), &[1, 4, 5]);
        assert_eq!(cm.get(5, 5), 2);
        assert_eq!(cm.get(5, 4), 1);
        assert_eq!(cm.get(1, 5), 1);
        assert_eq!(cm.total(), 6);
        assert!((cm.accuracy() - 0.5).abs() < 1e-12);

        let stats = cm.class_stats();
        let five = &stats[2];
        assert_eq!(five.support, 3);
        assert!((five.sensitivity - 2.0 / 3.0).abs() < 1e-12);
        // 3 non-five rows, 2 of them predicted five
        assert!((five.specificity - 1.0 / 3.0).abs() < 1e-12);
        assert!((five.precision - 0.5).abs() < 1e-12);

        assert_eq!(cm.missed_classes(), vec![1]);
    }

    #[test]
    fn perfect_predictions() {
        let labels = [1, 2, 3, 4, 5];
        let cm = ConfusionMatrix::new(&labels, &labels);
        assert_eq!(cm.accuracy(), 1.0);
        assert!((cm.kappa() - 1.0).abs() < 1e-12);
        assert!(cm.class_stats().iter().all(|s| s.balanced_accuracy == 1.0));
        assert!(cm.missed_classes().is_empty());
    }

    #[test]
    fn renders_table() {
        let cm = ConfusionMatrix::new(&[5, 4], &[5, 5]);
        let text = cm.to_string();
        assert!(text.contains("accuracy 0.5000"));
        assert!(text.contains("sensitivity"));
    }
}
