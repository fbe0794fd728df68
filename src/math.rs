use ndarray::{Array2, Axis};
use randomkit::dist::Gamma;
use randomkit::{Rng, Sample};
use statrs::function::gamma::{digamma, ln_gamma};

use crate::error::{Error, Result};

/// Mean absolute difference between two arrays of the same shape.
pub fn mean_abs_change(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let total: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    total / a.len().max(1) as f64
}

/// E[log x] for each row of `array` read as Dirichlet parameters.
pub fn dirichlet_expectation(array: &Array2<f64>) -> Array2<f64> {
    let psi_totals = array.sum_axis(Axis(1)).mapv(digamma);
    let mut out = array.mapv(digamma);
    for (mut row, psi_total) in out.rows_mut().into_iter().zip(psi_totals.iter()) {
        row -= *psi_total;
    }
    out
}

pub fn exp_dirichlet_expectation(array: &Array2<f64>) -> Array2<f64> {
    dirichlet_expectation(array).mapv_into(f64::exp)
}

pub fn ln_gamma_sum(array: &Array2<f64>) -> f64 {
    array.iter().map(|&x| ln_gamma(x)).sum()
}

pub fn ln_gamma_row_sums(array: &Array2<f64>) -> f64 {
    array.sum_axis(Axis(1)).iter().map(|&x| ln_gamma(x)).sum()
}

pub fn gammaln(x: f64) -> f64 {
    ln_gamma(x)
}

/// Scales every row to sum to one. All-zero rows are left untouched.
pub fn normalize_rows(array: &mut Array2<f64>) {
    for mut row in array.rows_mut() {
        let total = row.sum();
        if total > 0.0 {
            row /= total;
        }
    }
}

/// `rows x cols` draws from Gamma(shape, scale).
pub fn random_gamma(shape: f64, scale: f64, rows: usize, cols: usize, rng: &mut Rng) -> Result<Array2<f64>> {
    let dist = Gamma::new(shape, scale)
        .map_err(|_| Error::Config(format!("bad gamma parameters ({}, {})", shape, scale)))?;
    Ok(Array2::from_shape_fn((rows, cols), |_| dist.sample(rng)))
}
