use itertools::izip;

use crate::kernel::Draw;

/// Running per-coordinate moments and acceptance rate of a chain.
///
/// Uses Welford updates, so long chains do not lose precision.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    mean: Box<[f64]>,
    sum_sq: Box<[f64]>,
    count: u64,
    accepted: u64,
}

impl ChainSummary {
    pub fn new(dim: usize) -> Self {
        ChainSummary {
            mean: vec![0f64; dim].into(),
            sum_sq: vec![0f64; dim].into(),
            count: 0,
            accepted: 0,
        }
    }

    pub fn add_draw(&mut self, draw: &Draw) {
        self.add_sample(&draw.theta);
        if draw.accepted {
            self.accepted += 1;
        }
    }

    /// Add a position without an accept decision.
    ///
    /// Such samples count as rejected in `acceptance_rate`.
    pub fn add_sample(&mut self, value: &[f64]) {
        assert!(value.len() == self.mean.len());
        self.count += 1;
        let weight = (self.count as f64).recip();
        for (mean, sum_sq, &x) in izip!(self.mean.iter_mut(), self.sum_sq.iter_mut(), value) {
            let delta = x - *mean;
            *mean += weight * delta;
            *sum_sq += delta * (x - *mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.accepted as f64 / self.count as f64
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// The sample variance of every coordinate, with `n - 1` in the
    /// denominator. `NaN` with fewer than two draws.
    pub fn variance(&self) -> Vec<f64> {
        let denom = self.count as f64 - 1.;
        if denom < 1. {
            return vec![f64::NAN; self.mean.len()];
        }
        self.sum_sq.iter().map(|s| s / denom).collect()
    }
}

/// Monte Carlo standard error of the mean of an autocorrelated series.
///
/// The series is cut into `num_batches` consecutive batches of equal
/// length (a remainder at the end is dropped) and the spread of the batch
/// means is used as an estimate of the error. Batches must be much longer
/// than the autocorrelation time of the series.
pub fn batch_means_mcse(values: &[f64], num_batches: usize) -> f64 {
    assert!(num_batches >= 2);
    let batch_len = values.len() / num_batches;
    assert!(batch_len >= 1, "fewer values than batches");

    let means: Vec<f64> = values
        .chunks_exact(batch_len)
        .take(num_batches)
        .map(|batch| batch.iter().sum::<f64>() / batch_len as f64)
        .collect();
    let total = means.iter().sum::<f64>() / num_batches as f64;
    let var = means.iter().map(|m| (m - total) * (m - total)).sum::<f64>()
        / (num_batches - 1) as f64;
    (var / num_batches as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn welford_matches_two_pass(values in prop::collection::vec(-100f64..100f64, 2..50)) {
            let mut summary = ChainSummary::new(1);
            for &x in values.iter() {
                summary.add_sample(&[x]);
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.);
            prop_assert!((summary.mean()[0] - mean).abs() < 1e-9);
            prop_assert!((summary.variance()[0] - var).abs() < 1e-7 * var.max(1.));
        }
    }

    #[test]
    fn acceptance_rate() {
        let mut summary = ChainSummary::new(2);
        for i in 0..4 {
            summary.add_draw(&Draw {
                theta: vec![i as f64, 0.].into(),
                log_density: 0.,
                accepted: i % 2 == 0,
            });
        }
        assert_eq!(summary.count(), 4);
        assert_eq!(summary.acceptance_rate(), 0.5);
        assert_abs_diff_eq!(summary.mean()[0], 1.5, epsilon = 1e-12);
        assert_eq!(summary.mean()[1], 0.);
        assert_abs_diff_eq!(summary.variance()[0], 5. / 3., epsilon = 1e-12);
    }

    #[test]
    fn variance_needs_two_draws() {
        let mut summary = ChainSummary::new(1);
        summary.add_sample(&[1.]);
        assert!(summary.variance()[0].is_nan());
    }

    #[test]
    fn batch_means() {
        // Batch means 1, 2, 3, 4: sd of means is sqrt(5 / 3)
        let values = [1., 1., 2., 2., 3., 3., 4., 4., 100.];
        let mcse = batch_means_mcse(&values, 4);
        assert_abs_diff_eq!(mcse, (5f64 / 3. / 4.).sqrt(), epsilon = 1e-12);

        let constant = vec![2.; 100];
        assert_eq!(batch_means_mcse(&constant, 10), 0.);
    }
}
