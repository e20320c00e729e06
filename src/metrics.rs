/// Count-level error metrics for density-map regression
///
/// Per-pixel error says little about how well a density model counts, so
/// every sample is first reduced to its total (the sum of the map) and the
/// errors are taken between totals.
use std::fmt;

/// MAE and RMSE over summed counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountMetrics {
    /// Number of samples the metrics cover
    pub samples: usize,
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
}

impl fmt::Display for CountMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE: {:.4}, RMSE: {:.4}", self.mae, self.rmse)
    }
}

/// Accumulates true and predicted counts, one pair per sample
#[derive(Debug, Clone, Default)]
pub struct CountErrors {
    true_counts: Vec<f64>,
    predicted_counts: Vec<f64>,
}

impl CountErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample's totals
    pub fn push(&mut self, true_count: f64, predicted_count: f64) {
        self.true_counts.push(true_count);
        self.predicted_counts.push(predicted_count);
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.true_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.true_counts.is_empty()
    }

    /// Mean absolute error. Errors on zero samples.
    pub fn mae(&self) -> crate::Result<f64> {
        self.mean_of(|diff| diff.abs())
    }

    /// Root mean squared error. Errors on zero samples.
    pub fn rmse(&self) -> crate::Result<f64> {
        Ok(self.mean_of(|diff| diff * diff)?.sqrt())
    }

    /// Both metrics at once
    pub fn compute(&self) -> crate::Result<CountMetrics> {
        Ok(CountMetrics {
            samples: self.len(),
            mae: self.mae()?,
            rmse: self.rmse()?,
        })
    }

    /// Clear for the next pass
    pub fn reset(&mut self) {
        self.true_counts.clear();
        self.predicted_counts.clear();
    }

    fn mean_of(&self, f: impl Fn(f64) -> f64) -> crate::Result<f64> {
        if self.is_empty() {
            return Err(crate::CrowdError::EmptyEvaluation);
        }

        let total: f64 = self
            .true_counts
            .iter()
            .zip(&self.predicted_counts)
            .map(|(t, p)| f(t - p))
            .sum();

        Ok(total / self.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CrowdError;

    fn errors(true_counts: &[f64], predicted_counts: &[f64]) -> CountErrors {
        let mut errors = CountErrors::new();
        for (&t, &p) in true_counts.iter().zip(predicted_counts) {
            errors.push(t, p);
        }
        errors
    }

    #[test]
    fn test_reference_counts() {
        let metrics = errors(&[10.0, 20.0, 30.0], &[12.0, 18.0, 33.0]).compute().unwrap();

        // mean(2, 2, 3) and sqrt(mean(4, 4, 9))
        assert_eq!(metrics.samples, 3);
        assert!((metrics.mae - 7.0 / 3.0).abs() < 1e-9);
        assert!((metrics.rmse - (17.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(metrics.to_string(), "MAE: 2.3333, RMSE: 2.3805");
    }

    #[test]
    fn test_perfect_predictions() {
        let metrics = errors(&[5.0, 0.0, 41.5], &[5.0, 0.0, 41.5]).compute().unwrap();
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.rmse, 0.0);
    }

    #[test]
    fn test_rmse_weights_outliers() {
        let e = errors(&[0.0, 0.0, 0.0, 0.0], &[1.0, 1.0, 1.0, 9.0]);
        assert!((e.mae().unwrap() - 3.0).abs() < 1e-9);
        assert!((e.rmse().unwrap() - 21.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_samples_is_an_error() {
        let e = CountErrors::new();
        assert!(matches!(e.mae(), Err(CrowdError::EmptyEvaluation)));
        assert!(matches!(e.rmse(), Err(CrowdError::EmptyEvaluation)));
        assert!(matches!(e.compute(), Err(CrowdError::EmptyEvaluation)));
    }

    #[test]
    fn test_reset() {
        let mut e = errors(&[1.0], &[2.0]);
        assert_eq!(e.len(), 1);

        e.reset();
        assert!(e.is_empty());
        assert!(e.compute().is_err());
    }
}
