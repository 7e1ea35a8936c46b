//! Capability interface for ensembles whose members can be queried one by one

/// A regressor made of independently queryable members
///
/// The point estimate is the mean over members; the spread across members is
/// what the predictor turns into a confidence value.
pub trait EnsembleRegressor {
    /// Width of the input rows the ensemble was fitted on
    fn n_features(&self) -> usize;

    fn n_members(&self) -> usize;

    /// One prediction per member, in member order
    fn predict_per_member(&self, row: &[f64]) -> Vec<f64>;

    /// Point estimate for a row
    fn predict(&self, row: &[f64]) -> f64 {
        let members = self.predict_per_member(row);
        if members.is_empty() {
            return 0.0;
        }
        members.iter().sum::<f64>() / members.len() as f64
    }
}

/// Population mean and standard deviation of member predictions
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f64>);

    impl EnsembleRegressor for Fixed {
        fn n_features(&self) -> usize {
            1
        }
        fn n_members(&self) -> usize {
            self.0.len()
        }
        fn predict_per_member(&self, _row: &[f64]) -> Vec<f64> {
            self.0.clone()
        }
    }

    #[test]
    fn test_default_predict_is_mean() {
        let e = Fixed(vec![0.2, 0.4, 0.6]);
        assert!((e.predict(&[0.0]) - 0.4).abs() < 1e-12);
        assert_eq!(Fixed(vec![]).predict(&[0.0]), 0.0);
    }

    #[test]
    fn test_mean_and_std() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
        assert_eq!(mean_and_std(&[]), (0.0, 0.0));
    }
}
