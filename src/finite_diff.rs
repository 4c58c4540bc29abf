//! Derivatives by central finite differences, for models that only
//! provide a log density (or only a gradient).

use faer::Mat;

use crate::model::{LogDensity, LogDensityGradient, LogDensityHessian};

/// Step size for coordinate `x`. `EPSILON^(1/3)` balances truncation and
/// rounding error of a central difference.
fn step_size(x: f64) -> f64 {
    f64::EPSILON.cbrt() * x.abs().max(1.)
}

/// Adds a gradient to a model that only has a log density.
///
/// Every gradient costs `2 * dim + 1` evaluations of the wrapped model.
#[derive(Debug, Clone)]
pub struct FiniteDiffGradient<M> {
    model: M,
}

impl<M: LogDensity> FiniteDiffGradient<M> {
    pub fn new(model: M) -> Self {
        FiniteDiffGradient { model }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: LogDensity> LogDensity for FiniteDiffGradient<M> {
    type LogpError = M::LogpError;

    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn log_density(&self, position: &[f64]) -> Result<f64, Self::LogpError> {
        self.model.log_density(position)
    }

    fn name(&self) -> String {
        self.model.name()
    }

    fn param_unc_names(&self) -> Vec<String> {
        self.model.param_unc_names()
    }

    fn param_names(&self) -> Vec<String> {
        self.model.param_names()
    }

    fn param_constrain(
        &self,
        position: &[f64],
        constrained: &mut Vec<f64>,
    ) -> Result<(), Self::LogpError> {
        self.model.param_constrain(position, constrained)
    }
}

impl<M: LogDensity> LogDensityGradient for FiniteDiffGradient<M> {
    fn log_density_gradient(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, Self::LogpError> {
        assert!(gradient.len() == position.len());
        let logp = self.model.log_density(position)?;

        let mut shifted = position.to_vec();
        for (i, grad) in gradient.iter_mut().enumerate() {
            let h = step_size(position[i]);
            shifted[i] = position[i] + h;
            let upper = self.model.log_density(&shifted)?;
            shifted[i] = position[i] - h;
            let lower = self.model.log_density(&shifted)?;
            shifted[i] = position[i];
            *grad = (upper - lower) / (2. * h);
        }
        Ok(logp)
    }
}

/// Adds a Hessian to a model with a gradient.
///
/// Columns are central differences of the gradient. The result is
/// symmetrized, since the two triangles only agree up to truncation error.
#[derive(Debug, Clone)]
pub struct FiniteDiffHessian<M> {
    model: M,
}

impl<M: LogDensityGradient> FiniteDiffHessian<M> {
    pub fn new(model: M) -> Self {
        FiniteDiffHessian { model }
    }

    pub fn inner(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: LogDensityGradient> LogDensity for FiniteDiffHessian<M> {
    type LogpError = M::LogpError;

    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn log_density(&self, position: &[f64]) -> Result<f64, Self::LogpError> {
        self.model.log_density(position)
    }

    fn name(&self) -> String {
        self.model.name()
    }

    fn param_unc_names(&self) -> Vec<String> {
        self.model.param_unc_names()
    }

    fn param_names(&self) -> Vec<String> {
        self.model.param_names()
    }

    fn param_constrain(
        &self,
        position: &[f64],
        constrained: &mut Vec<f64>,
    ) -> Result<(), Self::LogpError> {
        self.model.param_constrain(position, constrained)
    }
}

impl<M: LogDensityGradient> LogDensityGradient for FiniteDiffHessian<M> {
    fn log_density_gradient(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, Self::LogpError> {
        self.model.log_density_gradient(position, gradient)
    }
}

impl<M: LogDensityGradient> LogDensityHessian for FiniteDiffHessian<M> {
    fn log_density_hessian(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<(f64, Mat<f64>), Self::LogpError> {
        let n = position.len();
        let logp = self.model.log_density_gradient(position, gradient)?;

        let mut shifted = position.to_vec();
        let mut upper = vec![0f64; n];
        let mut lower = vec![0f64; n];
        let mut hessian = Mat::<f64>::zeros(n, n);
        for j in 0..n {
            let h = step_size(position[j]);
            shifted[j] = position[j] + h;
            self.model.log_density_gradient(&shifted, &mut upper)?;
            shifted[j] = position[j] - h;
            self.model.log_density_gradient(&shifted, &mut lower)?;
            shifted[j] = position[j];
            for i in 0..n {
                hessian[(i, j)] = (upper[i] - lower[i]) / (2. * h);
            }
        }

        let symmetric = Mat::from_fn(n, n, |i, j| 0.5 * (hessian[(i, j)] + hessian[(j, i)]));
        Ok((logp, symmetric))
    }
}
