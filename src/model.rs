//! Log-density oracles consumed by the sampling kernels.
//!
//! The kernels never see a model's internals. They only query the
//! dimensionality, the log density and, for gradient based kernels, the
//! gradient at a point in unconstrained parameter space.

use std::{error::Error, fmt::Debug};

use faer::Mat;

/// Errors that happen when we evaluate the log density or its derivatives
pub trait LogpError: Error {
    /// Unrecoverable errors during logp computation stop sampling,
    /// recoverable errors are treated like a point outside the support.
    fn is_recoverable(&self) -> bool;
}

/// An unnormalized log density over an unconstrained parameter space.
///
/// Evaluation takes `&self`: kernels only query the model, and several
/// independent kernels may share one model by reference.
pub trait LogDensity {
    type LogpError: Debug + Send + Sync + LogpError + 'static;

    /// The number of unconstrained parameters. Must not change over the
    /// lifetime of the model.
    fn dim(&self) -> usize;

    /// Compute the unnormalized log density at `position`.
    ///
    /// Points outside the support may be reported either as
    /// `f64::NEG_INFINITY` or as a recoverable error.
    fn log_density(&self, position: &[f64]) -> Result<f64, Self::LogpError>;

    /// A name for the model, used in log messages.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Names of the unconstrained parameters, one per dimension.
    ///
    /// Container indices are separated by periods and start at one, so
    /// the default is `theta.1`, `theta.2`, ...
    fn param_unc_names(&self) -> Vec<String> {
        (1..=self.dim()).map(|i| format!("theta.{}", i)).collect()
    }

    /// Names of the constrained parameters, in the order written by
    /// [`LogDensity::param_constrain`].
    fn param_names(&self) -> Vec<String> {
        self.param_unc_names()
    }

    /// Map an unconstrained position to the constrained parameters.
    ///
    /// `constrained` is cleared first. Models without constraints copy the
    /// position unchanged.
    fn param_constrain(
        &self,
        position: &[f64],
        constrained: &mut Vec<f64>,
    ) -> Result<(), Self::LogpError> {
        constrained.clear();
        constrained.extend_from_slice(position);
        Ok(())
    }
}

/// A log density that can also report its gradient.
pub trait LogDensityGradient: LogDensity {
    /// Compute the log density at `position` and write its gradient
    /// into `gradient`.
    ///
    /// The returned value must agree with `log_density` at the same point.
    fn log_density_gradient(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, Self::LogpError>;
}

/// A log density that can also report its Hessian.
///
/// None of the kernels need this, it is provided by
/// [`crate::FiniteDiffHessian`] for models without second derivatives.
pub trait LogDensityHessian: LogDensityGradient {
    fn log_density_hessian(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<(f64, Mat<f64>), Self::LogpError>;
}

impl<M: LogDensity + ?Sized> LogDensity for &M {
    type LogpError = M::LogpError;

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn log_density(&self, position: &[f64]) -> Result<f64, Self::LogpError> {
        (**self).log_density(position)
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn param_unc_names(&self) -> Vec<String> {
        (**self).param_unc_names()
    }

    fn param_names(&self) -> Vec<String> {
        (**self).param_names()
    }

    fn param_constrain(
        &self,
        position: &[f64],
        constrained: &mut Vec<f64>,
    ) -> Result<(), Self::LogpError> {
        (**self).param_constrain(position, constrained)
    }
}

impl<M: LogDensityGradient + ?Sized> LogDensityGradient for &M {
    fn log_density_gradient(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<f64, Self::LogpError> {
        (**self).log_density_gradient(position, gradient)
    }
}

impl<M: LogDensityHessian + ?Sized> LogDensityHessian for &M {
    fn log_density_hessian(
        &self,
        position: &[f64],
        gradient: &mut [f64],
    ) -> Result<(f64, Mat<f64>), Self::LogpError> {
        (**self).log_density_hessian(position, gradient)
    }
}

/// Target densities with known moments, used by the tests and benchmarks.
pub mod test_logps {
    use std::cell::Cell;

    use faer::Mat;
    use thiserror::Error;

    use super::{LogDensity, LogDensityGradient, LogDensityHessian, LogpError};

    #[derive(Error, Debug)]
    pub enum NormalLogpError {}

    impl LogpError for NormalLogpError {
        fn is_recoverable(&self) -> bool {
            true
        }
    }

    /// Independent normal distributions with per-coordinate location and scale.
    #[derive(Clone, Debug)]
    pub struct NormalLogp {
        mu: Box<[f64]>,
        sigma: Box<[f64]>,
    }

    impl NormalLogp {
        pub fn new(mu: &[f64], sigma: &[f64]) -> NormalLogp {
            assert!(mu.len() == sigma.len());
            NormalLogp {
                mu: mu.into(),
                sigma: sigma.into(),
            }
        }

        pub fn standard(dim: usize) -> NormalLogp {
            NormalLogp::new(&vec![0f64; dim], &vec![1f64; dim])
        }

        pub fn mu(&self) -> &[f64] {
            &self.mu
        }

        pub fn sigma(&self) -> &[f64] {
            &self.sigma
        }
    }

    impl LogDensity for NormalLogp {
        type LogpError = NormalLogpError;

        fn dim(&self) -> usize {
            self.mu.len()
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, NormalLogpError> {
            let mut gradient = vec![0f64; self.dim()];
            self.log_density_gradient(position, &mut gradient)
        }
    }

    impl LogDensityGradient for NormalLogp {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, NormalLogpError> {
            let n = position.len();
            assert!(gradient.len() == n);

            let mut logp = 0f64;
            position
                .iter()
                .zip(self.mu.iter().zip(self.sigma.iter()))
                .zip(gradient.iter_mut())
                .for_each(|((&p, (&mu, &sigma)), grad)| {
                    let diff = (p - mu) / sigma;
                    logp -= diff * diff / 2.;
                    *grad = -diff / sigma;
                });
            Ok(logp)
        }
    }

    impl LogDensityHessian for NormalLogp {
        fn log_density_hessian(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<(f64, Mat<f64>), NormalLogpError> {
            let logp = self.log_density_gradient(position, gradient)?;
            let n = self.dim();
            let hessian = Mat::from_fn(n, n, |i, j| {
                if i == j {
                    -1. / (self.sigma[i] * self.sigma[i])
                } else {
                    0.
                }
            });
            Ok((logp, hessian))
        }
    }

    #[derive(Error, Debug)]
    pub enum DomainError {
        #[error("position {0} is outside the support")]
        OutsideSupport(f64),
        #[error("model evaluation failed permanently")]
        Fatal,
    }

    impl LogpError for DomainError {
        fn is_recoverable(&self) -> bool {
            matches!(self, DomainError::OutsideSupport(_))
        }
    }

    /// Standard normal truncated to the positive orthant.
    ///
    /// Negative coordinates are reported as a recoverable error.
    #[derive(Clone, Debug)]
    pub struct HalfNormalLogp {
        pub dim: usize,
    }

    impl LogDensity for HalfNormalLogp {
        type LogpError = DomainError;

        fn dim(&self) -> usize {
            self.dim
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, DomainError> {
            let mut gradient = vec![0f64; self.dim];
            self.log_density_gradient(position, &mut gradient)
        }
    }

    impl LogDensityGradient for HalfNormalLogp {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, DomainError> {
            if let Some(&bad) = position.iter().find(|&&x| x < 0.) {
                return Err(DomainError::OutsideSupport(bad));
            }
            let mut logp = 0f64;
            for (&p, grad) in position.iter().zip(gradient.iter_mut()) {
                logp -= p * p / 2.;
                *grad = -p;
            }
            Ok(logp)
        }
    }

    /// A smooth, non-quadratic density: `log p(x) = -Σ cosh(x_i)`.
    #[derive(Clone, Debug)]
    pub struct CoshLogp {
        pub dim: usize,
    }

    impl LogDensity for CoshLogp {
        type LogpError = NormalLogpError;

        fn dim(&self) -> usize {
            self.dim
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, NormalLogpError> {
            Ok(-position.iter().map(|x| x.cosh()).sum::<f64>())
        }
    }

    impl LogDensityGradient for CoshLogp {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, NormalLogpError> {
            for (&x, grad) in position.iter().zip(gradient.iter_mut()) {
                *grad = -x.sinh();
            }
            self.log_density(position)
        }
    }

    /// Standard normal whose evaluation fails permanently once any
    /// coordinate leaves `[-bound, bound]`.
    #[derive(Clone, Debug)]
    pub struct FatalBeyondLogp {
        pub dim: usize,
        pub bound: f64,
    }

    impl LogDensity for FatalBeyondLogp {
        type LogpError = DomainError;

        fn dim(&self) -> usize {
            self.dim
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, DomainError> {
            let mut gradient = vec![0f64; self.dim];
            self.log_density_gradient(position, &mut gradient)
        }
    }

    impl LogDensityGradient for FatalBeyondLogp {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, DomainError> {
            if position.iter().any(|x| x.abs() > self.bound) {
                return Err(DomainError::Fatal);
            }
            let mut logp = 0f64;
            for (&p, grad) in position.iter().zip(gradient.iter_mut()) {
                logp -= p * p / 2.;
                *grad = -p;
            }
            Ok(logp)
        }
    }

    /// Independent `Exponential(1)` scales, sampled on the log scale.
    ///
    /// The unconstrained coordinate is `log_sigma.i`, the constrained
    /// parameter is `sigma.i = exp(log_sigma.i)`. The log density includes
    /// the Jacobian of the transform.
    #[derive(Clone, Debug)]
    pub struct LogScaleLogp {
        pub dim: usize,
    }

    impl LogDensity for LogScaleLogp {
        type LogpError = NormalLogpError;

        fn dim(&self) -> usize {
            self.dim
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, NormalLogpError> {
            Ok(position.iter().map(|u| u - u.exp()).sum())
        }

        fn name(&self) -> String {
            "exponential_scales".to_string()
        }

        fn param_unc_names(&self) -> Vec<String> {
            (1..=self.dim).map(|i| format!("log_sigma.{}", i)).collect()
        }

        fn param_names(&self) -> Vec<String> {
            (1..=self.dim).map(|i| format!("sigma.{}", i)).collect()
        }

        fn param_constrain(
            &self,
            position: &[f64],
            constrained: &mut Vec<f64>,
        ) -> Result<(), NormalLogpError> {
            constrained.clear();
            constrained.extend(position.iter().map(|u| u.exp()));
            Ok(())
        }
    }

    impl LogDensityGradient for LogScaleLogp {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, NormalLogpError> {
            for (&u, grad) in position.iter().zip(gradient.iter_mut()) {
                *grad = 1. - u.exp();
            }
            self.log_density(position)
        }
    }

    /// Wraps a model and counts how often it is queried.
    #[derive(Debug)]
    pub struct CountingLogp<M> {
        pub inner: M,
        pub calls: Cell<usize>,
    }

    impl<M> CountingLogp<M> {
        pub fn new(inner: M) -> Self {
            CountingLogp {
                inner,
                calls: Cell::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }
    }

    impl<M: LogDensity> LogDensity for CountingLogp<M> {
        type LogpError = M::LogpError;

        fn dim(&self) -> usize {
            self.inner.dim()
        }

        fn log_density(&self, position: &[f64]) -> Result<f64, Self::LogpError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.log_density(position)
        }
    }

    impl<M: LogDensityGradient> LogDensityGradient for CountingLogp<M> {
        fn log_density_gradient(
            &self,
            position: &[f64],
            gradient: &mut [f64],
        ) -> Result<f64, Self::LogpError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.log_density_gradient(position, gradient)
        }
    }
}
