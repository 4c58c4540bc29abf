use log::debug;
use thiserror::Error;

use crate::{
    model::{LogDensity, LogpError},
    stream::SampleStream,
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Expected a vector of length {expected}, got length {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Metric entry {index} must be positive and finite, got {value}")]
    InvalidMetric { index: usize, value: f64 },
    #[error("Step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),
    #[error("Number of leapfrog steps must be at least one")]
    InvalidNumSteps,
    #[error("Proposal scale must be positive and finite, got {0}")]
    InvalidProposalScale(f64),
    #[error("Logp function returned unrecoverable error")]
    LogpFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, SamplerError>;

pub(crate) fn check_dim(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(SamplerError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Evaluate the model, treating every non-fatal failure as a point outside
/// the support.
///
/// `NaN` and recoverable errors become `-inf`. Only errors the model marks
/// as unrecoverable are returned.
pub(crate) fn checked_log_density<M: LogDensity + ?Sized>(
    model: &M,
    position: &[f64],
) -> Result<f64> {
    match model.log_density(position) {
        Ok(logp) if logp.is_nan() => {
            debug!("Log density is NaN, treating the point as outside the support");
            Ok(f64::NEG_INFINITY)
        }
        Ok(logp) => Ok(logp),
        Err(logp_error) if logp_error.is_recoverable() => {
            debug!("Recoverable logp error: {}", logp_error);
            Ok(f64::NEG_INFINITY)
        }
        Err(logp_error) => Err(SamplerError::LogpFailure(Box::new(logp_error))),
    }
}

/// The standing point of a chain.
///
/// `log_density` is always the model's log density at `theta`. It may be
/// `-inf` if the chain was started outside the support.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub theta: Box<[f64]>,
    pub log_density: f64,
}

/// One draw of a chain: the state after the accept/reject decision.
///
/// After a rejection this repeats the previous draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub theta: Box<[f64]>,
    pub log_density: f64,
    pub accepted: bool,
}

/// The Metropolis criterion.
///
/// Accepts with probability `min(1, exp(log_ratio))`. A `NaN` ratio, which
/// comes up when both points are outside the support, is rejected.
#[inline]
pub(crate) fn metropolis_accept(log_ratio: f64, u: f64) -> bool {
    u.ln() < log_ratio
}

/// A Markov transition kernel with its own chain state.
pub trait Kernel {
    /// The dimensionality of the posterior.
    fn dim(&self) -> usize;

    /// The current position of the chain.
    fn position(&self) -> &[f64];

    /// The log density at the current position, if it has been evaluated.
    fn log_density(&self) -> Option<f64>;

    /// Advance the chain by one transition.
    ///
    /// Errors are only returned if the model failed in a way that can not
    /// be treated as a rejected proposal.
    fn step(&mut self) -> Result<Draw>;

    /// An endless stream of draws from this kernel.
    fn into_stream(self) -> SampleStream<Self>
    where
        Self: Sized,
    {
        SampleStream::new(self)
    }
}

impl<K: Kernel + ?Sized> Kernel for &mut K {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn position(&self) -> &[f64] {
        (**self).position()
    }

    fn log_density(&self) -> Option<f64> {
        (**self).log_density()
    }

    fn step(&mut self) -> Result<Draw> {
        (**self).step()
    }
}

impl<K: Kernel + ?Sized> Kernel for Box<K> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn position(&self) -> &[f64] {
        (**self).position()
    }

    fn log_density(&self) -> Option<f64> {
        (**self).log_density()
    }

    fn step(&mut self) -> Result<Draw> {
        (**self).step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_logps::{DomainError, FatalBeyondLogp, HalfNormalLogp, NormalLogp};

    use pretty_assertions::assert_eq;

    #[test]
    fn accept_rule() {
        assert!(metropolis_accept(0., 0.5));
        assert!(metropolis_accept(f64::INFINITY, 0.99));
        assert!(!metropolis_accept(f64::NEG_INFINITY, 0.01));
        assert!(!metropolis_accept(f64::NAN, 0.01));
        assert!(!metropolis_accept(0.5f64.ln(), 0.6));
        assert!(metropolis_accept(0.5f64.ln(), 0.4));
    }

    #[test]
    fn dimension_message() {
        let err = check_dim(2, 3).unwrap_err();
        assert_eq!(err.to_string(), "Expected a vector of length 2, got length 3");
        assert!(check_dim(4, 4).is_ok());
    }

    #[test]
    fn failures_become_rejections() {
        let model = HalfNormalLogp { dim: 1 };
        assert_eq!(checked_log_density(&model, &[-1.]).unwrap(), f64::NEG_INFINITY);
        assert_eq!(checked_log_density(&model, &[2.]).unwrap(), -2.);
        assert_eq!(
            checked_log_density(&NormalLogp::standard(1), &[f64::NAN]).unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn unrecoverable_errors_are_returned() {
        let model = FatalBeyondLogp { dim: 1, bound: 3. };
        assert!(checked_log_density(&model, &[1.]).is_ok());
        match checked_log_density(&model, &[4.]) {
            Err(SamplerError::LogpFailure(err)) => {
                assert!(err.downcast_ref::<DomainError>().is_some())
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
