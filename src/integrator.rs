use std::error::Error;

use log::debug;

use crate::{
    kernel::{check_dim, Result, SamplerError},
    math::{all_finite, axpy},
    metric::DiagMetric,
    model::{LogDensityGradient, LogpError},
};

/// A point in phase space, together with the log density and its
/// gradient at `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePoint {
    pub position: Box<[f64]>,
    pub momentum: Box<[f64]>,
    pub velocity: Box<[f64]>,
    pub gradient: Box<[f64]>,
    pub log_density: f64,
}

impl PhasePoint {
    /// A point at the origin whose log density has not been evaluated.
    pub fn new(dim: usize) -> Self {
        PhasePoint {
            position: vec![0f64; dim].into(),
            momentum: vec![0f64; dim].into(),
            velocity: vec![0f64; dim].into(),
            gradient: vec![0f64; dim].into(),
            log_density: f64::NAN,
        }
    }

    /// Create a point and evaluate the model at `position`.
    pub fn evaluate<M: LogDensityGradient + ?Sized>(
        model: &M,
        position: &[f64],
        momentum: &[f64],
    ) -> std::result::Result<Self, M::LogpError> {
        let mut point = PhasePoint::new(position.len());
        point.position.copy_from_slice(position);
        point.momentum.copy_from_slice(momentum);
        point.update_gradient(model)?;
        Ok(point)
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }

    /// `log p(position) - 0.5 * momentum^T M^{-1} momentum`
    pub fn joint_log_density(&self, metric: &DiagMetric) -> f64 {
        metric.joint_log_density(self.log_density, &self.momentum)
    }

    pub fn negate_momentum(&mut self) {
        self.momentum.iter_mut().for_each(|p| *p = -*p);
    }

    pub fn copy_from(&mut self, other: &PhasePoint) {
        let PhasePoint {
            position,
            momentum,
            velocity,
            gradient,
            log_density,
        } = other;
        self.position.copy_from_slice(position);
        self.momentum.copy_from_slice(momentum);
        self.velocity.copy_from_slice(velocity);
        self.gradient.copy_from_slice(gradient);
        self.log_density = *log_density;
    }

    pub(crate) fn update_gradient<M: LogDensityGradient + ?Sized>(
        &mut self,
        model: &M,
    ) -> std::result::Result<(), M::LogpError> {
        self.log_density = model.log_density_gradient(&self.position, &mut self.gradient)?;
        Ok(())
    }

    fn momentum_halfstep(&mut self, epsilon: f64) {
        axpy(&self.gradient, &mut self.momentum, epsilon / 2.);
    }

    fn position_step(&mut self, metric: &DiagMetric, epsilon: f64) {
        metric.update_velocity(&self.momentum, &mut self.velocity);
        axpy(&self.velocity, &mut self.position, epsilon);
    }
}

/// Details about a trajectory that had to be abandoned.
///
/// There are two reasons why this happens:
/// - The position, momentum, log density or gradient became non-finite.
/// - The logp function returned a recoverable error.
#[derive(Debug)]
pub struct Divergence {
    /// The number of leapfrog steps completed before the failing one.
    pub completed_steps: usize,
    pub logp_function_error: Option<Box<dyn Error + Send + Sync>>,
}

#[derive(Debug)]
pub enum Trajectory {
    Complete,
    Diverged(Divergence),
}

/// The leapfrog integrator for Hamiltonian dynamics with a diagonal metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leapfrog {
    step_size: f64,
    num_steps: usize,
}

impl Leapfrog {
    pub fn new(step_size: f64, num_steps: usize) -> Result<Self> {
        if !(step_size.is_finite() && step_size > 0.) {
            return Err(SamplerError::InvalidStepSize(step_size));
        }
        if num_steps == 0 {
            return Err(SamplerError::InvalidNumSteps);
        }
        Ok(Leapfrog {
            step_size,
            num_steps,
        })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Move `point` along `num_steps` leapfrog steps in place.
    ///
    /// The log density and gradient stored in `point` must belong to its
    /// position. Each step reuses the gradient of the previous one, so a
    /// trajectory costs `num_steps` gradient evaluations. Integrating the
    /// result again with negated momentum returns to the starting point.
    ///
    /// Only unrecoverable logp errors and a point whose dimension differs
    /// from the metric are returned as `Err`.
    pub fn integrate<M: LogDensityGradient + ?Sized>(
        &self,
        model: &M,
        metric: &DiagMetric,
        point: &mut PhasePoint,
    ) -> Result<Trajectory> {
        check_dim(metric.dim(), point.dim())?;
        let epsilon = self.step_size;

        for step in 0..self.num_steps {
            let diverged = |logp_function_error: Option<Box<dyn Error + Send + Sync>>| {
                Trajectory::Diverged(Divergence {
                    completed_steps: step,
                    logp_function_error,
                })
            };

            point.momentum_halfstep(epsilon);
            point.position_step(metric, epsilon);
            if !all_finite(&point.position) {
                return Ok(diverged(None));
            }

            if let Err(logp_error) = point.update_gradient(model) {
                if !logp_error.is_recoverable() {
                    return Err(SamplerError::LogpFailure(Box::new(logp_error)));
                }
                debug!("Leapfrog step {} hit a recoverable logp error: {}", step, logp_error);
                return Ok(diverged(Some(Box::new(logp_error))));
            }
            if !point.log_density.is_finite() | !all_finite(&point.gradient) {
                return Ok(diverged(None));
            }

            point.momentum_halfstep(epsilon);
            if !all_finite(&point.momentum) {
                return Ok(diverged(None));
            }
        }

        Ok(Trajectory::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_logps::{CoshLogp, CountingLogp, HalfNormalLogp, NormalLogp};

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn points(dim: usize) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
        (
            prop::collection::vec(-3f64..3f64, dim),
            prop::collection::vec(-3f64..3f64, dim),
        )
    }

    proptest! {
        #[test]
        fn leapfrog_is_reversible((position, momentum) in points(3)) {
            let model = NormalLogp::new(&[0.5, -1., 0.], &[1., 2., 0.7]);
            let metric = DiagMetric::new(&[1., 3., 0.5]).unwrap();
            let leapfrog = Leapfrog::new(0.1, 20).unwrap();

            let start = PhasePoint::evaluate(&model, &position, &momentum).unwrap();
            let mut point = start.clone();
            let forward = leapfrog.integrate(&model, &metric, &mut point).unwrap();
            prop_assert!(matches!(forward, Trajectory::Complete));

            point.negate_momentum();
            let backward = leapfrog.integrate(&model, &metric, &mut point).unwrap();
            prop_assert!(matches!(backward, Trajectory::Complete));

            for i in 0..3 {
                prop_assert!((point.position[i] - start.position[i]).abs() < 1e-8);
                prop_assert!((point.momentum[i] + start.momentum[i]).abs() < 1e-8);
            }
        }

        #[test]
        fn leapfrog_is_reversible_off_quadratic((position, momentum) in points(2)) {
            let model = CoshLogp { dim: 2 };
            let metric = DiagMetric::new(&[2., 0.5]).unwrap();
            let leapfrog = Leapfrog::new(0.05, 25).unwrap();

            let start = PhasePoint::evaluate(&model, &position, &momentum).unwrap();
            let mut point = start.clone();
            leapfrog.integrate(&model, &metric, &mut point).unwrap();
            point.negate_momentum();
            leapfrog.integrate(&model, &metric, &mut point).unwrap();

            for i in 0..2 {
                prop_assert!((point.position[i] - start.position[i]).abs() < 1e-8);
                prop_assert!((point.momentum[i] + start.momentum[i]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn energy_is_conserved() {
        let model = NormalLogp::standard(2);
        let metric = DiagMetric::unit(2);
        let leapfrog = Leapfrog::new(0.01, 50).unwrap();

        let mut point = PhasePoint::evaluate(&model, &[1.2, -0.4], &[0.3, 1.5]).unwrap();
        let initial = point.joint_log_density(&metric);
        leapfrog.integrate(&model, &metric, &mut point).unwrap();
        let end = point.joint_log_density(&metric);

        assert!((end - initial).abs() < 0.05);
        // The trajectory actually moved.
        assert!((point.position[1] + 0.4).abs() > 0.5);
    }

    #[test]
    fn harmonic_oscillator_with_mass() {
        // With mass m and unit variance the exact flow has period 2 pi sqrt(m)
        let model = NormalLogp::standard(1);
        let metric = DiagMetric::new(&[4.]).unwrap();
        let n = 4000;
        let leapfrog = Leapfrog::new(4. * std::f64::consts::PI / n as f64, n).unwrap();

        let mut point = PhasePoint::evaluate(&model, &[1.], &[0.]).unwrap();
        leapfrog.integrate(&model, &metric, &mut point).unwrap();
        assert_abs_diff_eq!(point.position[0], 1., epsilon = 1e-4);
        assert_abs_diff_eq!(point.momentum[0], 0., epsilon = 1e-4);
    }

    #[test]
    fn one_gradient_per_step() {
        let model = CountingLogp::new(NormalLogp::standard(2));
        let metric = DiagMetric::unit(2);
        let leapfrog = Leapfrog::new(0.1, 7).unwrap();

        let mut point = PhasePoint::evaluate(&model, &[0.1, 0.2], &[1., 1.]).unwrap();
        assert_eq!(model.calls(), 1);
        leapfrog.integrate(&model, &metric, &mut point).unwrap();
        assert_eq!(model.calls(), 8);
    }

    #[test]
    fn recoverable_error_diverges() {
        let model = HalfNormalLogp { dim: 1 };
        let metric = DiagMetric::unit(1);
        let leapfrog = Leapfrog::new(0.5, 10).unwrap();

        let mut point = PhasePoint::evaluate(&model, &[0.2], &[-3.]).unwrap();
        match leapfrog.integrate(&model, &metric, &mut point).unwrap() {
            Trajectory::Diverged(info) => {
                assert_eq!(info.completed_steps, 0);
                assert!(info.logp_function_error.is_some());
            }
            Trajectory::Complete => panic!("trajectory left the support"),
        }
    }

    #[test]
    fn metric_dimension_mismatch() {
        let model = CountingLogp::new(NormalLogp::standard(2));
        let metric = DiagMetric::unit(3);
        let leapfrog = Leapfrog::new(0.1, 5).unwrap();

        let mut point = PhasePoint::new(2);
        let err = leapfrog.integrate(&model, &metric, &mut point).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        ));
        assert_eq!(model.calls(), 0);
        assert_eq!(&*point.position, &[0., 0.]);
        assert!(point.log_density.is_nan());
    }

    #[test]
    fn invalid_configuration() {
        assert!(matches!(
            Leapfrog::new(0., 10),
            Err(SamplerError::InvalidStepSize(_))
        ));
        assert!(matches!(
            Leapfrog::new(f64::INFINITY, 10),
            Err(SamplerError::InvalidStepSize(_))
        ));
        assert!(matches!(
            Leapfrog::new(0.1, 0),
            Err(SamplerError::InvalidNumSteps)
        ));
    }
}
