//! Hamiltonian Monte Carlo with a fixed step size, a fixed number of
//! leapfrog steps and a fixed diagonal metric.

use log::{debug, trace, warn};
use rand_chacha::ChaCha8Rng;

use crate::{
    integrator::{Leapfrog, PhasePoint, Trajectory},
    kernel::{check_dim, metropolis_accept, ChainState, Draw, Kernel, Result, SamplerError},
    math::all_finite,
    metric::DiagMetric,
    model::{LogDensityGradient, LogpError},
    random::{chain_rng, RandomSource},
};

/// Configuration of a static HMC chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmcSettings {
    /// The leapfrog step size.
    pub step_size: f64,
    /// The number of leapfrog steps per draw.
    pub num_steps: usize,
    pub seed: u64,
}

impl Default for HmcSettings {
    fn default() -> Self {
        Self {
            step_size: 0.1,
            num_steps: 10,
            seed: 0,
        }
    }
}

impl HmcSettings {
    /// Create the kernel for chain number `chain`.
    ///
    /// Chains with the same seed and different chain numbers use
    /// independent random streams. Without a metric, the unit metric is
    /// used.
    pub fn new_chain<M: LogDensityGradient>(
        &self,
        chain: u64,
        model: M,
        metric: Option<DiagMetric>,
        init: Option<&[f64]>,
    ) -> Result<HmcDiagKernel<M, ChaCha8Rng>> {
        let leapfrog = Leapfrog::new(self.step_size, self.num_steps)?;
        HmcDiagKernel::new(model, chain_rng(self.seed, chain), leapfrog, metric, init)
    }
}

/// Static-trajectory HMC with a diagonal metric.
///
/// Every draw refreshes the momentum from `N(0, M)`, runs the leapfrog
/// integrator and accepts the end point with the Metropolis criterion on
/// the joint density of position and momentum.
pub struct HmcDiagKernel<M, R> {
    model: M,
    rng: R,
    metric: DiagMetric,
    leapfrog: Leapfrog,
    current: PhasePoint,
    proposal: PhasePoint,
    evaluated: bool,
}

impl<M: LogDensityGradient, R: RandomSource> HmcDiagKernel<M, R> {
    /// Create a kernel. The model is not evaluated until the first draw.
    ///
    /// Without `init`, the chain starts at a standard normal draw.
    pub fn new(
        model: M,
        mut rng: R,
        leapfrog: Leapfrog,
        metric: Option<DiagMetric>,
        init: Option<&[f64]>,
    ) -> Result<Self> {
        let dim = model.dim();
        if let Some(init) = init {
            check_dim(dim, init.len())?;
        }
        let metric = match metric {
            Some(metric) => {
                metric.check_dim(dim)?;
                metric
            }
            None => DiagMetric::unit(dim),
        };

        let mut current = PhasePoint::new(dim);
        match init {
            Some(init) => current.position.copy_from_slice(init),
            None => rng.fill_normal(&mut current.position),
        }

        debug!(
            "Created HMC kernel for {} with dim {}, step size {}, {} leapfrog steps",
            model.name(),
            dim,
            leapfrog.step_size(),
            leapfrog.num_steps()
        );

        Ok(HmcDiagKernel {
            model,
            rng,
            metric,
            leapfrog,
            current,
            proposal: PhasePoint::new(dim),
            evaluated: false,
        })
    }

    pub fn metric(&self) -> &DiagMetric {
        &self.metric
    }

    pub fn leapfrog(&self) -> &Leapfrog {
        &self.leapfrog
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// The current state, once the first draw has evaluated it.
    pub fn state(&self) -> Option<ChainState> {
        self.evaluated.then(|| ChainState {
            theta: self.current.position.clone(),
            log_density: self.current.log_density,
        })
    }

    fn evaluate_current(&mut self) -> Result<()> {
        if let Err(logp_error) = self.current.update_gradient(&self.model) {
            if !logp_error.is_recoverable() {
                return Err(SamplerError::LogpFailure(Box::new(logp_error)));
            }
            warn!("Initial point is outside the support: {}", logp_error);
            self.current.log_density = f64::NEG_INFINITY;
            self.current.gradient.fill(f64::NAN);
        }
        if self.current.log_density.is_nan() {
            self.current.log_density = f64::NEG_INFINITY;
        }
        if !self.current.log_density.is_finite() | !all_finite(&self.current.gradient) {
            warn!("Log density or gradient at the initial point is not finite");
        }
        self.evaluated = true;
        Ok(())
    }

    fn draw(&self, accepted: bool) -> Draw {
        Draw {
            theta: self.current.position.clone(),
            log_density: self.current.log_density,
            accepted,
        }
    }
}

impl<M: LogDensityGradient, R: RandomSource> Kernel for HmcDiagKernel<M, R> {
    fn dim(&self) -> usize {
        self.metric.dim()
    }

    fn position(&self) -> &[f64] {
        &self.current.position
    }

    fn log_density(&self) -> Option<f64> {
        self.evaluated.then_some(self.current.log_density)
    }

    fn step(&mut self) -> Result<Draw> {
        if !self.evaluated {
            self.evaluate_current()?;
        }

        self.metric
            .randomize_momentum(&mut self.rng, &mut self.current.momentum);
        let initial = self.current.joint_log_density(&self.metric);

        self.proposal.copy_from(&self.current);
        let proposed = match self
            .leapfrog
            .integrate(&self.model, &self.metric, &mut self.proposal)?
        {
            Trajectory::Complete => self.proposal.joint_log_density(&self.metric),
            Trajectory::Diverged(info) => {
                debug!(
                    "Rejecting trajectory that diverged after {} leapfrog steps",
                    info.completed_steps
                );
                f64::NEG_INFINITY
            }
        };

        let u = self.rng.uniform();
        let accepted = metropolis_accept(proposed - initial, u);
        if accepted {
            std::mem::swap(&mut self.current, &mut self.proposal);
        }
        trace!(
            "HMC energy change {}, accepted: {}",
            proposed - initial,
            accepted
        );

        Ok(self.draw(accepted))
    }
}
