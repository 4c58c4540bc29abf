//! Random-walk Metropolis.

use log::{debug, trace};
use rand_chacha::ChaCha8Rng;

use crate::{
    kernel::{check_dim, checked_log_density, metropolis_accept, ChainState, Draw, Kernel, Result},
    math::axpy,
    model::LogDensity,
    proposal::{GaussianProposal, Proposal},
    random::{chain_rng, RandomSource},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetropolisSettings {
    /// Standard deviation of the isotropic normal increments.
    pub proposal_scale: f64,
    pub seed: u64,
}

impl Default for MetropolisSettings {
    fn default() -> Self {
        Self {
            proposal_scale: 1.,
            seed: 0,
        }
    }
}

impl MetropolisSettings {
    /// Create a kernel with normal increments for chain number `chain`.
    pub fn new_chain<M: LogDensity>(
        &self,
        chain: u64,
        model: M,
        init: Option<&[f64]>,
    ) -> Result<MetropolisKernel<M, GaussianProposal, ChaCha8Rng>> {
        let proposal = GaussianProposal::new(self.proposal_scale)?;
        MetropolisKernel::new(model, proposal, chain_rng(self.seed, chain), init)
    }
}

/// A Metropolis kernel with a symmetric random-walk proposal.
///
/// The log density at the current position is cached, so each step costs
/// one model evaluation at the candidate.
pub struct MetropolisKernel<M, P, R> {
    model: M,
    proposal: P,
    rng: R,
    state: ChainState,
    candidate: Box<[f64]>,
}

impl<M, P, R> MetropolisKernel<M, P, R>
where
    M: LogDensity,
    P: Proposal<R>,
    R: RandomSource,
{
    /// Create a kernel and evaluate the model at the initial position.
    ///
    /// Without `init`, the chain starts at a standard normal draw.
    pub fn new(model: M, proposal: P, mut rng: R, init: Option<&[f64]>) -> Result<Self> {
        let dim = model.dim();
        let theta: Box<[f64]> = match init {
            Some(init) => {
                check_dim(dim, init.len())?;
                init.into()
            }
            None => rng.normal(dim).into(),
        };
        let log_density = checked_log_density(&model, &theta)?;
        debug!(
            "Created Metropolis kernel for {} with dim {}, initial log density {}",
            model.name(),
            dim,
            log_density
        );

        Ok(MetropolisKernel {
            model,
            proposal,
            rng,
            state: ChainState { theta, log_density },
            candidate: vec![0f64; dim].into(),
        })
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M, P, R> Kernel for MetropolisKernel<M, P, R>
where
    M: LogDensity,
    P: Proposal<R>,
    R: RandomSource,
{
    fn dim(&self) -> usize {
        self.state.theta.len()
    }

    fn position(&self) -> &[f64] {
        &self.state.theta
    }

    fn log_density(&self) -> Option<f64> {
        Some(self.state.log_density)
    }

    fn step(&mut self) -> Result<Draw> {
        self.proposal.perturb(&mut self.rng, &mut self.candidate);
        axpy(&self.state.theta, &mut self.candidate, 1.);

        let proposed = checked_log_density(&self.model, &self.candidate)?;
        let log_ratio = proposed - self.state.log_density;
        let u = self.rng.uniform();
        let accepted = metropolis_accept(log_ratio, u);
        if accepted {
            std::mem::swap(&mut self.state.theta, &mut self.candidate);
            self.state.log_density = proposed;
        }
        trace!("Metropolis log ratio {}, accepted: {}", log_ratio, accepted);

        Ok(Draw {
            theta: self.state.theta.clone(),
            log_density: self.state.log_density,
            accepted,
        })
    }
}
