//! Markov chain Monte Carlo kernels for a black-box log density.
//!
//! The model is only ever queried through [`LogDensity`] (and
//! [`LogDensityGradient`] for HMC). Two kernels are provided: random-walk
//! Metropolis and static HMC with a diagonal metric. Both produce one
//! [`Draw`] per [`Kernel::step`], and [`Kernel::into_stream`] turns them
//! into an iterator.
//!
//! ```
//! use oracle_mcmc::{test_logps::NormalLogp, HmcSettings, Kernel};
//!
//! let model = NormalLogp::standard(3);
//! let settings = HmcSettings {
//!     seed: 42,
//!     ..Default::default()
//! };
//! let draws = settings
//!     .new_chain(0, &model, None, None)?
//!     .into_stream()
//!     .take(100)
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(draws.len(), 100);
//! # Ok::<(), oracle_mcmc::SamplerError>(())
//! ```

pub(crate) mod finite_diff;
pub(crate) mod hmc;
pub(crate) mod integrator;
pub(crate) mod kernel;
pub(crate) mod math;
pub(crate) mod metric;
pub(crate) mod metropolis;
pub(crate) mod model;
pub(crate) mod proposal;
pub(crate) mod random;
pub(crate) mod stats;
pub(crate) mod stream;

pub use finite_diff::{FiniteDiffGradient, FiniteDiffHessian};
pub use hmc::{HmcDiagKernel, HmcSettings};
pub use integrator::{Divergence, Leapfrog, PhasePoint, Trajectory};
pub use kernel::{ChainState, Draw, Kernel, Result, SamplerError};
pub use metric::DiagMetric;
pub use metropolis::{MetropolisKernel, MetropolisSettings};
pub use model::{test_logps, LogDensity, LogDensityGradient, LogDensityHessian, LogpError};
pub use proposal::{GaussianProposal, Proposal};
pub use random::{chain_rng, RandomSource};
pub use stats::{batch_means_mcse, ChainSummary};
pub use stream::SampleStream;
