use crate::{
    kernel::{check_dim, Result, SamplerError},
    math::{multiply, weighted_dot},
    random::RandomSource,
};

/// A diagonal mass matrix `M`.
///
/// Momentum is distributed as `N(0, M)`, so the kinetic energy is
/// `0.5 * p^T M^{-1} p` and the velocity is `M^{-1} p`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagMetric {
    mass: Box<[f64]>,
    inv_mass: Box<[f64]>,
    stds: Box<[f64]>,
}

impl DiagMetric {
    pub fn new(mass: &[f64]) -> Result<Self> {
        if let Some((index, &value)) = mass
            .iter()
            .enumerate()
            .find(|&(_, &m)| !(m.is_finite() && m > 0.))
        {
            return Err(SamplerError::InvalidMetric { index, value });
        }
        Ok(DiagMetric {
            mass: mass.into(),
            inv_mass: mass.iter().map(|m| m.recip()).collect(),
            stds: mass.iter().map(|m| m.sqrt()).collect(),
        })
    }

    pub fn unit(dim: usize) -> Self {
        DiagMetric {
            mass: vec![1f64; dim].into(),
            inv_mass: vec![1f64; dim].into(),
            stds: vec![1f64; dim].into(),
        }
    }

    pub fn dim(&self) -> usize {
        self.mass.len()
    }

    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn inv_mass(&self) -> &[f64] {
        &self.inv_mass
    }

    pub(crate) fn check_dim(&self, dim: usize) -> Result<()> {
        check_dim(dim, self.dim())
    }

    /// Draw `momentum ~ N(0, M)`, consuming one standard normal per entry.
    pub fn randomize_momentum<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        momentum: &mut [f64],
    ) {
        assert!(momentum.len() == self.dim());
        rng.fill_normal(momentum);
        momentum
            .iter_mut()
            .zip(self.stds.iter())
            .for_each(|(p, s)| *p *= s);
    }

    pub fn update_velocity(&self, momentum: &[f64], velocity: &mut [f64]) {
        multiply(&self.inv_mass, momentum, velocity);
    }

    pub fn kinetic_energy(&self, momentum: &[f64]) -> f64 {
        0.5 * weighted_dot(momentum, &self.inv_mass, momentum)
    }

    /// `log p(theta) - 0.5 * p^T M^{-1} p`
    pub fn joint_log_density(&self, log_density: f64, momentum: &[f64]) -> f64 {
        log_density - self.kinetic_energy(momentum)
    }
}
