use crate::{
    kernel::{Result, SamplerError},
    random::RandomSource,
};

/// The random-walk increment of a Metropolis kernel.
///
/// A proposal may consume any number of draws from the random source, or
/// none at all if it carries its own generator. Closures with the
/// signature `FnMut(&mut R, &mut [f64])` are proposals.
pub trait Proposal<R: ?Sized> {
    /// Overwrite `out` with a perturbation of the current position.
    fn perturb(&mut self, rng: &mut R, out: &mut [f64]);
}

impl<R: ?Sized, F: FnMut(&mut R, &mut [f64])> Proposal<R> for F {
    fn perturb(&mut self, rng: &mut R, out: &mut [f64]) {
        self(rng, out)
    }
}

/// Isotropic normal increments `N(0, scale^2 I)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianProposal {
    scale: f64,
}

impl GaussianProposal {
    pub fn new(scale: f64) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.) {
            return Err(SamplerError::InvalidProposalScale(scale));
        }
        Ok(GaussianProposal { scale })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl<R: RandomSource + ?Sized> Proposal<R> for GaussianProposal {
    fn perturb(&mut self, rng: &mut R, out: &mut [f64]) {
        rng.fill_normal(out);
        out.iter_mut().for_each(|x| *x *= self.scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::chain_rng;

    use pretty_assertions::assert_eq;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn invalid_scale() {
        assert!(matches!(
            GaussianProposal::new(0.),
            Err(SamplerError::InvalidProposalScale(_))
        ));
        assert!(GaussianProposal::new(f64::NAN).is_err());
        assert_eq!(GaussianProposal::new(0.5).unwrap().scale(), 0.5);
    }

    #[test]
    fn gaussian_scales_standard_normals() {
        let mut proposal = GaussianProposal::new(0.5).unwrap();
        let mut out = [0f64; 3];
        proposal.perturb(&mut chain_rng(5, 0), &mut out);

        let expected: Vec<f64> = chain_rng(5, 0)
            .normal(3)
            .into_iter()
            .map(|x| 0.5 * x)
            .collect();
        assert_eq!(out.to_vec(), expected);
    }

    #[test]
    fn closures_are_proposals() {
        let mut calls = 0;
        let mut proposal = |_: &mut ChaCha8Rng, out: &mut [f64]| {
            calls += 1;
            out.fill(1.);
        };
        let mut out = [0f64; 2];
        proposal.perturb(&mut chain_rng(0, 0), &mut out);
        assert_eq!(out, [1., 1.]);
        assert_eq!(calls, 1);
    }
}
