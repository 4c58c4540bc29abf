use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Source of the uniform and standard normal draws a kernel consumes.
///
/// Every [`rand::Rng`] is a random source, so kernels are normally
/// constructed with a seeded generator. Tests can substitute a source
/// that replays a fixed sequence.
pub trait RandomSource {
    /// A uniform draw from `[0, 1)`.
    fn uniform(&mut self) -> f64;

    fn standard_normal(&mut self) -> f64;

    /// Overwrite `out` with iid standard normal draws.
    fn fill_normal(&mut self, out: &mut [f64]) {
        out.iter_mut().for_each(|x| *x = self.standard_normal());
    }

    /// `n` iid standard normal draws.
    fn normal(&mut self, n: usize) -> Vec<f64> {
        let mut out = vec![0f64; n];
        self.fill_normal(&mut out);
        out
    }
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn standard_normal(&mut self) -> f64 {
        self.sample(StandardNormal)
    }
}

/// The generator behind seeded chains.
///
/// All chains created from the same seed share one key and get their own
/// stream, so their draws never overlap.
pub fn chain_rng(seed: u64, chain: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(chain);
    rng
}
