use std::iter::FusedIterator;

use crate::kernel::{Draw, Kernel, Result};

/// An endless, lazy sequence of draws from a kernel.
///
/// Every call to `next` performs exactly one transition. If the model fails
/// with an unrecoverable error, the stream yields that error once and is
/// exhausted afterwards. Use `take` to bound the number of draws.
pub struct SampleStream<K> {
    kernel: K,
    failed: bool,
}

impl<K: Kernel> SampleStream<K> {
    pub fn new(kernel: K) -> Self {
        SampleStream {
            kernel,
            failed: false,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn into_inner(self) -> K {
        self.kernel
    }
}

impl<K: Kernel> Iterator for SampleStream<K> {
    type Item = Result<Draw>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let draw = self.kernel.step();
        self.failed = draw.is_err();
        Some(draw)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (usize::MAX, None)
        }
    }
}

impl<K: Kernel> FusedIterator for SampleStream<K> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel::SamplerError, model::test_logps::DomainError};

    use pretty_assertions::assert_eq;

    /// Walks along the integers and fails once it reaches `fail_at`.
    struct CountingKernel {
        position: [f64; 1],
        fail_at: f64,
    }

    impl Kernel for CountingKernel {
        fn dim(&self) -> usize {
            1
        }

        fn position(&self) -> &[f64] {
            &self.position
        }

        fn log_density(&self) -> Option<f64> {
            Some(0.)
        }

        fn step(&mut self) -> Result<Draw> {
            self.position[0] += 1.;
            if self.position[0] >= self.fail_at {
                return Err(SamplerError::LogpFailure(Box::new(DomainError::Fatal)));
            }
            Ok(Draw {
                theta: self.position.into(),
                log_density: 0.,
                accepted: true,
            })
        }
    }

    #[test]
    fn lazy_and_ordered() {
        let mut kernel = CountingKernel {
            position: [0.],
            fail_at: f64::INFINITY,
        };
        let draws: Vec<f64> = (&mut kernel)
            .into_stream()
            .take(5)
            .map(|draw| draw.unwrap().theta[0])
            .collect();
        assert_eq!(draws, vec![1., 2., 3., 4., 5.]);
        // Only the draws that were pulled were computed
        assert_eq!(kernel.position(), &[5.]);
    }

    #[test]
    fn error_ends_the_stream() {
        let mut stream = CountingKernel {
            position: [0.],
            fail_at: 3.,
        }
        .into_stream();
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(
            stream.next(),
            Some(Err(SamplerError::LogpFailure(_)))
        ));
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.size_hint(), (0, Some(0)));
        assert_eq!(stream.into_inner().position(), &[3.]);
    }

    #[test]
    fn collect_stops_at_first_error() {
        let stream = CountingKernel {
            position: [0.],
            fail_at: 4.,
        }
        .into_stream();
        let result: Result<Vec<Draw>> = stream.collect();
        assert!(result.is_err());
    }
}
