//! Splittable, explicitly threaded random streams.
//!
//! A `RandomStream` is a 64 bit key.  It never advances: sampling from a stream
//! always yields the same values, and fresh randomness is obtained by splitting
//! the key into independent children.  Strategies never touch process-wide
//! random state, so a run is fully determined by the seed handed to the driver.
extern crate rand;
extern crate rand_xorshift;

use self::rand::distributions::{Distribution, Normal, Uniform};
use self::rand::SeedableRng;
use self::rand_xorshift::XorShiftRng;

// SplitMix64 finalizer
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Immutable handle to a deterministic stream of random numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RandomStream {
    key: u64,
}

impl RandomStream {
    /// Creates a new stream from a seed
    pub fn new(seed: u64) -> Self {
        RandomStream { key: mix(seed) }
    }

    /// Derives a child stream from this stream and a piece of data
    pub fn fold_in(self, data: u64) -> Self {
        RandomStream {
            key: mix(self.key ^ mix(data.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA))),
        }
    }

    /// Splits the stream into two independent children
    pub fn split(self) -> (Self, Self) {
        (self.fold_in(0), self.fold_in(1))
    }

    /// Splits the stream into `n` independent children
    pub fn split_n(self, n: usize) -> Vec<Self> {
        (0..n as u64).map(|i| self.fold_in(i)).collect()
    }

    // Every draw starts from the same generator state for a given key.
    fn generator(&self) -> XorShiftRng {
        XorShiftRng::seed_from_u64(self.key)
    }

    /// Draws `n` samples from N(0, 1)
    pub fn normal(self, n: usize) -> Vec<f32> {
        let dist = Normal::new(0.0, 1.0);
        let mut rng = self.generator();
        (0..n).map(|_| dist.sample(&mut rng) as f32).collect()
    }

    /// Draws `n` samples from U[low, high).  A degenerate interval yields `low`.
    pub fn uniform(self, n: usize, low: f32, high: f32) -> Vec<f32> {
        if !(low < high) {
            return vec![low; n];
        }
        let dist = Uniform::new(low, high);
        let mut rng = self.generator();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reproducible() {
        let a = RandomStream::new(42);
        let b = RandomStream::new(42);
        assert_eq!(a.normal(16), b.normal(16));
        assert_eq!(a.uniform(8, -1., 1.), b.uniform(8, -1., 1.));
    }

    #[test]
    fn test_split_is_independent() {
        let rng = RandomStream::new(7);
        let (left, right) = rng.split();
        assert_ne!(left, right);
        assert_ne!(left, rng);
        assert_ne!(left.normal(4), right.normal(4));

        let children = rng.split_n(3);
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], left);
        assert_eq!(children[1], right);
    }

    #[test]
    fn test_uniform_bounds() {
        let values = RandomStream::new(3).uniform(1000, -2., 2.);
        assert!(values.iter().all(|v| *v >= -2. && *v < 2.));

        // Degenerate intervals are constant
        assert_eq!(RandomStream::new(3).uniform(3, 0., 0.), vec![0.; 3]);
    }

    #[test]
    fn test_normal_moments() {
        let values = RandomStream::new(11).normal(20000);
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.).abs() < 0.05);
    }
}
