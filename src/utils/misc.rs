use crate::utils::mat::Matrix;
use std::ops::Shl;

/// True when any value of `x` is NaN or infinite.
pub fn check_abnormal(x: &Matrix) -> bool {
    x.as_slice().iter().any(|v| !v.is_finite())
}

/// Park-Miller minimal standard generator step.
pub fn rand_next(seed: &mut u32) -> u32 {
    let lo = (std::num::Wrapping(16807) * std::num::Wrapping(*seed & 0xFFFF)).0;
    let hi = (std::num::Wrapping(16807) * std::num::Wrapping(*seed >> 16)).0;
    let val = (std::num::Wrapping(lo)
        + std::num::Wrapping(hi & 0x7FFF).shl(16)
        + std::num::Wrapping(hi >> 15))
    .0;

    *seed = if val > 0x7FFFFFFF {
        val - 0x7FFFFFFF
    } else {
        val
    };
    *seed
}

/// Maps an arbitrary seed into the generator's valid state range `[1, 2^31 - 2]`.
pub fn normalize_seed(seed: u32) -> u32 {
    match seed % 0x7FFFFFFF {
        0 => 1,
        s => s,
    }
}

pub fn random_shuffle(x: &mut [usize], seed: u32) {
    let len = x.len();
    if len < 2 {
        return;
    }
    let mut seed = normalize_seed(seed);
    for i in 0..(len - 1) {
        let left = (len - i) as u32;
        let offset = rand_next(&mut seed) % left;
        if offset != 0 {
            x.swap(i, i + offset as usize);
        }
    }
}

/// Seeded uniform source built on `rand_next`.
#[derive(Debug, Clone)]
pub struct SeedRng {
    seed: u32,
}

impl SeedRng {
    pub fn new(seed: u32) -> Self {
        Self {
            seed: normalize_seed(seed),
        }
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (rand_next(&mut self.seed) >> 7) as f32 / (1u32 << 24) as f32
    }

    pub fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    pub fn next_u32(&mut self) -> u32 {
        rand_next(&mut self.seed)
    }
}

/// Fills `x` uniformly in `[-1/sqrt(fan_in), 1/sqrt(fan_in)]`.
pub fn fan_in_uniform_init(x: &mut Matrix, fan_in: usize, rng: &mut SeedRng) {
    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
    x.as_mut_slice()
        .iter_mut()
        .for_each(|v| *v = rng.uniform(-bound, bound));
}

/// Rounds half to even, so `2.5 -> 2` and `3.5 -> 4`.
pub fn round_half_even(x: f64) -> usize {
    let floor = x.floor();
    let diff = x - floor;
    let rounded = if (diff - 0.5).abs() < 1e-9 {
        if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        x.round()
    };
    rounded.max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_is_a_seeded_permutation() {
        let mut a = (0..50).collect::<Vec<_>>();
        let mut b = a.clone();
        random_shuffle(&mut a, 7);
        random_shuffle(&mut b, 7);
        assert_eq!(a, b);
        assert_ne!(a, (0..50).collect::<Vec<_>>());
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn zero_seed_still_shuffles() {
        let mut a = (0..20).collect::<Vec<_>>();
        random_shuffle(&mut a, 0);
        assert_ne!(a, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_handles_tiny_inputs() {
        let mut empty: Vec<usize> = vec![];
        random_shuffle(&mut empty, 3);
        let mut one = vec![4];
        random_shuffle(&mut one, 3);
        assert_eq!(one, vec![4]);
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = SeedRng::new(42);
        for _ in 0..1000 {
            let v = rng.uniform(-0.5, 0.5);
            assert!((-0.5..0.5).contains(&v));
        }
    }

    #[test]
    fn banker_rounding() {
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(31.65), 32);
        assert_eq!(round_half_even(0.2), 0);
    }

    #[test]
    fn abnormal_values_detected() {
        let mut m = Matrix::new(1, 2);
        assert!(!check_abnormal(&m));
        m.set(0, 1, f32::NAN);
        assert!(check_abnormal(&m));
    }
}
