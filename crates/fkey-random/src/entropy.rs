use fkey_dtype::KeyScalar;

/// Probability that a single key bit survives `entropy_reduction + 1` ANDs.
#[must_use]
pub fn bit_survival_probability(entropy_reduction: i32) -> f64 {
    if entropy_reduction < 0 {
        0.0
    } else {
        0.5_f64.powi(entropy_reduction.saturating_add(1))
    }
}

/// Shannon entropy, in bits, of a Bernoulli(`p`) variable.
#[must_use]
pub fn binary_entropy(p: f64) -> f64 {
    if !(p > 0.0 && p < 1.0) {
        return 0.0;
    }
    let q = 1.0 - p;
    -(p * p.log2()) - q * q.log2()
}

/// Expected effectively-random bits in a key truncated to `lower_bits`.
///
/// Evaluates to the classic calibration figures for 32-bit keys:
/// 32, 25.95, 17.41, 10.78 and 6.42 for entropy reductions 0 through 4.
#[must_use]
pub fn effective_bits(entropy_reduction: i32, lower_bits: u32) -> f64 {
    f64::from(lower_bits) * binary_entropy(bit_survival_probability(entropy_reduction))
}

/// Pearson chi-square statistic of `observed` against a uniform expectation.
#[must_use]
pub fn chi_square_statistic(observed: &[u64]) -> f64 {
    let total: u64 = observed.iter().sum();
    if observed.is_empty() || total == 0 {
        return 0.0;
    }
    let expected = total as f64 / observed.len() as f64;
    observed
        .iter()
        .map(|&count| {
            let delta = count as f64 - expected;
            delta * delta / expected
        })
        .sum()
}

/// Per-bit set counts accumulated over a sample of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitFrequencies {
    samples: u64,
    set_counts: Vec<u64>,
}

impl BitFrequencies {
    #[must_use]
    pub fn new(width: u32) -> Self {
        Self {
            samples: 0,
            set_counts: vec![0; width.min(64) as usize],
        }
    }

    #[must_use]
    pub fn for_key<T: KeyScalar>() -> Self {
        Self::new(T::BITS)
    }

    pub fn observe<T: KeyScalar>(&mut self, key: T) {
        let bits = key.to_bits();
        self.samples += 1;
        for (bit, count) in self.set_counts.iter_mut().enumerate() {
            *count += (bits >> bit) & 1;
        }
    }

    pub fn observe_all<T: KeyScalar>(&mut self, keys: &[T]) {
        for &key in keys {
            self.observe(key);
        }
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.set_counts.len() as u32
    }

    #[must_use]
    pub fn set_probability(&self, bit: u32) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.set_counts
            .get(bit as usize)
            .map_or(0.0, |&count| count as f64 / self.samples as f64)
    }

    #[must_use]
    pub fn probabilities(&self) -> Vec<f64> {
        (0..self.width())
            .map(|bit| self.set_probability(bit))
            .collect()
    }

    /// Highest bit position ever observed set.
    #[must_use]
    pub fn highest_set_bit(&self) -> Option<u32> {
        self.set_counts
            .iter()
            .rposition(|&count| count > 0)
            .map(|bit| bit as u32)
    }

    /// Sum of per-bit Shannon entropies. Matches [`effective_bits`] when the
    /// bits are independent with the expected survival probability.
    #[must_use]
    pub fn empirical_effective_bits(&self) -> f64 {
        self.probabilities().into_iter().map(binary_entropy).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BitFrequencies, binary_entropy, bit_survival_probability, chi_square_statistic,
        effective_bits,
    };
    use crate::{DeterministicRng, KeyGenerator};

    #[test]
    fn effective_bits_reproduce_calibration_table() {
        let table = [(-1, 0.0), (0, 32.0), (1, 25.95), (2, 17.41), (3, 10.78), (4, 6.42)];
        for (entropy_reduction, expected) in table {
            let actual = effective_bits(entropy_reduction, 32);
            assert!(
                (actual - expected).abs() < 0.03,
                "k={entropy_reduction} actual={actual} expected={expected}"
            );
        }
    }

    #[test]
    fn effective_bits_strictly_decrease_with_entropy_reduction() {
        let mut previous = effective_bits(-1, 64);
        assert_eq!(previous, 0.0);
        previous = f64::INFINITY;
        for entropy_reduction in 0..12 {
            let current = effective_bits(entropy_reduction, 64);
            assert!(current < previous, "k={entropy_reduction}");
            previous = current;
        }
    }

    #[test]
    fn entropy_helpers_handle_degenerate_probabilities() {
        assert_eq!(bit_survival_probability(-1), 0.0);
        assert_eq!(bit_survival_probability(0), 0.5);
        assert_eq!(binary_entropy(0.0), 0.0);
        assert_eq!(binary_entropy(1.0), 0.0);
        assert_eq!(binary_entropy(f64::NAN), 0.0);
        assert!((binary_entropy(0.5) - 1.0).abs() < 1e-12);
        assert_eq!(bit_survival_probability(i32::MAX), 0.0);
    }

    #[test]
    fn chi_square_is_zero_for_perfectly_uniform_counts() {
        assert_eq!(chi_square_statistic(&[10, 10, 10, 10]), 0.0);
        assert_eq!(chi_square_statistic(&[]), 0.0);
        assert!((chi_square_statistic(&[20, 0]) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn frequencies_track_truncation_and_width() {
        let mut frequencies = BitFrequencies::for_key::<u16>();
        frequencies.observe_all(&[0b0000_0101_u16, 0b0000_0001]);
        assert_eq!(frequencies.width(), 16);
        assert_eq!(frequencies.samples(), 2);
        assert_eq!(frequencies.set_probability(0), 1.0);
        assert_eq!(frequencies.set_probability(2), 0.5);
        assert_eq!(frequencies.set_probability(99), 0.0);
        assert_eq!(frequencies.highest_set_bit(), Some(2));
        assert_eq!(BitFrequencies::new(8).highest_set_bit(), None);
    }

    #[test]
    fn empirical_effective_bits_follow_expected_curve() {
        let mut rng = DeterministicRng::new(31);
        let mut previous = f64::INFINITY;
        for entropy_reduction in 0..=4 {
            let generator = KeyGenerator::<u32>::new(entropy_reduction, 32).expect("generator");
            let keys = generator.fill(&mut rng, 16_384).expect("keys");
            let mut frequencies = BitFrequencies::for_key::<u32>();
            frequencies.observe_all(&keys);
            let observed = frequencies.empirical_effective_bits();
            let expected = generator.expected_effective_bits();
            assert!(
                (observed - expected).abs() < 0.5,
                "k={entropy_reduction} observed={observed} expected={expected}"
            );
            assert!(observed < previous);
            previous = observed;
        }
    }
}
