use crate::{KeyGenParams, dataset_fingerprint};
use fkey_dtype::{KeyDType, KeyScalar};
use fkey_random::{DeterministicRng, KeyGenerator};
use fkey_validate::{ValidationError, compare_results, render_verdict};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Instant;

const RADIX_BITS: u32 = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;

/// Comparison-sort oracle.
#[must_use]
pub fn reference_sort<T: KeyScalar>(keys: &[T]) -> Vec<T> {
    let mut sorted = keys.to_vec();
    sorted.sort_by(|lhs, rhs| lhs.partial_cmp(rhs).unwrap_or(Ordering::Equal));
    sorted
}

/// Stable LSD radix sort over [`KeyScalar::ordered_bits`], one byte per pass.
#[must_use]
pub fn radix_sort<T: KeyScalar>(keys: &[T]) -> Vec<T> {
    let mut current = keys.to_vec();
    let mut scratch = Vec::with_capacity(keys.len());

    for pass in 0..T::DTYPE.item_size() as u32 {
        let shift = pass * RADIX_BITS;
        let digit = |key: &T| ((key.ordered_bits() >> shift) as usize) & (RADIX_BUCKETS - 1);

        let mut offsets = [0_usize; RADIX_BUCKETS];
        for key in &current {
            offsets[digit(key)] += 1;
        }
        if offsets.iter().any(|&count| count == current.len()) {
            continue;
        }
        let mut running = 0;
        for slot in &mut offsets {
            let count = *slot;
            *slot = running;
            running += count;
        }

        scratch.clear();
        scratch.resize(current.len(), T::zero());
        for key in &current {
            let bucket = digit(key);
            scratch[offsets[bucket]] = *key;
            offsets[bucket] += 1;
        }
        std::mem::swap(&mut current, &mut scratch);
    }

    current
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortValidationOutcome {
    pub dtype: String,
    pub len: usize,
    pub seed: u64,
    pub entropy_reduction: i32,
    pub lower_bits: u32,
    pub dataset_sha256: String,
    pub distinct_keys: usize,
    pub generate_ms: f64,
    pub reference_ms: f64,
    pub candidate_ms: f64,
    pub passed: bool,
    pub reason_code: String,
    pub verdict: String,
}

/// Generates a dataset from `params`, sorts it with both kernels and compares.
///
/// `fault_index` corrupts one element of the candidate output, which is how
/// the diagnostics path is exercised end to end.
pub fn run_sort_validation(
    params: &KeyGenParams,
    fault_index: Option<usize>,
) -> Result<SortValidationOutcome, String> {
    match params.dtype {
        KeyDType::I8 => validate_sort_kernel::<i8>(params, fault_index),
        KeyDType::I16 => validate_sort_kernel::<i16>(params, fault_index),
        KeyDType::I32 => validate_sort_kernel::<i32>(params, fault_index),
        KeyDType::I64 => validate_sort_kernel::<i64>(params, fault_index),
        KeyDType::U8 => validate_sort_kernel::<u8>(params, fault_index),
        KeyDType::U16 => validate_sort_kernel::<u16>(params, fault_index),
        KeyDType::U32 => validate_sort_kernel::<u32>(params, fault_index),
        KeyDType::U64 => validate_sort_kernel::<u64>(params, fault_index),
        KeyDType::F32 => validate_sort_kernel::<f32>(params, fault_index),
        KeyDType::F64 => validate_sort_kernel::<f64>(params, fault_index),
    }
}

fn validate_sort_kernel<T: KeyScalar>(
    params: &KeyGenParams,
    fault_index: Option<usize>,
) -> Result<SortValidationOutcome, String> {
    let lower_bits = params.resolved_lower_bits();
    let generator = KeyGenerator::<T>::new(params.entropy_reduction, lower_bits)
        .map_err(|err| format!("{}: {err}", err.reason_code()))?;
    let mut rng = DeterministicRng::new(params.seed);

    let start = Instant::now();
    let keys = generator
        .fill(&mut rng, params.len)
        .map_err(|err| format!("{}: {err}", err.reason_code()))?;
    let generate_ms = elapsed_ms(start);

    let start = Instant::now();
    let reference = reference_sort(&keys);
    let reference_ms = elapsed_ms(start);

    let start = Instant::now();
    let mut computed = radix_sort(&keys);
    let candidate_ms = elapsed_ms(start);

    if let Some(index) = fault_index {
        let slot = computed
            .get_mut(index)
            .ok_or_else(|| format!("fault index {index} out of range for {} keys", keys.len()))?;
        *slot = T::from_bits(slot.to_bits() ^ 1);
    }

    let outcome = compare_results(&computed, &reference, params.verbose);
    Ok(SortValidationOutcome {
        dtype: T::DTYPE.name().to_string(),
        len: keys.len(),
        seed: params.seed,
        entropy_reduction: params.entropy_reduction,
        lower_bits,
        dataset_sha256: dataset_fingerprint(&keys),
        distinct_keys: count_distinct(&reference),
        generate_ms,
        reference_ms,
        candidate_ms,
        passed: outcome.is_ok(),
        reason_code: outcome
            .as_ref()
            .err()
            .map_or("validate_ok", ValidationError::reason_code)
            .to_string(),
        verdict: render_verdict(&outcome),
    })
}

fn count_distinct<T: KeyScalar>(sorted: &[T]) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    1 + sorted
        .windows(2)
        .filter(|pair| !pair[0].key_eq(pair[1]))
        .count()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
