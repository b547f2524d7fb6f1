use crate::kernels::radix_sort;
use fkey_random::{DeterministicRng, KeyGenerator};
use fkey_validate::compare_results;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const BENCHMARK_KEYS: usize = 1 << 16;
const BENCHMARK_RUNS: usize = 20;
const BENCHMARK_SEED: u64 = 0x5EED_BE4C;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkWorkload {
    pub name: String,
    pub runs: usize,
    pub samples_ms: Vec<f64>,
    pub percentiles: PercentileSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkBaseline {
    pub schema_version: u8,
    pub generated_at_unix_ms: u128,
    pub git_commit: String,
    pub key_count: usize,
    pub workloads: Vec<BenchmarkWorkload>,
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn git_commit_short(repo_root: &Path) -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .current_dir(repo_root)
        .output();

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => "unknown".to_string(),
    }
}

fn percentile_index(len: usize, percentile_num: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    (last * percentile_num + 50) / 100
}

fn summarize_samples(samples: &[f64]) -> PercentileSummary {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let at = |percentile| {
        sorted
            .get(percentile_index(sorted.len(), percentile))
            .copied()
            .unwrap_or(0.0)
    };

    PercentileSummary {
        p50_ms: at(50),
        p95_ms: at(95),
        p99_ms: at(99),
        min_ms: sorted.first().copied().unwrap_or(0.0),
        max_ms: sorted.last().copied().unwrap_or(0.0),
    }
}

fn time_workload<F>(name: &str, runs: usize, mut run_fn: F) -> Result<BenchmarkWorkload, String>
where
    F: FnMut() -> Result<(), String>,
{
    let mut samples_ms = Vec::with_capacity(runs);

    for _ in 0..runs {
        let start = Instant::now();
        run_fn()?;
        samples_ms.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    let percentiles = summarize_samples(&samples_ms);

    Ok(BenchmarkWorkload {
        name: name.to_string(),
        runs,
        samples_ms,
        percentiles,
    })
}

fn keygen_workload(entropy_reduction: i32, key_count: usize) -> Result<BenchmarkWorkload, String> {
    let generator = KeyGenerator::<u32>::new(entropy_reduction, 32)
        .map_err(|err| format!("benchmark generator k={entropy_reduction}: {err}"))?;
    let mut rng = DeterministicRng::new(BENCHMARK_SEED);
    let name = format!("keygen_u32_entropy_reduction_{entropy_reduction}_{key_count}");
    time_workload(&name, BENCHMARK_RUNS, || {
        let keys = generator
            .fill(&mut rng, key_count)
            .map_err(|err| format!("keygen failed: {err}"))?;
        std::hint::black_box(keys.first().copied());
        Ok(())
    })
}

pub fn generate_benchmark_baseline(
    repo_root: &Path,
    output_path: &Path,
) -> Result<BenchmarkBaseline, String> {
    run_benchmark_baseline(repo_root, output_path, BENCHMARK_KEYS)
}

fn run_benchmark_baseline(
    repo_root: &Path,
    output_path: &Path,
    key_count: usize,
) -> Result<BenchmarkBaseline, String> {
    let mut workloads = Vec::new();
    for entropy_reduction in [0, 2, 4] {
        workloads.push(keygen_workload(entropy_reduction, key_count)?);
    }

    let mut rng = DeterministicRng::new(BENCHMARK_SEED);
    let keys = KeyGenerator::<u64>::full_width()
        .fill(&mut rng, key_count)
        .map_err(|err| format!("benchmark dataset init failed: {err}"))?;
    let mirror = keys.clone();

    workloads.push(time_workload(
        &format!("compare_results_equal_u64_{key_count}"),
        BENCHMARK_RUNS,
        || {
            compare_results(&keys, &mirror, true)
                .map_err(|err| format!("equal datasets compared unequal: {err}"))
        },
    )?);

    workloads.push(time_workload(
        &format!("radix_sort_u64_{key_count}"),
        BENCHMARK_RUNS,
        || {
            let sorted = radix_sort(&keys);
            std::hint::black_box(sorted.first().copied());
            Ok(())
        },
    )?);

    let baseline = BenchmarkBaseline {
        schema_version: 1,
        generated_at_unix_ms: now_unix_ms(),
        git_commit: git_commit_short(repo_root),
        key_count,
        workloads,
    };

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let raw = serde_json::to_string_pretty(&baseline)
        .map_err(|err| format!("failed serializing baseline: {err}"))?;
    fs::write(output_path, raw)
        .map_err(|err| format!("failed writing {}: {err}", output_path.display()))?;

    Ok(baseline)
}
