#![forbid(unsafe_code)]

pub mod args;
pub mod benchmark;
pub mod kernels;

use crate::args::CommandLineArgs;
use fkey_dtype::{KeyDType, KeyScalar};
use fkey_random::{
    BitFrequencies, DEFAULT_RNG_SEED, DeterministicRng, KeyGenerator, bit_survival_probability,
    effective_bits,
};
use fkey_validate::{ValidationError, compare_results};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

static KEY_VALIDATION_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub const DEFAULT_DATASET_LEN: usize = 1 << 16;

/// Flags understood by [`HarnessConfig::from_args`].
pub const HARNESS_ARG_KEYS: [&str; 10] = [
    "dtype",
    "entropy_reduction",
    "lower_bits",
    "len",
    "seed",
    "verbose",
    "v",
    "device",
    "fixture_root",
    "report_root",
];

/// Generation and comparison parameters supplied by the config source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenParams {
    pub dtype: KeyDType,
    pub entropy_reduction: i32,
    /// `None` keeps every bit of the key.
    pub lower_bits: Option<u32>,
    pub len: usize,
    pub seed: u64,
    pub verbose: bool,
    /// Target device ordinal, carried through untouched.
    pub device: Option<i64>,
}

impl Default for KeyGenParams {
    fn default() -> Self {
        Self {
            dtype: KeyDType::U32,
            entropy_reduction: 0,
            lower_bits: None,
            len: DEFAULT_DATASET_LEN,
            seed: DEFAULT_RNG_SEED,
            verbose: false,
            device: None,
        }
    }
}

impl KeyGenParams {
    pub fn from_args(args: &CommandLineArgs) -> Result<Self, String> {
        let mut params = Self::default();
        if let Some(raw) = args.get_str("dtype") {
            params.dtype =
                KeyDType::parse(raw).ok_or_else(|| format!("--dtype={raw}: unsupported dtype"))?;
        }
        if let Some(value) = args.get_i64("entropy_reduction")? {
            params.entropy_reduction = i32::try_from(value)
                .map_err(|_| format!("--entropy_reduction={value}: out of range"))?;
        }
        if let Some(value) = args.get_u64("lower_bits")? {
            params.lower_bits = Some(
                u32::try_from(value).map_err(|_| format!("--lower_bits={value}: out of range"))?,
            );
        }
        if let Some(value) = args.get_u64("len")? {
            params.len =
                usize::try_from(value).map_err(|_| format!("--len={value}: out of range"))?;
        }
        if let Some(value) = args.get_u64("seed")? {
            params.seed = value;
        }
        params.verbose = args.check_flag("verbose") || args.check_flag("v");
        params.device = args.get_i64("device")?;
        Ok(params)
    }

    #[must_use]
    pub fn resolved_lower_bits(&self) -> u32 {
        self.lower_bits.unwrap_or(self.dtype.bit_width())
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub report_root: PathBuf,
    pub params: KeyGenParams,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            fixture_root: crate_root.join("fixtures"),
            report_root: crate_root.join("../../artifacts/reports"),
            params: KeyGenParams::default(),
        }
    }

    pub fn from_args(args: &CommandLineArgs) -> Result<Self, String> {
        let mut config = Self::default_paths();
        if let Some(root) = args.get_str("fixture_root") {
            config.fixture_root = PathBuf::from(root);
        }
        if let Some(root) = args.get_str("report_root") {
            config.report_root = PathBuf::from(root);
        }
        config.params = KeyGenParams::from_args(args)?;
        Ok(config)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessReport {
    pub suite: &'static str,
    pub fixture_count: usize,
    pub dtype: &'static str,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub suite: &'static str,
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(suite: &'static str) -> Self {
        Self {
            suite,
            case_count: 0,
            pass_count: 0,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }
}

/// One JSON line of key-validation evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValidationLogEntry {
    pub fixture_id: String,
    pub suite: String,
    pub seed: u64,
    pub dtype: String,
    pub entropy_reduction: i32,
    pub lower_bits: u32,
    pub dataset_sha256: String,
    pub reason_code: String,
    pub passed: bool,
}

#[derive(Debug, Deserialize)]
struct KeyGenFixtureCase {
    id: String,
    dtype: String,
    entropy_reduction: i32,
    #[serde(default)]
    lower_bits: Option<u32>,
    #[serde(default)]
    seed: u64,
    #[serde(default = "default_sample_count")]
    samples: usize,
    #[serde(default)]
    expected_reason_code: String,
    #[serde(default)]
    bit_probability_tolerance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CompareFixtureCase {
    id: String,
    dtype: String,
    computed: Vec<f64>,
    reference: Vec<f64>,
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    expected_reason_code: String,
    #[serde(default)]
    expected_index: Option<usize>,
    #[serde(default)]
    expected_window: Option<[usize; 2]>,
    #[serde(default)]
    expected_rendering: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct KeySuiteError {
    reason_code: String,
    message: String,
}

impl KeySuiteError {
    fn new(reason_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason_code: reason_code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for KeySuiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for KeySuiteError {}

fn default_sample_count() -> usize {
    4096
}

pub fn set_key_validation_log_path(path: Option<PathBuf>) {
    let cell = KEY_VALIDATION_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

/// SHA-256 over the little-endian key bytes, hex encoded.
#[must_use]
pub fn dataset_fingerprint<T: KeyScalar>(keys: &[T]) -> String {
    let size = T::DTYPE.item_size();
    let mut hasher = Sha256::new();
    for key in keys {
        hasher.update(&key.to_bits().to_le_bytes()[..size]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[must_use]
pub fn run_smoke(config: &HarnessConfig) -> HarnessReport {
    let fixture_count = fs::read_dir(&config.fixture_root)
        .ok()
        .into_iter()
        .flat_map(|it| it.filter_map(Result::ok))
        .count();

    HarnessReport {
        suite: "smoke",
        fixture_count,
        dtype: config.params.dtype.name(),
        seed: config.params.seed,
    }
}

fn load_keygen_cases(fixture_root: &Path) -> Result<Vec<KeyGenFixtureCase>, String> {
    let path = fixture_root.join("keygen_cases.json");
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid json: {err}"))
}

fn load_compare_cases(fixture_root: &Path) -> Result<Vec<CompareFixtureCase>, String> {
    let path = fixture_root.join("compare_cases.json");
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid json: {err}"))
}

fn parse_case_dtype(case_id: &str, raw: &str) -> Result<KeyDType, KeySuiteError> {
    KeyDType::parse(raw).ok_or_else(|| {
        KeySuiteError::new(
            "fixture_dtype_unsupported",
            format!("{case_id}: unsupported dtype {raw}"),
        )
    })
}

pub fn run_keygen_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases = load_keygen_cases(&config.fixture_root)?;
    let mut report = SuiteReport::new("keygen");

    for case in cases {
        let outcome = parse_case_dtype(&case.id, &case.dtype).and_then(|dtype| match dtype {
            KeyDType::I8 => execute_keygen_case::<i8>(&case),
            KeyDType::I16 => execute_keygen_case::<i16>(&case),
            KeyDType::I32 => execute_keygen_case::<i32>(&case),
            KeyDType::I64 => execute_keygen_case::<i64>(&case),
            KeyDType::U8 => execute_keygen_case::<u8>(&case),
            KeyDType::U16 => execute_keygen_case::<u16>(&case),
            KeyDType::U32 => execute_keygen_case::<u32>(&case),
            KeyDType::U64 => execute_keygen_case::<u64>(&case),
            KeyDType::F32 => execute_keygen_case::<f32>(&case),
            KeyDType::F64 => execute_keygen_case::<f64>(&case),
        });

        let (passed, reason_code, dataset_sha256, failure) = match outcome {
            Ok((reason_code, sha)) => (true, reason_code.to_string(), sha, String::new()),
            Err(err) => (
                false,
                err.reason_code.clone(),
                String::new(),
                format!(
                    "{}: seed={} reason_code={} {}",
                    case.id, case.seed, err.reason_code, err.message
                ),
            ),
        };
        record_suite_check(&mut report, passed, failure);

        maybe_append_key_validation_log(&KeyValidationLogEntry {
            fixture_id: case.id.clone(),
            suite: report.suite.to_string(),
            seed: case.seed,
            dtype: case.dtype.clone(),
            entropy_reduction: case.entropy_reduction,
            lower_bits: KeyDType::parse(&case.dtype)
                .map_or(0, |dtype| case.lower_bits.unwrap_or(dtype.bit_width())),
            dataset_sha256,
            reason_code,
            passed,
        })?;
    }

    Ok(report)
}

/// Runs one generation fixture; on success returns the observed reason code
/// and the dataset fingerprint. A case that expects a construction error
/// reports that error's code and no fingerprint.
fn execute_keygen_case<T: KeyScalar>(
    case: &KeyGenFixtureCase,
) -> Result<(&'static str, String), KeySuiteError> {
    let lower_bits = case.lower_bits.unwrap_or(T::BITS);
    let expected_error = case.expected_reason_code.trim();

    let generator = match KeyGenerator::<T>::new(case.entropy_reduction, lower_bits) {
        Ok(generator) => generator,
        Err(err) if err.reason_code() == expected_error => {
            return Ok((err.reason_code(), String::new()));
        }
        Err(err) => {
            return Err(KeySuiteError::new(
                err.reason_code(),
                format!("{}: unexpected construction error: {err}", case.id),
            ));
        }
    };
    if !expected_error.is_empty() {
        return Err(KeySuiteError::new(
            "keygen_expected_error_missing",
            format!("{}: expected {expected_error}, generator was built", case.id),
        ));
    }

    let fill = |seed: u64| {
        let mut rng = DeterministicRng::new(seed);
        generator
            .fill(&mut rng, case.samples)
            .map_err(|err| KeySuiteError::new(err.reason_code(), format!("{}: {err}", case.id)))
    };
    let keys = fill(case.seed)?;
    let fingerprint = dataset_fingerprint(&keys);
    if dataset_fingerprint(&fill(case.seed)?) != fingerprint {
        return Err(KeySuiteError::new(
            "keygen_seed_determinism_violation",
            format!("{}: same seed produced different datasets", case.id),
        ));
    }

    if let Some(position) = keys.iter().position(|key| key.is_nan()) {
        return Err(KeySuiteError::new(
            "keygen_nan_emitted",
            format!("{}: NaN key at index {position}", case.id),
        ));
    }

    let mut frequencies = BitFrequencies::for_key::<T>();
    frequencies.observe_all(&keys);
    if let Some(bit) = frequencies.highest_set_bit() {
        if bit >= lower_bits {
            return Err(KeySuiteError::new(
                "keygen_truncation_violation",
                format!("{}: bit {bit} set with lower_bits={lower_bits}", case.id),
            ));
        }
    }

    if case.entropy_reduction == -1 && keys.iter().any(|key| key.to_bits() != 0) {
        return Err(KeySuiteError::new(
            "keygen_degenerate_nonzero",
            format!("{}: entropy_reduction=-1 produced a nonzero key", case.id),
        ));
    }

    if let Some(tolerance) = case.bit_probability_tolerance {
        let expected = bit_survival_probability(case.entropy_reduction);
        for bit in 0..lower_bits {
            let observed = frequencies.set_probability(bit);
            if (observed - expected).abs() > tolerance {
                return Err(KeySuiteError::new(
                    "keygen_bit_probability_drift",
                    format!(
                        "{}: bit {bit} observed={observed:.4} expected={expected:.4} tolerance={tolerance}",
                        case.id
                    ),
                ));
            }
        }
    }

    Ok(("keygen_ok", fingerprint))
}

pub fn run_compare_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    let cases = load_compare_cases(&config.fixture_root)?;
    let mut report = SuiteReport::new("compare");

    for case in cases {
        let outcome = parse_case_dtype(&case.id, &case.dtype).and_then(|dtype| match dtype {
            KeyDType::I8 => execute_compare_case::<i8>(&case),
            KeyDType::I16 => execute_compare_case::<i16>(&case),
            KeyDType::I32 => execute_compare_case::<i32>(&case),
            KeyDType::I64 => execute_compare_case::<i64>(&case),
            KeyDType::U8 => execute_compare_case::<u8>(&case),
            KeyDType::U16 => execute_compare_case::<u16>(&case),
            KeyDType::U32 => execute_compare_case::<u32>(&case),
            KeyDType::U64 => execute_compare_case::<u64>(&case),
            KeyDType::F32 => execute_compare_case::<f32>(&case),
            KeyDType::F64 => execute_compare_case::<f64>(&case),
        });

        let (passed, reason_code, failure) = match outcome {
            Ok(reason_code) => (true, reason_code, String::new()),
            Err(err) => (
                false,
                err.reason_code.clone(),
                format!("{}: reason_code={} {}", case.id, err.reason_code, err.message),
            ),
        };
        record_suite_check(&mut report, passed, failure);

        maybe_append_key_validation_log(&KeyValidationLogEntry {
            fixture_id: case.id.clone(),
            suite: report.suite.to_string(),
            seed: 0,
            dtype: case.dtype.clone(),
            entropy_reduction: 0,
            lower_bits: 0,
            dataset_sha256: String::new(),
            reason_code,
            passed,
        })?;
    }

    Ok(report)
}

/// Runs one comparison fixture; on success returns the observed reason code.
fn execute_compare_case<T: KeyScalar>(case: &CompareFixtureCase) -> Result<String, KeySuiteError> {
    let computed: Vec<T> = case.computed.iter().map(|&value| T::from_f64(value)).collect();
    let reference: Vec<T> = case.reference.iter().map(|&value| T::from_f64(value)).collect();
    let outcome = compare_results(&computed, &reference, case.verbose);

    let actual_reason_code = outcome
        .as_ref()
        .err()
        .map_or("validate_ok", ValidationError::reason_code);
    let expected_reason_code = if case.expected_reason_code.trim().is_empty() {
        "validate_ok"
    } else {
        case.expected_reason_code.trim()
    };
    if actual_reason_code != expected_reason_code {
        return Err(KeySuiteError::new(
            actual_reason_code,
            format!(
                "{}: expected {expected_reason_code}, got {actual_reason_code}",
                case.id
            ),
        ));
    }

    let report = outcome.as_ref().err().and_then(ValidationError::mismatch);
    if let Some(expected_index) = case.expected_index {
        let actual_index = report.map(|report| report.index);
        if actual_index != Some(expected_index) {
            return Err(KeySuiteError::new(
                "compare_index_drift",
                format!(
                    "{}: expected mismatch index {expected_index}, got {actual_index:?}",
                    case.id
                ),
            ));
        }
    }

    if let Some([start, end]) = case.expected_window {
        let actual = report
            .and_then(|report| report.window.as_ref())
            .map(|window| [window.start, window.end]);
        if actual != Some([start, end]) {
            return Err(KeySuiteError::new(
                "compare_window_drift",
                format!(
                    "{}: expected window [{start}, {end}], got {actual:?}",
                    case.id
                ),
            ));
        }
    }

    if let Some(expected_rendering) = &case.expected_rendering {
        let rendered = fkey_validate::render_verdict(&outcome);
        if &rendered != expected_rendering {
            return Err(KeySuiteError::new(
                "compare_rendering_drift",
                format!("{}: rendered {rendered:?}", case.id),
            ));
        }
    }

    Ok(actual_reason_code.to_string())
}

/// Checks measured effective bits against the calibration curve for each
/// entropy level from -1 to 4.
pub fn run_entropy_calibration_suite(config: &HarnessConfig) -> Result<SuiteReport, String> {
    const SAMPLES: usize = 16_384;
    const TOLERANCE_BITS: f64 = 0.5;

    let mut report = SuiteReport::new("entropy_calibration");
    let mut previous = f64::INFINITY;

    for entropy_reduction in -1..=4 {
        let generator = KeyGenerator::<u32>::new(entropy_reduction, 32)
            .map_err(|err| format!("calibration generator k={entropy_reduction}: {err}"))?;
        let mut rng = DeterministicRng::new(config.params.seed)
            .fork(u64::try_from(entropy_reduction + 2).unwrap_or_default());
        let keys = generator
            .fill(&mut rng, SAMPLES)
            .map_err(|err| format!("calibration fill k={entropy_reduction}: {err}"))?;

        let mut frequencies = BitFrequencies::for_key::<u32>();
        frequencies.observe_all(&keys);
        let observed = frequencies.empirical_effective_bits();
        let expected = effective_bits(entropy_reduction, 32);

        let within_tolerance = (observed - expected).abs() <= TOLERANCE_BITS;
        let decreasing = entropy_reduction < 0 || observed < previous;
        if entropy_reduction >= 0 {
            previous = observed;
        }
        let passed = within_tolerance && decreasing;
        record_suite_check(
            &mut report,
            passed,
            format!(
                "entropy_reduction={entropy_reduction}: observed={observed:.3} expected={expected:.3} decreasing={decreasing}"
            ),
        );

        maybe_append_key_validation_log(&KeyValidationLogEntry {
            fixture_id: format!("entropy_calibration_k{entropy_reduction}"),
            suite: report.suite.to_string(),
            seed: config.params.seed,
            dtype: KeyDType::U32.name().to_string(),
            entropy_reduction,
            lower_bits: 32,
            dataset_sha256: dataset_fingerprint(&keys),
            reason_code: if passed {
                "entropy_calibration_ok".to_string()
            } else {
                "entropy_calibration_drift".to_string()
            },
            passed,
        })?;
    }

    Ok(report)
}

pub fn run_all_core_suites(config: &HarnessConfig) -> Result<Vec<SuiteReport>, String> {
    Ok(vec![
        run_keygen_suite(config)?,
        run_compare_suite(config)?,
        run_entropy_calibration_suite(config)?,
    ])
}

pub fn write_suite_reports(report_root: &Path, suites: &[SuiteReport]) -> Result<PathBuf, String> {
    fs::create_dir_all(report_root)
        .map_err(|err| format!("failed creating {}: {err}", report_root.display()))?;
    let path = report_root.join("conformance_report.json");
    let payload = serde_json::to_string_pretty(suites)
        .map_err(|err| format!("failed serializing suite reports: {err}"))?;
    fs::write(&path, payload.as_bytes())
        .map_err(|err| format!("failed writing {}: {err}", path.display()))?;
    Ok(path)
}

fn record_suite_check(report: &mut SuiteReport, passed: bool, failure: String) {
    report.case_count += 1;
    if passed {
        report.pass_count += 1;
    } else {
        report.failures.push(failure);
    }
}

fn maybe_append_key_validation_log(entry: &KeyValidationLogEntry) -> Result<(), String> {
    let configured = KEY_VALIDATION_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("FKEY_VALIDATION_LOG_PATH").map(PathBuf::from);
    let Some(path) = configured.or(from_env) else {
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| format!("failed serializing key validation log entry: {err}"))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload).map_err(|err| {
        format!(
            "failed appending key validation log {}: {err}",
            path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CompareFixtureCase, HARNESS_ARG_KEYS, HarnessConfig, KeyGenFixtureCase, KeyGenParams,
        KeyValidationLogEntry, SuiteReport, dataset_fingerprint, execute_compare_case,
        execute_keygen_case, record_suite_check, run_keygen_suite, set_key_validation_log_path,
    };
    use crate::args::CommandLineArgs;
    use fkey_dtype::KeyDType;
    use proptest::prelude::*;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("fkey_{name}_{ts}"))
    }

    fn keygen_case(dtype: &str, entropy_reduction: i32, lower_bits: Option<u32>) -> KeyGenFixtureCase {
        KeyGenFixtureCase {
            id: format!("{dtype}_k{entropy_reduction}"),
            dtype: dtype.to_string(),
            entropy_reduction,
            lower_bits,
            seed: 7,
            samples: 1024,
            expected_reason_code: String::new(),
            bit_probability_tolerance: None,
        }
    }

    #[test]
    fn params_read_from_command_line_pairs() {
        let args = CommandLineArgs::parse([
            "--dtype=f64",
            "--entropy_reduction=3",
            "--lower_bits=20",
            "--len=100",
            "--seed=5",
            "--device=1",
            "--v",
        ]);
        assert_eq!(args.reject_unknown(&HARNESS_ARG_KEYS), Ok(()));
        let params = KeyGenParams::from_args(&args).expect("params");
        assert_eq!(params.dtype, KeyDType::F64);
        assert_eq!(params.entropy_reduction, 3);
        assert_eq!(params.resolved_lower_bits(), 20);
        assert_eq!(params.len, 100);
        assert_eq!(params.seed, 5);
        assert_eq!(params.device, Some(1));
        assert!(params.verbose);

        let defaults = KeyGenParams::from_args(&CommandLineArgs::default()).expect("defaults");
        assert_eq!(defaults, KeyGenParams::default());
        assert_eq!(defaults.resolved_lower_bits(), 32);
    }

    #[test]
    fn params_reject_bad_values() {
        let err = KeyGenParams::from_args(&CommandLineArgs::parse(["--dtype=complex64"]))
            .expect_err("bad dtype");
        assert!(err.contains("unsupported dtype"));
        let err = KeyGenParams::from_args(&CommandLineArgs::parse(["--entropy_reduction=x"]))
            .expect_err("bad entropy");
        assert!(err.contains("--entropy_reduction=x"));
    }

    #[test]
    fn harness_config_overrides_roots() {
        let args = CommandLineArgs::parse(["--fixture_root=/tmp/fx", "--report_root=/tmp/rp"]);
        let config = HarnessConfig::from_args(&args).expect("config");
        assert_eq!(config.fixture_root.to_str(), Some("/tmp/fx"));
        assert_eq!(config.report_root.to_str(), Some("/tmp/rp"));
    }

    #[test]
    fn fingerprint_depends_on_key_bytes_only() {
        let lhs = dataset_fingerprint(&[1_u32, 2, 3]);
        assert_eq!(lhs.len(), 64);
        assert_eq!(lhs, dataset_fingerprint(&[1_u32, 2, 3]));
        assert_ne!(lhs, dataset_fingerprint(&[1_u32, 3, 2]));
        assert_eq!(
            dataset_fingerprint::<u8>(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn keygen_case_checks_hold_for_valid_parameters() {
        let (reason_code, sha) =
            execute_keygen_case::<u64>(&keygen_case("u64", 2, Some(40))).expect("case");
        assert_eq!(reason_code, "keygen_ok");
        assert_eq!(sha.len(), 64);
        execute_keygen_case::<f32>(&keygen_case("f32", 0, None)).expect("float case");
        execute_keygen_case::<i16>(&keygen_case("i16", -1, None)).expect("degenerate case");
    }

    #[test]
    fn keygen_case_matches_expected_construction_errors() {
        let mut case = keygen_case("u8", 0, Some(9));
        case.expected_reason_code = "keygen_lower_bits_out_of_range".to_string();
        assert_eq!(
            execute_keygen_case::<u8>(&case),
            Ok(("keygen_lower_bits_out_of_range", String::new()))
        );

        case.expected_reason_code.clear();
        let err = execute_keygen_case::<u8>(&case).expect_err("unexpected error");
        assert_eq!(err.reason_code, "keygen_lower_bits_out_of_range");

        let mut case = keygen_case("u32", 0, None);
        case.expected_reason_code = "keygen_entropy_reduction_out_of_range".to_string();
        let err = execute_keygen_case::<u32>(&case).expect_err("missing error");
        assert_eq!(err.reason_code, "keygen_expected_error_missing");
    }

    #[test]
    fn keygen_suite_logs_matched_construction_error_codes() {
        let fixture_root = temp_path("keygen_fixtures");
        fs::create_dir_all(&fixture_root).expect("fixture dir");
        fs::write(
            fixture_root.join("keygen_cases.json"),
            r#"[
                {"id": "reject_wide", "dtype": "u16", "entropy_reduction": 0, "lower_bits": 17,
                 "expected_reason_code": "keygen_lower_bits_out_of_range"},
                {"id": "generate_u32", "dtype": "u32", "entropy_reduction": 1, "seed": 4,
                 "samples": 256}
            ]"#,
        )
        .expect("fixture written");
        let log_path = fixture_root.join("key_validation.jsonl");
        let config = HarnessConfig {
            fixture_root: fixture_root.clone(),
            ..HarnessConfig::default_paths()
        };

        set_key_validation_log_path(Some(log_path.clone()));
        let report = run_keygen_suite(&config).expect("suite runs");
        set_key_validation_log_path(None);
        assert!(report.all_passed(), "{:?}", report.failures);

        let raw = fs::read_to_string(&log_path).expect("log written");
        let entries: Vec<KeyValidationLogEntry> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("log entry"))
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].reason_code, "keygen_lower_bits_out_of_range");
        assert!(entries[0].dataset_sha256.is_empty());
        assert_eq!(entries[0].lower_bits, 17);
        assert_eq!(entries[1].reason_code, "keygen_ok");
        assert_eq!(entries[1].dataset_sha256.len(), 64);

        let _ = fs::remove_dir_all(fixture_root);
    }

    #[test]
    fn compare_case_reports_drift_in_expectations() {
        let case = CompareFixtureCase {
            id: "drift".to_string(),
            dtype: "i32".to_string(),
            computed: vec![1.0, 2.0, 3.0],
            reference: vec![1.0, 9.0, 3.0],
            verbose: false,
            expected_reason_code: "validate_value_mismatch".to_string(),
            expected_index: Some(2),
            expected_window: None,
            expected_rendering: None,
        };
        let err = execute_compare_case::<i32>(&case).expect_err("index drift");
        assert_eq!(err.reason_code, "compare_index_drift");
    }

    #[test]
    fn suite_report_counts_passes_and_failures() {
        let mut report = SuiteReport::new("unit");
        record_suite_check(&mut report, true, String::new());
        assert!(report.all_passed());
        record_suite_check(&mut report, false, "case: failed".to_string());
        assert_eq!(report.case_count, 2);
        assert_eq!(report.pass_count, 1);
        assert!(!report.all_passed());
    }

    proptest! {
        #[test]
        fn params_roundtrip_through_command_line_pairs(
            entropy_reduction in -1_i32..16,
            lower_bits in 1_u32..=64,
            len in 0_usize..1_000_000,
            seed in any::<u64>(),
            dtype_index in 0_usize..fkey_dtype::ALL_KEY_DTYPES.len(),
        ) {
            let dtype = fkey_dtype::ALL_KEY_DTYPES[dtype_index];
            let argv = [
                format!("--dtype={}", dtype.name()),
                format!("--entropy_reduction={entropy_reduction}"),
                format!("--lower_bits={lower_bits}"),
                format!("--len={len}"),
                format!("--seed={seed}"),
            ];
            let params = KeyGenParams::from_args(&CommandLineArgs::parse(&argv))
                .expect("well-formed pairs");
            prop_assert_eq!(params.dtype, dtype);
            prop_assert_eq!(params.entropy_reduction, entropy_reduction);
            prop_assert_eq!(params.lower_bits, Some(lower_bits));
            prop_assert_eq!(params.len, len);
            prop_assert_eq!(params.seed, seed);
            prop_assert!(!params.verbose);
        }
    }
}
