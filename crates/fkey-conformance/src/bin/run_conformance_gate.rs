#![forbid(unsafe_code)]

use fkey_conformance::args::CommandLineArgs;
use fkey_conformance::{
    HARNESS_ARG_KEYS, HarnessConfig, KeyValidationLogEntry, SuiteReport, run_all_core_suites,
    set_key_validation_log_path, write_suite_reports,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct GateSummary {
    status: &'static str,
    key_validation_log: String,
    report_path: String,
    suites: Vec<SuiteReport>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("run_conformance_gate failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = CommandLineArgs::from_env();
    if args.check_flag("help") {
        println!(
            "Usage: cargo run -p fkey-conformance --bin run_conformance_gate -- \
             [--log-path=<path>] [--fixture_root=<dir>] [--report_root=<dir>] [--seed=<n>]"
        );
        return Ok(());
    }

    let mut known = HARNESS_ARG_KEYS.to_vec();
    known.push("log-path");
    args.reject_unknown(&known)?;

    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    let log_path = args.get_str("log-path").map_or_else(
        || {
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("../../artifacts/logs")
                .join(format!("key_validation_{ts_millis}.jsonl"))
        },
        PathBuf::from,
    );
    set_key_validation_log_path(Some(log_path.clone()));

    let cfg = HarnessConfig::from_args(&args)?;
    let mut suites = run_all_core_suites(&cfg)?;
    suites.push(validate_key_validation_log(&log_path)?);
    let report_path = write_suite_reports(&cfg.report_root, &suites)?;

    let status = if suites.iter().all(SuiteReport::all_passed) {
        "pass"
    } else {
        "fail"
    };

    let summary = GateSummary {
        status,
        key_validation_log: log_path.display().to_string(),
        report_path: report_path.display().to_string(),
        suites,
    };
    let summary_json = serde_json::to_string_pretty(&summary)
        .map_err(|err| format!("failed serializing summary: {err}"))?;
    println!("{summary_json}");

    if status == "fail" {
        std::process::exit(2);
    }
    Ok(())
}

/// Every log line must parse as a full entry with a fingerprint whenever the
/// suite produced a dataset.
fn validate_key_validation_log(path: &Path) -> Result<SuiteReport, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed reading key validation log {}: {err}", path.display()))?;

    let mut report = SuiteReport::new("key_validation_log_contract");
    let mut entry_count = 0usize;
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        entry_count += 1;
        report.case_count += 1;

        let entry: KeyValidationLogEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(err) => {
                report
                    .failures
                    .push(format!("line {} invalid entry: {err}", line_no + 1));
                continue;
            }
        };

        let fingerprint_ok = entry.dataset_sha256.is_empty()
            || (entry.dataset_sha256.len() == 64
                && entry.dataset_sha256.bytes().all(|b| b.is_ascii_hexdigit()));
        if entry.fixture_id.trim().is_empty() || entry.reason_code.trim().is_empty() {
            report.failures.push(format!(
                "line {} missing fixture_id or reason_code",
                line_no + 1
            ));
        } else if !fingerprint_ok {
            report.failures.push(format!(
                "line {} malformed dataset_sha256 {}",
                line_no + 1,
                entry.dataset_sha256
            ));
        } else {
            report.pass_count += 1;
        }
    }

    report.case_count += 1;
    if entry_count == 0 {
        report
            .failures
            .push("key validation log must contain at least one entry".to_string());
    } else {
        report.pass_count += 1;
    }

    Ok(report)
}
