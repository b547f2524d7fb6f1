#![forbid(unsafe_code)]

use fkey_conformance::args::CommandLineArgs;
use fkey_conformance::kernels::run_sort_validation;
use fkey_conformance::{HARNESS_ARG_KEYS, HarnessConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("run_key_validation failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = CommandLineArgs::from_env();
    if args.check_flag("help") {
        println!(
            "Usage: cargo run -p fkey-conformance --bin run_key_validation -- \
             [--dtype=<name>] [--entropy_reduction=<k>] [--lower_bits=<n>] [--len=<n>] \
             [--seed=<n>] [--device=<n>] [--v] [--inject_fault=<index>] [--json]"
        );
        return Ok(());
    }

    let mut known = HARNESS_ARG_KEYS.to_vec();
    known.extend(["inject_fault", "json"]);
    args.reject_unknown(&known)?;

    let cfg = HarnessConfig::from_args(&args)?;
    let fault_index = args
        .get_u64("inject_fault")?
        .map(|index| {
            usize::try_from(index).map_err(|_| format!("--inject_fault={index}: out of range"))
        })
        .transpose()?;

    let outcome = run_sort_validation(&cfg.params, fault_index)?;

    if args.check_flag("json") {
        let raw = serde_json::to_string_pretty(&outcome)
            .map_err(|err| format!("failed serializing outcome: {err}"))?;
        println!("{raw}");
    } else {
        if let Some(device) = cfg.params.device {
            println!("device: {device}");
        }
        println!(
            "dtype={} len={} seed={} entropy_reduction={} lower_bits={} distinct_keys={}",
            outcome.dtype,
            outcome.len,
            outcome.seed,
            outcome.entropy_reduction,
            outcome.lower_bits,
            outcome.distinct_keys
        );
        println!(
            "generate={:.3}ms reference={:.3}ms candidate={:.3}ms",
            outcome.generate_ms, outcome.reference_ms, outcome.candidate_ms
        );
        println!("{}", outcome.verdict);
    }

    if !outcome.passed {
        std::process::exit(2);
    }
    Ok(())
}
