use clap::Parser;
use haversine_core::constants::{DEFAULT_CALIBRATION_WAIT_MS, DEFAULT_VALIDATION_TOLERANCE};
use haversine_core::{aggregate, calibrate, time_cycles, Aggregation, Timed};
use haversine_os_unix::HardwareClock;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Parser, Debug)]
#[command(
    name = "haversine-process",
    version,
    about = "Parse a haversine pair dataset and time the average-distance pass"
)]
struct Args {
    /// Dataset produced by haversine-generate
    input: PathBuf,

    /// Expected average printed by the generator; mismatches exit with status 1
    #[arg(long)]
    expected: Option<f64>,

    /// Relative tolerance for --expected
    #[arg(long, default_value_t = DEFAULT_VALIDATION_TOLERANCE)]
    tolerance: f64,

    /// Busy-wait used to calibrate the cycle counter
    #[arg(long, default_value_t = DEFAULT_CALIBRATION_WAIT_MS)]
    calibration_ms: u64,

    /// Skip cycle counting and calibration
    #[arg(long)]
    no_timing: bool,

    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    input: String,
    pair_count: u64,
    average: f64,
    bytes_read: u64,
    timing: Option<Timing>,
    validation: Option<Validation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Timing {
    cycles: u64,
    cycles_per_second: u64,
    elapsed_seconds: f64,
    throughput_mb_s: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Validation {
    expected: f64,
    relative_error: f64,
    tolerance: f64,
    passed: bool,
}

fn main() {
    let args = parse_args();
    init_logging(args.verbose);

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(err) => {
            eprintln!("Could not open file: {} ({})", args.input.display(), err);
            std::process::exit(1);
        }
    };

    let report = match run(&args, file) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("[!!] {}: {err}", args.input.display());
            std::process::exit(1);
        }
    };

    if args.json {
        let text = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|_| "{\"error\":\"failed to serialize\"}".to_string());
        println!("{text}");
    } else {
        print_report(&report);
    }

    if report.validation.as_ref().is_some_and(|v| !v.passed) {
        std::process::exit(1);
    }
}

fn run(args: &Args, file: File) -> haversine_core::Result<Report> {
    let reader = BufReader::new(file);
    info!(input = %args.input.display(), "processing dataset");

    let (agg, timing) = if args.no_timing {
        (aggregate(reader)?, None)
    } else {
        let clock = HardwareClock::new();
        let Timed {
            value,
            start_cycles,
            end_cycles,
        } = time_cycles(&clock, || aggregate(reader));
        let agg = value?;
        let cps = calibrate(&clock, Duration::from_millis(args.calibration_ms));
        let span = Timed {
            value: (),
            start_cycles,
            end_cycles,
        };
        let timing = timing_for(&span, cps, agg.bytes_read);
        debug!(?timing, "parse timed");
        (agg, Some(timing))
    };

    let validation = args
        .expected
        .map(|expected| validate(agg.average, expected, args.tolerance));
    Ok(build_report(args.input.display().to_string(), &agg, timing, validation))
}

fn build_report(
    input: String,
    agg: &Aggregation,
    timing: Option<Timing>,
    validation: Option<Validation>,
) -> Report {
    Report {
        input,
        pair_count: agg.pair_count,
        average: agg.average,
        bytes_read: agg.bytes_read,
        timing,
        validation,
    }
}

fn timing_for(timed: &Timed<()>, cycles_per_second: u64, bytes: u64) -> Timing {
    let elapsed_seconds = timed.seconds(cycles_per_second);
    let throughput_mb_s = if elapsed_seconds > 0.0 {
        Some(bytes as f64 / BYTES_PER_MB / elapsed_seconds)
    } else {
        None
    };
    Timing {
        cycles: timed.cycles(),
        cycles_per_second,
        elapsed_seconds,
        throughput_mb_s,
    }
}

fn validate(average: f64, expected: f64, tolerance: f64) -> Validation {
    let diff = (average - expected).abs();
    let relative_error = if expected != 0.0 {
        diff / expected.abs()
    } else {
        diff
    };
    Validation {
        expected,
        relative_error,
        tolerance,
        passed: relative_error <= tolerance,
    }
}

fn print_report(report: &Report) {
    println!("Input: {} ({} bytes)", report.input, report.bytes_read);
    println!("Pair count: {}", report.pair_count);
    println!("Average distance between pairs: {:.16}", report.average);

    if let Some(t) = &report.timing {
        println!(
            "Elapsed: {:.6}s ({} cycles)",
            t.elapsed_seconds, t.cycles
        );
        println!(
            "CPU frequency: {} Hz ({:.3} GHz, estimated)",
            t.cycles_per_second,
            t.cycles_per_second as f64 / 1e9
        );
        if let Some(mbs) = t.throughput_mb_s {
            println!("Throughput: {:.2} MB/s", mbs);
        }
    }

    if let Some(v) = &report.validation {
        let verdict = if v.passed { "ok" } else { "MISMATCH" };
        println!(
            "Expected: {:.16} relative_error={:e} tolerance={:e} [{}]",
            v.expected, v.relative_error, v.tolerance, verdict
        );
    }
}

/// Usage errors exit with status 1 rather than clap's default.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
