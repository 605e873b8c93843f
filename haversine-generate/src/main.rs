use clap::Parser;
use haversine_core::{seeded_rng, write_dataset, DistanceBasis};
use std::io;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Writes a clustered coordinate-pair dataset to stdout and the expected
/// average distance to stderr.
#[derive(Parser, Debug)]
#[command(name = "haversine-generate", version, about)]
struct Args {
    /// Seed for the MT19937 stream
    seed: u32,

    /// Number of pairs to generate
    count: u64,

    /// Accumulate distances over the raw coordinates instead of the clipped ones
    #[arg(long)]
    sum_before_clip: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = parse_args();
    init_logging(args.verbose);

    let basis = if args.sum_before_clip {
        DistanceBasis::Unclipped
    } else {
        DistanceBasis::Clipped
    };
    debug!(seed = args.seed, count = args.count, ?basis, "generating dataset");

    let mut rng = seeded_rng(args.seed);
    let stdout = io::stdout();
    match write_dataset(&mut rng, args.count, stdout.lock(), basis) {
        Ok(summary) => {
            eprintln!("Expected average: {:.16}", summary.expected_average);
        }
        Err(err) => {
            eprintln!("[!!] {err}");
            std::process::exit(1);
        }
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

/// stderr also carries the expected average, so only warnings show by default.
fn init_logging(verbose: bool) {
    let default_level = log_level(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn positional_seed_and_count() {
        let args = Args::try_parse_from(["haversine-generate", "7", "1000"]).unwrap();
        assert_eq!(args.seed, 7);
        assert_eq!(args.count, 1000);
        assert!(!args.sum_before_clip);
    }

    #[test]
    fn missing_count_is_a_usage_error() {
        let err = Args::try_parse_from(["haversine-generate", "7"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn quiet_by_default() {
        assert_eq!(log_level(false), "warn");
        assert_eq!(log_level(true), "debug");
    }

    #[test]
    fn rejects_non_numeric_seed() {
        assert!(Args::try_parse_from(["haversine-generate", "abc", "10"]).is_err());
    }
}
