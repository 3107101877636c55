use clap::Parser;
use hashpass::benchmark::{BenchmarkEngine, BenchmarkOptions, BenchmarkOutcome};
use hashpass::cycles::{CycleSource, Tsc};
use hashpass::io_utils::{hashpass_cli_error, simple_cli_error};
use hashpass::{AlgorithmSet, CancelToken, MultiEngine};
use log::warn;

#[derive(Parser)]
#[command(name = "hash_bench", about = "Measure digest throughput")]
struct Args {
    /// Comma separated algorithms to benchmark together
    #[arg(short, long, default_value = "sha1")]
    algo: String,
    /// Number of timed rounds
    #[arg(long, default_value_t = 4)]
    rounds: u32,
    /// Print a single tab separated line
    #[arg(long)]
    raw: bool,
    /// Also measure CPU cycles per byte
    #[arg(long)]
    cpb: bool,
    /// Workload per round in MiB before cost scaling
    #[arg(long, default_value_t = 512)]
    size_mib: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let set = AlgorithmSet::parse_list(&args.algo)
        .map_err(|e| hashpass_cli_error("parsing --algo", e.into()))?;

    let base_size = args
        .size_mib
        .checked_mul(1024 * 1024)
        .ok_or_else(|| simple_cli_error("--size-mib is too large"))?;

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        warn!("interrupt handler not installed: {e}");
    }

    let opts = BenchmarkOptions {
        rounds: args.rounds,
        base_size,
        raw: args.raw,
        cycles: args.cpb,
        ..BenchmarkOptions::default()
    };
    let mut tsc = Tsc::detect();
    if args.cpb && tsc.is_none() {
        warn!("no cycle counter on this platform, skipping cycles per byte");
    }
    let counter = tsc.as_mut().map(|t| t as &mut dyn CycleSource);

    let bench = BenchmarkEngine::new(&MultiEngine, opts, &cancel);
    let report = match bench.run(set, counter) {
        Ok(BenchmarkOutcome::Completed(report)) => report,
        Ok(BenchmarkOutcome::Interrupted) => {
            eprintln!("operation interrupted");
            return Ok(130);
        }
        Err(e) => return Err(hashpass_cli_error("benchmark", e).into()),
    };

    if args.raw {
        println!("{}", report.raw_line());
    } else {
        if !set.is_empty() {
            println!("[{set}]");
        }
        for line in report.human_lines() {
            println!("{line}");
        }
    }
    Ok(0)
}
