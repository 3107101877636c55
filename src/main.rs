use clap::Parser;
use hashpass::algorithm::{AlgorithmSet, Support};
use hashpass::io_utils::{hashpass_cli_error, simple_cli_error, CliError};
use hashpass::{
    CancelToken, Config, DigestEngine, EmbedOptions, FileTask, MultiEngine, RunMode, RunStatus,
    Runner, TorrentSettings,
};
use std::io::{self, Write};
use std::path::PathBuf;

const EXIT_ERRORS: i32 = 1;
const EXIT_FATAL: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "hashpass", version, about = "Compute file digests in a single pass")]
struct Args {
    /// Files to digest; `-` reads standard input
    files: Vec<PathBuf>,
    /// Comma separated algorithms, e.g. crc32,sha256
    #[arg(short, long, default_value = "crc32")]
    algo: String,
    /// Compute every known algorithm
    #[arg(long)]
    all: bool,
    /// Digest this text instead of a file
    #[arg(short, long)]
    message: Option<String>,
    /// Verify the CRC32 embedded in each file name
    #[arg(short = 'e', long)]
    check_embedded: bool,
    /// Rename files to carry their CRC32, e.g. name[1A2B3C4D].ext
    #[arg(long)]
    embed_crc: bool,
    /// Character inserted before the embedded CRC32
    #[arg(long)]
    embed_crc_delimiter: Option<char>,
    /// Print hex digests in lowercase
    #[arg(long)]
    lowercase: bool,
    /// Write a .torrent file for each input
    #[arg(long)]
    torrent: bool,
    /// Write one torrent for all inputs to this path
    #[arg(long, value_name = "FILE")]
    bt_batch: Option<PathBuf>,
    /// Tracker announce URL (repeatable)
    #[arg(long, value_name = "URL")]
    bt_announce: Vec<String>,
    /// Torrent piece length in bytes
    #[arg(long)]
    bt_piece_length: Option<u64>,
    /// Mark torrents private
    #[arg(long)]
    bt_private: bool,
    /// Choose piece lengths like Transmission
    #[arg(long)]
    bt_transmission: bool,
    /// Print per-file and total speed
    #[arg(long)]
    speed: bool,
    /// Show a progress bar
    #[arg(short = 'P', long)]
    percents: bool,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    /// List the known algorithms and exit
    #[arg(long)]
    list_hashes: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn config_from_args(args: &Args) -> Result<Config, CliError> {
    let algorithms = if args.all {
        AlgorithmSet::all()
    } else {
        AlgorithmSet::parse_list(&args.algo)
            .map_err(|e| hashpass_cli_error("parsing --algo", e.into()))?
    };
    let torrent = (args.torrent || args.bt_batch.is_some()).then(|| TorrentSettings {
        announces: args.bt_announce.clone(),
        piece_length: args.bt_piece_length,
        private: args.bt_private,
        transmission: args.bt_transmission,
        program_name: format!("hashpass {}", env!("CARGO_PKG_VERSION")),
        batch_file: args.bt_batch.clone(),
    });
    let config = Config {
        algorithms,
        mode: if args.check_embedded {
            RunMode::CheckEmbedded
        } else {
            RunMode::Calculate
        },
        embed: args.embed_crc.then_some(EmbedOptions {
            lowercase: args.lowercase,
            delimiter: args.embed_crc_delimiter,
        }),
        lowercase: args.lowercase,
        torrent,
        speed: args.speed,
        percents: args.percents,
        json: args.json,
        ..Config::default()
    };
    config
        .validate()
        .map_err(|e| hashpass_cli_error("invalid options", e))?;
    Ok(config)
}

fn list_hashes(engine: &MultiEngine) -> io::Result<()> {
    let accelerated = engine.supported(Support::Accelerated);
    let mut out = io::stdout().lock();
    for id in engine.supported(Support::All).iter() {
        let name = engine.name(id).unwrap_or_else(|| id.name());
        let mark = if accelerated.contains(id) { " (accelerated)" } else { "" };
        writeln!(out, "{name}{mark}")?;
    }
    Ok(())
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.list_hashes {
        list_hashes(&MultiEngine)?;
        return Ok(0);
    }
    let config = config_from_args(&args)?;
    if args.files.is_empty() && args.message.is_none() {
        return Err(simple_cli_error("no input files given, use - for standard input").into());
    }

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        log::warn!("interrupt handler not installed: {e}");
    }

    let set = config.effective_algorithms();
    let mut tasks = Vec::with_capacity(args.files.len() + 1);
    if let Some(msg) = &args.message {
        tasks.push(FileTask::from_memory("(message)", msg.as_bytes().to_vec(), set));
    }
    for path in &args.files {
        if path.as_os_str() == "-" {
            tasks.push(FileTask::stdin(set));
        } else {
            tasks.push(FileTask::from_path(path, set));
        }
    }

    let mut runner = Runner::new(MultiEngine, config, cancel, io::stdout().lock());
    let status = match runner.run(tasks) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{}", hashpass_cli_error("fatal", e));
            return Ok(EXIT_FATAL);
        }
    };
    if status == RunStatus::Interrupted {
        eprintln!("operation interrupted");
        return Ok(EXIT_INTERRUPTED);
    }
    let stats = runner.stats();
    let mut out = runner.into_output();
    out.flush()?;
    Ok(if stats.has_errors() { EXIT_ERRORS } else { 0 })
}
