use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fast_import_filter::utils::maybe_decompress;
use fast_import_filter::{filter_stream, FastImportError, FilterConfig, PathSpec, StreamParser};

/// Filter a git fast-import stream down to a set of paths, keeping its
/// history consistent
#[derive(Parser)]
#[command(name = "fast-import-filter")]
#[command(version, about)]
struct Cli {
    /// Input stream; `-` or absent reads stdin. Gzip input is detected
    input: Option<PathBuf>,

    /// Write the filtered stream to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to keep, `dir/` for a directory (repeatable)
    #[arg(short = 'i', long = "include", value_name = "PATH")]
    include: Vec<String>,

    /// Path to drop, wins over --include (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "PATH")]
    exclude: Vec<String>,

    /// JSON filter configuration; paths given on the command line are added
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit commits left without changes instead of squashing them
    #[arg(long)]
    keep_empty_commits: bool,

    /// Print the parsed commands as JSON lines instead of filtering
    #[arg(long)]
    dump_json: bool,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("fast-import-filter: {:#}", err);
            ExitCode::from(2)
        },
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let input = open_input(cli.input.as_deref())?;
    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let result = if cli.dump_json {
        dump_json(input, &mut output)
    } else {
        let config = build_config(cli)?;
        filter_stream(input, &config, &mut output).map(|_| ())
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(FastImportError::Parse(err)) => {
            eprintln!("fast-import-filter: {}", err);
            Ok(ExitCode::from(1))
        },
        Err(err) => Err(err.into()),
    }
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path).with_context(|| format!("Failed to open input: {:?}", path))?;
            maybe_decompress(file).with_context(|| format!("Failed to read input: {:?}", path))
        },
        _ => maybe_decompress(io::stdin()).context("Failed to read stdin"),
    }
}

fn build_config(cli: &Cli) -> Result<FilterConfig> {
    let mut config = match &cli.config {
        Some(path) => FilterConfig::load_from_file(path)?,
        None => FilterConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;

    config.include.extend(cli.include.iter().map(|path| PathSpec::parse(path)));
    config.exclude.extend(cli.exclude.iter().map(|path| PathSpec::parse(path)));
    if cli.keep_empty_commits {
        config.squash_empty_commits = false;
    }
    tracing::debug!(?config, "filter configuration");
    Ok(config)
}

fn dump_json(input: Box<dyn BufRead>, output: &mut dyn Write) -> Result<(), FastImportError> {
    for command in StreamParser::new(input) {
        let command = command?;
        serde_json::to_writer(&mut *output, &command).map_err(|e| FastImportError::Io {
            context: "writing JSON".to_string(),
            reason: e.to_string(),
        })?;
        output
            .write_all(b"\n")
            .map_err(|e| FastImportError::io("writing JSON", &e))?;
    }
    output
        .flush()
        .map_err(|e| FastImportError::io("flushing output", &e))
}
