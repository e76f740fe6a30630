mod compile_senses;
mod inspect;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pictobert::logging::LogArgs;
use pictobert::ServiceConfig;
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    logging: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile WordNet index.sense into an FST.
    CompileSenses {
        #[arg(long, default_value = "data/index.sense")]
        input: PathBuf,

        #[arg(long, default_value = "data/sense_index.fst")]
        out_fst: PathBuf,
    },
    /// Build the vocabulary index from a data directory and print a summary.
    Inspect {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// TOML service configuration; `--data-dir` still applies.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the built index as bincode.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Number of valid tokens to list.
        #[arg(long, default_value_t = 10)]
        show: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.logging.setup_logging(3)?;

    match args.command {
        Command::CompileSenses { input, out_fst } => {
            let keys = compile_senses::run(&input, &out_fst)?;
            println!("Wrote {} sense keys to {}", keys, out_fst.display());
        }
        Command::Inspect {
            data_dir,
            config,
            snapshot,
            show,
        } => {
            let mut config = match config {
                Some(path) => ServiceConfig::load_toml(&path)?,
                None => ServiceConfig::default(),
            };
            config.data_dir = data_dir;
            let report = inspect::run(&config, snapshot.as_deref(), show)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
