use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pictobert::logging::LogArgs;
use pictobert::{Service, ServiceConfig};
use pictobert_core::prediction::PredictResponse;

/// Predict the next pictogram from previously selected word senses.
#[derive(Parser, Debug)]
#[command(name = "pictobert", version)]
struct Args {
    /// TOML service configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the inference server URL.
    #[arg(long)]
    endpoint: Option<String>,

    #[command(flatten)]
    logging: LogArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict once and print the JSON response.
    Predict {
        /// Maximum number of predictions.
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Keep only the best entry per pictogram.
        #[arg(long)]
        unique: bool,

        /// Prior word senses, e.g. `girl%1:18:02::`.
        senses: Vec<String>,
    },
    /// Read one line of space-separated senses per request.
    Interactive {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Print readiness details.
    Status,
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load_toml(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.model_endpoint = Some(endpoint.clone());
    }
    Ok(config)
}

fn start(config: ServiceConfig) -> anyhow::Result<Service> {
    let data_dir = config.data_dir.clone();
    let service = Service::new(config);
    service
        .start_remote()
        .with_context(|| format!("failed to start from {}", data_dir.display()))?;
    Ok(service)
}

fn print_json(response: &PredictResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn interactive(service: &Service, limit: usize) -> anyhow::Result<()> {
    println!("Ready! Type word senses separated by spaces and press Enter.");
    println!("Example: girl%1:18:02:: eat%2:34:00::");
    println!("An empty line predicts from nothing. Press Ctrl+D to exit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let senses: Vec<&str> = line.split_whitespace().collect();
        match service.predict_unique(senses.as_slice(), Some(limit)) {
            Ok(response) if response.predictions.is_empty() => println!("  (no pictograms)"),
            Ok(response) => {
                for (i, p) in response.predictions.iter().enumerate() {
                    println!(
                        "  {}. {:<20} {:>8.5}  {}",
                        i + 1,
                        p.label(),
                        p.probability,
                        service.image_url(p)
                    );
                }
            }
            Err(e) => println!("  error: {}", e),
        }
        print!("> ");
        stdout.flush()?;
    }
    println!();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.logging.setup_logging(2)?;

    let config = load_config(&args)?;
    match args.command {
        Command::Predict {
            limit,
            unique,
            ref senses,
        } => {
            let service = start(config)?;
            let response = if unique {
                service.predict_unique(senses.as_slice(), limit)?
            } else {
                service.predict(senses.as_slice(), limit)?
            };
            print_json(&response)
        }
        Command::Interactive { limit } => {
            let service = start(config)?;
            interactive(&service, limit)
        }
        Command::Status => {
            let service = Service::new(config);
            if let Err(e) = service.start_remote() {
                log::error!("startup failed: {}", e);
            }
            println!("{}", serde_json::to_string_pretty(&service.health())?);
            Ok(())
        }
    }
}
