use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;

use savepixie::settings;

mod cli;

#[derive(Parser)]
#[command(version, about = "Track savings goals from the terminal.", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "savepixie.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: cli::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = settings::Settings::load(&args.config)?;

    init_logging(&args.log4rs)?;
    log::debug!("Loaded settings from {}.", args.config);

    cli::run(args.command, &settings).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
