pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tours")]
#[command(about = "Tours CLI - database setup and tour data import")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the tours and users tables")]
    Migrate,

    #[command(about = "Import tours from a JSON array file")]
    Import {
        #[arg(help = "Path to the JSON file")]
        file: PathBuf,
    },

    #[command(about = "Delete all tours")]
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::db::migrate(output_format).await,
        Commands::Import { file } => commands::data::import(&file, output_format).await,
        Commands::Delete => commands::data::delete(output_format).await,
    }
}
