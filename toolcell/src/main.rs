mod cli;
mod commands;
mod gateway;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use toolcell_core::observability;

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen } => gateway::serve(listen),
        Commands::Execute {
            tool_name,
            input_json,
        } => commands::execute::run(&tool_name, &input_json),
        Commands::Tools => commands::catalog::list_tools(),
        Commands::Remote => commands::catalog::list_remote(),
        Commands::Verify { file_path } => commands::catalog::verify(&file_path),
        Commands::CatalogImport { file_path } => commands::catalog::import(&file_path),
    }
}
