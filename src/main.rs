mod cli;
mod db;
mod duplicates;
mod error;
mod fmt;
mod importer;
mod ingest;
mod models;
mod preview_cache;
mod settings;
mod store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DashboardsCommands};

fn init_tracing(verbose: bool) {
    let default = if verbose { "caixa=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Dashboards { command } => match command {
            DashboardsCommands::Add { name } => cli::dashboards::add(&name),
            DashboardsCommands::List => cli::dashboards::list(),
            DashboardsCommands::Archive { name } => cli::dashboards::archive(&name),
        },
        Commands::Preview { file, dashboard, json } => cli::preview::run(&file, &dashboard, json),
        Commands::Import {
            file,
            dashboard,
            skip_duplicates,
            select,
            yes,
        } => cli::import::run(&file, &dashboard, skip_duplicates, select.as_deref(), yes),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
