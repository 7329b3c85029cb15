//! CLI entry point for the geodata toolkit.

use clap::{Parser, Subcommand};

/// World <-> region/cell coordinate conversion
pub mod coords;

/// Coordinator + editor + scanner server process
pub mod serve;

/// CLI commands available
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Converts world coordinates to a region/cell address
    World2geo(coords::World2GeoArgs),

    /// Converts a region/cell address back to world coordinates
    Geo2world(coords::Geo2WorldArgs),

    /// Starts the coordinator, editor/scanner HTTP server, and optional
    /// scan worker pool
    Serve(serve::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "geo-cli")]
#[clap(bin_name = "geo")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "L2D geodata harvesting, editing, and serving toolkit")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();

    match args.command {
        Command::World2geo(args) => coords::run_world2geo(args),
        Command::Geo2world(args) => coords::run_geo2world(args),
        Command::Serve(args) => serve::run(args),
    }
}
