use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use geo_coordinator::Coordinator;
use geo_server::ServerConfig;

#[derive(Debug, Parser)]
pub struct Args {
    /// Path to the SQLite progress database
    #[arg(long, default_value = "geo-scan.db")]
    db: PathBuf,

    /// Directory holding harvested/edited `.l2d` region files
    #[arg(long, default_value = "regions")]
    output_dir: PathBuf,

    /// Address of the login server used by scan workers and bootstrap
    #[arg(long, env = "GEO_LOGIN_ADDR")]
    login_addr: String,

    /// Account username prefix for scan workers and bootstrapped accounts
    #[arg(long, default_value = "geoscan")]
    account_prefix: String,

    /// Shared password for scan worker and bootstrapped accounts
    #[arg(long, env = "GEO_SCAN_PASSWORD")]
    password: String,

    /// Address the HTTP editor/scanner surface binds to
    #[arg(long, default_value = "127.0.0.1:8800")]
    bind_addr: SocketAddr,

    /// Number of scan workers to start immediately
    #[arg(long, default_value_t = 0)]
    workers: usize,
}

pub fn run(args: Args) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.output_dir)?;

    let coordinator = Arc::new(Coordinator::open(&args.db)?);
    tracing::info!(db = %args.db.display(), "coordinator opened");

    let handle = geo_server::spawn_server(
        coordinator,
        ServerConfig {
            bind_addr: args.bind_addr,
            output_dir: args.output_dir,
            login_addr: args.login_addr,
            account_prefix: args.account_prefix,
            password: args.password,
            initial_workers: args.workers,
        },
    );

    handle.join();
    Ok(())
}
