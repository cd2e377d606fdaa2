use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tenantry-sweeper")]
#[command(about = "Tenantry authorization store maintenance")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (overrides TENANTRY_CONFIG env var)
    #[arg(short, long, global = true, env = "TENANTRY_CONFIG", default_value = "tenantry.toml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the authorization tables and indexes
    Migrate,
    /// Delete expired authorizations once and exit
    Sweep(SweepArgs),
    /// Run the periodic sweeper until interrupted
    Run,
}

#[derive(clap::Args)]
pub struct SweepArgs {
    /// Report the expired authorizations per token kind without deleting them
    #[arg(long)]
    pub dry_run: bool,
}
