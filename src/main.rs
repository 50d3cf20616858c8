use clap::Parser;
use data_factory::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Cache(args) => cli::cache::run(args).await,
        Command::Config(args) => cli::config::run(args).await,
    }
}
