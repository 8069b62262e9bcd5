use clap::Parser;

mod cli;
mod config;
mod editor;
mod geometry;
mod map;
mod protocol;
mod routing;
mod server;
mod store;
mod sync;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Err(err) = cli.run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
