use clap::Parser;
use spark_route_gen::{Cli, run};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "spark_route_opt=info,spark_route_syn=info,spark_route_gen=info";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(&Cli::parse())
}
