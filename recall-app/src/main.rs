mod app;
mod cli;
mod input;
mod logging;

use clap::Parser;

pub use app::App;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init_logging(cli.log_format, cli.verbose);
    App::new(cli).run()
}
