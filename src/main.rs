use clap::Parser;
use miette::Result;

use usecode_dec_rs::cli::{self, Cli};
use usecode_dec_rs::options::Verbosity;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG still wins over -v
    env_logger::Builder::new()
        .filter_level(Verbosity::from_count(cli.verbose).level_filter())
        .parse_default_env()
        .init();

    let report = cli::decompile::decompile(&cli)?;
    let code = report.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
