mod dots;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "gtars";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Performance critical tools for calling dots in Hi-C contact matrices.")
        .subcommand_required(true)
        .subcommand(dots::cli::create_dots_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // DOT CALLING
        //
        Some((dots::cli::DOTS_CMD, matches)) => {
            dots::handlers::run_dots(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
