use clap::Parser;
use isograph::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{annotate, coordinate, die, orf, unify},
    utils::{handle_error_and_exit, Result},
};
use std::time;

fn runner() -> Result<()> {
    let start_timer = time::Instant::now();
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Orf(_) => "orf",
        Command::Annotate(_) => "annotate",
        Command::Coordinate(_) => "coordinate",
        Command::Die(_) => "die",
        Command::Unify(_) => "unify",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    log::debug!("Command line: {}", std::env::args().collect::<Vec<_>>().join(" "));
    match cli.command {
        Command::Orf(args) => orf::orf(args)?,
        Command::Annotate(args) => annotate::annotate(args)?,
        Command::Coordinate(args) => coordinate::coordinate(args)?,
        Command::Die(args) => die::die(args)?,
        Command::Unify(args) => unify::unify(args)?,
    }
    log::info!("Total execution time: {:.2?}", start_timer.elapsed());
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
