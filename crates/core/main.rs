#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::missing_safety_doc,
    clippy::missing_const_for_fn
)]
#![allow(clippy::as_conversions, clippy::mod_module_files)]

use std::{process, time::Duration};

mod app;
mod commands;
mod interact;

use app::Options;
use commands::Commands;

use clap::{Args, Parser};
use log::{error, trace};

fn main() {
    if let Err(err) = try_main() {
        error!("{err:#}");
        process::exit(2);
    }
}

fn try_main() -> eyre::Result<()> {
    let Cli {
        command,
        global_opts:
            GlobalOpts {
                verbosity,
                quiet,
                timeout,
                json,
            },
    } = Cli::parse();

    setup_errlog(verbosity as usize, quiet)?;

    let options = Options {
        timeout: Duration::from_secs(timeout),
        json,
    };
    trace!("Waiting up to {timeout}s for each search");

    command.execute(&options)
}

fn setup_errlog(verbosity: usize, quiet: bool) -> eyre::Result<()> {
    // if quiet then ignore verbosity but still show errors
    let verbosity = if quiet { 0 } else { verbosity + 1 };

    stderrlog::new().verbosity(verbosity).init()?;
    Ok(())
}

#[derive(Parser)]
#[clap(name = "booklist")]
#[clap(about = "Search the Google Books API for books from the terminal")]
#[clap(version, author)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(flatten)]
    global_opts: GlobalOpts,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// How chatty the program is when performing commands
    ///
    /// The number of times this flag is used will increase how chatty
    /// the program is.
    #[clap(short, long, parse(from_occurrences), global = true)]
    verbosity: u8,

    /// Prevents the program from logging anything but errors to stderr.
    #[clap(short, long, global = true)]
    quiet: bool,

    /// Seconds to wait for a search before cancelling it.
    #[clap(short, long, default_value = "30", global = true)]
    timeout: u64,

    /// Print found books as JSON.
    #[clap(long, global = true)]
    json: bool,
}
