use std::{cell::RefCell, rc::Rc};

use booklist::LoadCoordinator;

use clap::{AppSettings, Subcommand};
use eyre::eyre;
use log::trace;

use crate::{
    app::{self, Options, Screen},
    interact::user_input,
};

#[derive(Subcommand)]
#[non_exhaustive]
pub enum Commands {
    /// Search for books matching the given words
    #[clap(setting(AppSettings::ArgRequiredElseHelp))]
    Search {
        /// The words to search for
        #[clap(required = true)]
        words: Vec<String>,
    },
    /// Keep asking for searches until `/quit` is entered
    ///
    /// `/reset` clears the results and `/last` shows the last results again.
    Interactive,
}

impl Commands {
    pub fn execute(self, options: &Options) -> eyre::Result<()> {
        let mut loader: LoadCoordinator = LoadCoordinator::new();
        let screen = Rc::new(RefCell::new(Screen::default()));

        match self {
            Commands::Search { words } => {
                let query = words.join(" ");
                trace!("search subcommand called with the value of '{query}'");
                if !app::search(&mut loader, &screen, &query, options.timeout) {
                    return Err(eyre!(app::cancelled_message(options.timeout)));
                }
                println!("{}", screen.borrow().render(options.json)?);
            }
            Commands::Interactive => loop {
                let input = user_input("Search books")?;
                match input.trim() {
                    "/quit" => break,
                    "/reset" => {
                        loader.reset();
                        screen.borrow_mut().clear();
                        println!("Results cleared");
                    }
                    "/last" => println!("{}", app::render(loader.last_result(), options.json)?),
                    query => {
                        if app::search(&mut loader, &screen, query, options.timeout) {
                            println!("{}", screen.borrow().render(options.json)?);
                        } else {
                            println!("{}", app::cancelled_message(options.timeout));
                        }
                    }
                }
            },
        }

        Ok(())
    }
}
