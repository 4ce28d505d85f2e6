use std::{cell::RefCell, fmt::Write, rc::Rc, time::Duration};

use booklist::{Client, ErrorKind, LoadCoordinator, LoadResult};
use eyre::Context;
use log::{info, warn};

pub struct Options {
    pub timeout: Duration,
    pub json: bool,
}

/// What the terminal currently shows, only updated by the loader callback.
#[derive(Default)]
pub struct Screen {
    shown: Option<LoadResult>,
}

impl Screen {
    pub fn show(&mut self, result: LoadResult) {
        self.shown = Some(result);
    }

    pub fn clear(&mut self) {
        self.shown = None;
    }

    pub fn render(&self, json: bool) -> eyre::Result<String> {
        render(self.shown.as_ref(), json)
    }
}

/// Submits the query and waits for the result to reach the screen.
///
/// Returns `false` when the search took longer than `timeout` and was cancelled.
pub fn search<C: Client + Send + Sync + 'static>(
    loader: &mut LoadCoordinator<C>,
    screen: &Rc<RefCell<Screen>>,
    query: &str,
    timeout: Duration,
) -> bool {
    let target = Rc::clone(screen);
    let id = loader.start(query, move |result| target.borrow_mut().show(result));
    info!("Searching for '{}' ({id})", query.trim());

    loader.wait_timeout(timeout);
    if loader.cancel() {
        warn!("Search {id} cancelled after {}s", timeout.as_secs());
        screen.borrow_mut().clear();
        return false;
    }
    true
}

pub fn cancelled_message(timeout: Duration) -> String {
    format!("Search cancelled after {}s", timeout.as_secs())
}

pub fn render(result: Option<&LoadResult>, json: bool) -> eyre::Result<String> {
    let text = match result {
        None => "No results".to_owned(),
        Some(LoadResult::Success(records)) if json => serde_json::to_string_pretty(records)
            .wrap_err("Cannot write the found books as JSON")?,
        Some(LoadResult::Success(records)) => {
            let mut text = String::new();
            for (i, record) in records.iter().enumerate() {
                if i > 0 {
                    text.push('\n');
                }
                write!(text, "{}. {}\n   by {}", i + 1, record.title(), record.author())?;
            }
            text
        }
        Some(LoadResult::Empty) => "No books found".to_owned(),
        Some(LoadResult::Failure(kind)) => failure_message(*kind),
    };
    Ok(text)
}

fn failure_message(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::InvalidQuery => "Enter a search term to find books".to_owned(),
        ErrorKind::Network => {
            "Could not reach the book search service, check your internet connection".to_owned()
        }
        ErrorKind::HttpStatus(code) => {
            format!("The book search service answered with HTTP status {code}")
        }
        ErrorKind::ParseFailure => {
            "The book search service sent a response that could not be read".to_owned()
        }
    }
}

#[cfg(test)]
fn records() -> Vec<booklist::BookRecord> {
    use booklist::BookRecord;

    vec![
        BookRecord::new("X".to_owned(), "Book A".to_owned()),
        BookRecord::new("Y, Z".to_owned(), "Book B".to_owned()),
    ]
}

#[test]
fn success_is_rendered_one_book_per_entry() {
    let text = render(Some(&LoadResult::Success(records())), false).unwrap();
    assert_eq!("1. Book A\n   by X\n2. Book B\n   by Y, Z", text);
}

#[test]
fn success_is_rendered_as_json() {
    let text = render(Some(&LoadResult::Success(records())), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
        serde_json::json!([
            { "author": "X", "title": "Book A" },
            { "author": "Y, Z", "title": "Book B" },
        ]),
        value
    );
}

#[test]
fn empty_and_failures_have_their_own_text() {
    assert_eq!("No results", render(None, false).unwrap());
    assert_eq!("No books found", render(Some(&LoadResult::Empty), true).unwrap());
    assert_eq!(
        "The book search service answered with HTTP status 404",
        render(Some(&LoadResult::Failure(ErrorKind::HttpStatus(404))), false).unwrap()
    );
}

#[cfg(test)]
#[derive(Default)]
struct SlowClient;

#[cfg(test)]
impl Client for SlowClient {
    fn get_text(&self, _: &str) -> Result<String, booklist::Error> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(r#"{"items": []}"#.to_owned())
    }
}

#[test]
fn timed_out_search_is_cancelled() {
    let mut loader = LoadCoordinator::<SlowClient>::new();
    let screen = Rc::new(RefCell::new(Screen::default()));

    assert!(!search(&mut loader, &screen, "dune", Duration::from_millis(10)));
    assert_eq!(booklist::LoadState::Cancelled, loader.state());
    assert_eq!("No results", screen.borrow().render(false).unwrap());
    assert_eq!(
        "Search cancelled after 30s",
        cancelled_message(Duration::from_secs(30))
    );
}

#[test]
fn blank_search_reaches_screen_without_request() {
    let mut loader: LoadCoordinator = LoadCoordinator::new();
    let screen = Rc::new(RefCell::new(Screen::default()));

    assert!(search(&mut loader, &screen, "   ", Duration::from_millis(1)));
    assert_eq!(
        "Enter a search term to find books",
        screen.borrow().render(false).unwrap()
    );

    screen.borrow_mut().clear();
    assert_eq!("No results", screen.borrow().render(false).unwrap());
}
