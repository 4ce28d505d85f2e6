//! Single-flight loading of search results.
//!
//! A [`LoadCoordinator`] is owned by the foreground thread (the one driving the display layer).
//! [`LoadCoordinator::start`] moves the blocking fetch and extraction onto a worker thread and the
//! worker sends its [`LoadResult`] back over a channel. Results are only handed to the callback
//! from [`LoadCoordinator::poll`], [`LoadCoordinator::wait`] or [`LoadCoordinator::wait_timeout`],
//! so the callback always runs on the foreground thread.
//!
//! Only the latest attempt is authoritative. Starting a new attempt, cancelling or resetting
//! abandons the running one: its worker still runs to completion but its result is dropped.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, trace, warn};

use crate::{
    api::{google_books, Client},
    model::BookRecord,
    query::SearchQuery,
    Error, ErrorKind,
};

/// The terminal outcome of a load attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadResult {
    /// The search found at least one book, in response order.
    Success(Vec<BookRecord>),
    /// The response was well formed but contained no books.
    Empty,
    /// The search could not be completed.
    Failure(ErrorKind),
}

impl From<Result<Vec<BookRecord>, Error>> for LoadResult {
    fn from(res: Result<Vec<BookRecord>, Error>) -> Self {
        match res {
            Ok(records) if records.is_empty() => Self::Empty,
            Ok(records) => Self::Success(records),
            Err(err) => {
                warn!("Search failed: {err}");
                Self::Failure(err.kind())
            }
        }
    }
}

/// Lifecycle of the current load attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// No attempt has been made since creation or the last reset.
    Idle,
    /// An attempt is waiting for its result.
    Running,
    /// The result of the latest attempt was handed to its callback.
    Delivered,
    /// The latest attempt was cancelled before its result was delivered.
    Cancelled,
}

/// Identifies a single load attempt of a [`LoadCoordinator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Callback = Box<dyn FnOnce(LoadResult)>;

struct Attempt {
    id: AttemptId,
    on_result: Callback,
}

struct Delivery {
    id: AttemptId,
    result: LoadResult,
}

/// Runs searches off the foreground thread and delivers exactly one [`LoadResult`] per attempt
/// that is not cancelled or superseded.
///
/// A single client `C` is shared by the worker threads of every attempt.
pub struct LoadCoordinator<C = reqwest::blocking::Client> {
    next_id: u64,
    state: LoadState,
    current: Option<Attempt>,
    last_result: Option<LoadResult>,
    client: Arc<C>,
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
}

impl<C> Default for LoadCoordinator<C>
where
    C: Client + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> LoadCoordinator<C>
where
    C: Client + Send + Sync + 'static,
{
    /// Creates an idle coordinator with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(C::default())
    }

    /// Creates an idle coordinator that searches with `client`.
    #[must_use]
    pub fn with_client(client: C) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            next_id: 0,
            state: LoadState::Idle,
            current: None,
            last_result: None,
            client: Arc::new(client),
            tx,
            rx,
        }
    }

    /// Starts searching for the raw user input, replacing any running attempt.
    ///
    /// A blank query is answered straight away with [`ErrorKind::InvalidQuery`] and no request
    /// is made. Otherwise `on_result` is called once the result has arrived and is collected by
    /// one of the polling methods, unless the attempt is cancelled first.
    pub fn start<F>(&mut self, raw: &str, on_result: F) -> AttemptId
    where
        F: FnOnce(LoadResult) + 'static,
    {
        if self.state == LoadState::Running {
            trace!("New search supersedes the running one");
            self.cancel();
        }

        self.next_id += 1;
        let id = AttemptId(self.next_id);
        self.current = Some(Attempt {
            id,
            on_result: Box::new(on_result),
        });
        self.state = LoadState::Running;

        match SearchQuery::parse(raw) {
            Some(query) => {
                trace!("Starting attempt {id} for '{query}'");
                let tx = self.tx.clone();
                let client = Arc::clone(&self.client);
                thread::spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        google_books::search(&*client, &query)
                    }))
                    .map_or_else(
                        |_| {
                            error!("Search worker for attempt {id} panicked");
                            LoadResult::Failure(ErrorKind::Network)
                        },
                        LoadResult::from,
                    );
                    // the coordinator may be gone, nobody is waiting for the result then
                    let _ = tx.send(Delivery { id, result });
                });
            }
            None => {
                warn!("Search query is blank - no request made");
                self.deliver(Delivery {
                    id,
                    result: LoadResult::Failure(ErrorKind::InvalidQuery),
                });
            }
        }

        id
    }

    /// Cancels the running attempt, its result will never be delivered.
    ///
    /// Returns `false` when there was no running attempt.
    pub fn cancel(&mut self) -> bool {
        if self.state != LoadState::Running {
            return false;
        }

        if let Some(attempt) = self.current.take() {
            debug!("Cancelled attempt {}", attempt.id);
        }
        self.state = LoadState::Cancelled;
        true
    }

    /// Abandons any running attempt and forgets the last delivered result.
    pub fn reset(&mut self) {
        trace!("Resetting loader");
        self.current = None;
        self.last_result = None;
        self.state = LoadState::Idle;
    }

    /// The state of the latest attempt.
    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// The last result delivered since creation or the last reset.
    #[must_use]
    pub const fn last_result(&self) -> Option<&LoadResult> {
        self.last_result.as_ref()
    }

    /// Delivers the result of the current attempt if it has already arrived.
    ///
    /// Returns `true` when a result was delivered.
    pub fn poll(&mut self) -> bool {
        let mut delivered = false;
        while let Ok(delivery) = self.rx.try_recv() {
            delivered |= self.deliver(delivery);
        }
        delivered
    }

    /// Blocks until the result of the current attempt is delivered.
    ///
    /// Returns `false` straight away when no attempt is running.
    pub fn wait(&mut self) -> bool {
        while self.state == LoadState::Running {
            match self.rx.recv() {
                Ok(delivery) => {
                    if self.deliver(delivery) {
                        return true;
                    }
                }
                Err(_) => break,
            }
        }
        false
    }

    /// Blocks until the result of the current attempt is delivered or `timeout` has passed.
    ///
    /// The attempt keeps running after a timeout, call [`LoadCoordinator::cancel`] to abandon it.
    /// Returns `true` when a result was delivered.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state == LoadState::Running {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(delivery) => {
                    if self.deliver(delivery) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        false
    }

    fn deliver(&mut self, delivery: Delivery) -> bool {
        let Delivery { id, result } = delivery;
        match self.current.take() {
            Some(attempt) if attempt.id == id => {
                trace!("Delivering result of attempt {id}");
                self.state = LoadState::Delivered;
                self.last_result = Some(result.clone());
                (attempt.on_result)(result);
                true
            }
            current => {
                debug!("Discarding result of stale attempt {id}");
                self.current = current;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, thread, time::Duration};

    use super::{LoadCoordinator, LoadResult, LoadState};
    use crate::{
        api::{impl_text_producer, Client, MockClient, NetworkErrorProducer},
        model::BookRecord,
        query::SEARCH_URL,
        Error, ErrorKind,
    };

    const TWO_BOOKS_JSON: &str = r#"{
        "items": [
            { "volumeInfo": { "title": "Book A", "authors": ["X"] } },
            { "volumeInfo": { "title": "Book B", "authors": ["Y", "Z"] } }
        ]
    }"#;

    impl_text_producer! {
        TwoBooksProducer => Ok(TWO_BOOKS_JSON.to_owned()),
        NoItemsProducer => Ok(r#"{"totalItems": 0, "items": []}"#.to_owned()),
        NotFoundProducer => Err(Error::new(ErrorKind::HttpStatus(404), "Not Found")),
        BrokenJsonProducer => Ok("{not json".to_owned()),
    }

    /// Answers with two books only for the `harry potter` search url.
    #[derive(Default)]
    struct HarryPotterClient;

    impl Client for HarryPotterClient {
        fn get_text(&self, url: &str) -> Result<String, Error> {
            if url == format!("{SEARCH_URL}harry+potter") {
                Ok(TWO_BOOKS_JSON.to_owned())
            } else {
                Err(Error::new(ErrorKind::HttpStatus(400), url))
            }
        }
    }

    /// Responds to `slow` searches only after a delay, with a book titled after the query.
    #[derive(Default)]
    struct SlowClient;

    impl Client for SlowClient {
        fn get_text(&self, url: &str) -> Result<String, Error> {
            let query = url.trim_start_matches(SEARCH_URL);
            if query.starts_with("slow") {
                thread::sleep(Duration::from_millis(200));
            }
            Ok(format!(
                r#"{{"items": [{{"volumeInfo": {{"title": "{query}", "authors": ["A"]}}}}]}}"#
            ))
        }
    }

    #[derive(Default)]
    struct PanickingClient;

    impl Client for PanickingClient {
        fn get_text(&self, _: &str) -> Result<String, Error> {
            panic!("client blew up")
        }
    }

    /// Always answers with the body it was created with.
    #[derive(Default)]
    struct FixedClient(String);

    impl Client for FixedClient {
        fn get_text(&self, _: &str) -> Result<String, Error> {
            Ok(self.0.clone())
        }
    }

    type Sink = Rc<RefCell<Vec<LoadResult>>>;

    fn sink() -> Sink {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push_to(sink: &Sink) -> impl FnOnce(LoadResult) + 'static {
        let sink = Rc::clone(sink);
        move |result| sink.borrow_mut().push(result)
    }

    fn titles(result: &LoadResult) -> Vec<&str> {
        match result {
            LoadResult::Success(records) => records.iter().map(BookRecord::title).collect(),
            other => panic!("Expected success but got {other:?}"),
        }
    }

    #[test]
    fn search_delivers_records_in_response_order() {
        let results = sink();
        let mut loader = LoadCoordinator::<HarryPotterClient>::new();

        loader.start("harry potter", push_to(&results));
        assert_eq!(LoadState::Running, loader.state());
        assert!(loader.wait());

        let expected = LoadResult::Success(vec![
            BookRecord::new("X".to_owned(), "Book A".to_owned()),
            BookRecord::new("Y, Z".to_owned(), "Book B".to_owned()),
        ]);
        assert_eq!(vec![expected.clone()], *results.borrow());
        assert_eq!(LoadState::Delivered, loader.state());
        assert_eq!(Some(&expected), loader.last_result());
    }

    #[test]
    fn blank_query_fails_without_waiting() {
        let results = sink();
        let mut loader = LoadCoordinator::<MockClient<TwoBooksProducer>>::new();

        loader.start("   ", push_to(&results));

        assert_eq!(
            vec![LoadResult::Failure(ErrorKind::InvalidQuery)],
            *results.borrow()
        );
        assert_eq!(LoadState::Delivered, loader.state());
        assert!(!loader.wait(), "nothing is left running");
    }

    #[test]
    fn no_items_is_delivered_as_empty() {
        let results = sink();
        let mut loader = LoadCoordinator::<MockClient<NoItemsProducer>>::new();

        loader.start("nothing", push_to(&results));
        assert!(loader.wait());

        assert_eq!(vec![LoadResult::Empty], *results.borrow());
    }

    #[test]
    fn empty_body_is_delivered_as_empty() {
        let results = sink();
        let mut loader = LoadCoordinator::<MockClient>::new();

        loader.start("nothing", push_to(&results));
        assert!(loader.wait());

        assert_eq!(vec![LoadResult::Empty], *results.borrow());
    }

    #[test]
    fn errors_are_delivered_as_failures() {
        fn run<C: Client + Send + Sync + 'static>() -> Vec<LoadResult> {
            let results = sink();
            let mut loader = LoadCoordinator::<C>::new();
            loader.start("query", push_to(&results));
            assert!(loader.wait());
            let delivered = results.borrow().clone();
            delivered
        }

        assert_eq!(
            vec![LoadResult::Failure(ErrorKind::HttpStatus(404))],
            run::<MockClient<NotFoundProducer>>()
        );
        assert_eq!(
            vec![LoadResult::Failure(ErrorKind::Network)],
            run::<MockClient<NetworkErrorProducer>>()
        );
        assert_eq!(
            vec![LoadResult::Failure(ErrorKind::ParseFailure)],
            run::<MockClient<BrokenJsonProducer>>()
        );
    }

    #[test]
    fn panicking_worker_still_delivers_failure() {
        let results = sink();
        let mut loader = LoadCoordinator::<PanickingClient>::new();

        loader.start("dune", push_to(&results));
        assert!(loader.wait_timeout(Duration::from_secs(5)));

        assert_eq!(
            vec![LoadResult::Failure(ErrorKind::Network)],
            *results.borrow()
        );
        assert_eq!(LoadState::Delivered, loader.state());
    }

    #[test]
    fn poll_delivers_arrived_result_once() {
        let results = sink();
        let mut loader = LoadCoordinator::<SlowClient>::new();

        loader.start("fast", push_to(&results));
        thread::sleep(Duration::from_millis(300));

        assert!(loader.poll());
        assert_eq!(LoadState::Delivered, loader.state());
        assert_eq!(1, results.borrow().len());
        assert_eq!(vec!["fast"], titles(&results.borrow()[0]));

        assert!(!loader.poll());
        assert_eq!(1, results.borrow().len());
    }

    #[test]
    fn given_client_is_shared_by_every_attempt() {
        let results = sink();
        let mut loader = LoadCoordinator::with_client(FixedClient(TWO_BOOKS_JSON.to_owned()));

        loader.start("first", push_to(&results));
        assert!(loader.wait());
        loader.start("second", push_to(&results));
        assert!(loader.wait());

        let results = results.borrow();
        assert_eq!(2, results.len());
        assert_eq!(vec!["Book A", "Book B"], titles(&results[0]));
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn restart_delivers_only_the_latest_attempt() {
        let first = sink();
        let second = sink();
        let mut loader = LoadCoordinator::<SlowClient>::new();

        let first_id = loader.start("slow", push_to(&first));
        let second_id = loader.start("fast", push_to(&second));
        assert_ne!(first_id, second_id);

        assert!(loader.wait());
        assert_eq!(vec!["fast"], titles(&second.borrow()[0]));

        // let the superseded attempt finish, its result must be dropped
        thread::sleep(Duration::from_millis(400));
        assert!(!loader.poll());

        assert!(first.borrow().is_empty());
        assert_eq!(1, second.borrow().len());
        assert_eq!(LoadState::Delivered, loader.state());
    }

    #[test]
    fn cancelled_attempt_is_never_delivered() {
        let results = sink();
        let mut loader = LoadCoordinator::<SlowClient>::new();

        loader.start("slow", push_to(&results));
        assert!(loader.cancel());
        assert_eq!(LoadState::Cancelled, loader.state());
        assert!(!loader.cancel(), "nothing is running anymore");

        thread::sleep(Duration::from_millis(400));
        assert!(!loader.poll());
        assert!(!loader.wait());

        assert!(results.borrow().is_empty());
        assert_eq!(None, loader.last_result());
    }

    #[test]
    fn wait_timeout_leaves_slow_attempt_running() {
        let results = sink();
        let mut loader = LoadCoordinator::<SlowClient>::new();

        loader.start("slow", push_to(&results));
        assert!(!loader.wait_timeout(Duration::from_millis(10)));
        assert_eq!(LoadState::Running, loader.state());

        assert!(loader.wait_timeout(Duration::from_secs(5)));
        assert_eq!(vec!["slow"], titles(&results.borrow()[0]));
    }

    #[test]
    fn reset_forgets_results_and_abandons_running_attempt() {
        let results = sink();
        let mut loader = LoadCoordinator::<SlowClient>::new();

        loader.start("fast", push_to(&results));
        assert!(loader.wait());
        assert!(loader.last_result().is_some());

        loader.reset();
        assert_eq!(LoadState::Idle, loader.state());
        assert_eq!(None, loader.last_result());

        loader.start("slow", push_to(&results));
        loader.reset();
        thread::sleep(Duration::from_millis(400));
        assert!(!loader.poll());

        assert_eq!(1, results.borrow().len());
        assert_eq!(LoadState::Idle, loader.state());
    }
}
