//! Feed consumer state machine.
//!
//! ```text
//!            poll_once()
//!   Idle ───────────────▶ FetchingPage ◀──▶ RetryWait
//!    ▲                         │
//!    │                         ▼
//!    │                 ProcessingEntries
//!    │                         │
//!    │                         ▼
//!    └──────────────── AdvancingCursor
//!
//!   Stopped: stop requested, or an entry failed under EntryErrorPolicy::Stop
//!   Failed:  retry budget exhausted or a non-retryable fetch error
//! ```
//!
//! Both terminal states are left only through [`FeedConsumer::reset`].

use crate::callback::EntryConsumer;
use crate::config::{ConsumerConfig, EntryErrorPolicy};
use crate::cursor::{Cursor, CursorStore};
use crate::error::{ConsumerError, ConsumerResult};
use crate::source::FeedSource;
use pagefeed_codec::Codec;
use pagefeed_protocol::{FeedPage, LinkRel, PageRef};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Seeks allowed within one poll before it yields.
const MAX_SEEKS_PER_POLL: usize = 8;

/// Granularity at which sleeps notice a stop request.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(20);

/// The current state of a feed consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting to start or between polls.
    Idle,
    /// Requesting a page from the source.
    FetchingPage,
    /// Waiting before retrying a failed fetch.
    RetryWait,
    /// Delivering entries to the callback.
    ProcessingEntries,
    /// Saving the cursor.
    AdvancingCursor,
    /// Stopped on request or after an entry error.
    Stopped,
    /// Gave up; needs a reset.
    Failed,
}

impl ConsumerState {
    /// Returns true while a poll is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConsumerState::FetchingPage
                | ConsumerState::RetryWait
                | ConsumerState::ProcessingEntries
                | ConsumerState::AdvancingCursor
        )
    }

    /// Returns true for `Stopped` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsumerState::Stopped | ConsumerState::Failed)
    }

    /// Returns true if a new poll may start.
    pub fn can_start_poll(&self) -> bool {
        matches!(self, ConsumerState::Idle)
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Statistics about a consumer.
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    /// Polls started.
    pub polls: u64,
    /// Pages whose entries were processed.
    pub pages_visited: u64,
    /// Entries delivered to the callback successfully.
    pub entries_delivered: u64,
    /// Entries skipped as already processed.
    pub entries_skipped: u64,
    /// Fetch retries after transient failures.
    pub retries: u64,
    /// Jumps to the page holding the next expected position.
    pub seeks: u64,
    /// When the last poll finished.
    pub last_poll: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Last page fetched.
    pub page: PageRef,
    /// Entries delivered.
    pub delivered: usize,
    /// Entries skipped as already processed.
    pub skipped: usize,
    /// Page the next poll will fetch.
    pub next_page: u64,
    /// True if the head page was processed.
    pub caught_up: bool,
    /// True if the consumer stopped at the end of this poll.
    pub stopped: bool,
}

impl PollOutcome {
    fn empty(page: PageRef, next_page: u64) -> Self {
        Self {
            page,
            delivered: 0,
            skipped: 0,
            next_page,
            caught_up: false,
            stopped: false,
        }
    }
}

/// Page that holds the next expected position, if `page` starts after it.
///
/// Page indices count back from the newest entry, so they drift as the feed
/// grows. The newest position on a page and its index give the feed length
/// at fetch time, from which the right page follows.
fn seek_target<T>(page: &FeedPage<T>, cursor: &Cursor) -> Option<u64> {
    let next = cursor.next_position().value();
    let oldest = page.oldest_position()?.value();
    if oldest <= next {
        return None;
    }
    let newest = page.newest_position()?.value();
    let size = page.page.size as u64;
    let feed_last = newest + page.page.index * size;
    (feed_last - next).checked_div(size)
}

/// Polls a feed and delivers its entries, in order, to a callback.
///
/// On first start the consumer replays the archive from the oldest page
/// toward the head, then keeps polling the head. Progress is saved to the
/// cursor store after every page, so a restarted consumer resumes where the
/// last saved cursor points and skips what it already processed.
///
/// Type parameters: `T` payload, `F` page source, `S` cursor store,
/// `C` payload codec, `E` entry callback.
pub struct FeedConsumer<T, F, S, C, E> {
    config: ConsumerConfig,
    source: F,
    cursors: S,
    codec: C,
    consumer: E,
    state: RwLock<ConsumerState>,
    stats: RwLock<ConsumerStats>,
    /// Last saved cursor, plus the page to poll next.
    cursor: Mutex<Option<Cursor>>,
    stop_requested: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F, S, C, E> FeedConsumer<T, F, S, C, E>
where
    F: FeedSource,
    S: CursorStore,
    C: Codec<T>,
    E: EntryConsumer<T>,
{
    /// Creates a consumer. The cursor is loaded on the first poll.
    pub fn new(config: ConsumerConfig, source: F, cursors: S, codec: C, consumer: E) -> Self {
        Self {
            config,
            source,
            cursors,
            codec,
            consumer,
            state: RwLock::new(ConsumerState::Idle),
            stats: RwLock::new(ConsumerStats::default()),
            cursor: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// Returns the consumer configuration.
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Returns the page source.
    pub fn source(&self) -> &F {
        &self.source
    }

    /// Gets the current state.
    pub fn state(&self) -> ConsumerState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> ConsumerStats {
        self.stats.read().clone()
    }

    /// Returns the current cursor, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor store cannot be read.
    pub fn cursor(&self) -> ConsumerResult<Cursor> {
        let mut cached = self.cursor.lock();
        if let Some(cursor) = cached.as_ref() {
            return Ok(cursor.clone());
        }

        let cursor = self
            .cursors
            .load(&self.config.consumer_id)?
            .unwrap_or_else(|| Cursor::new(self.config.consumer_id.clone()));
        debug!(
            consumer = %self.config.consumer_id,
            last_processed = ?cursor.last_processed,
            page_index = cursor.page_index,
            "loaded cursor"
        );
        *cached = Some(cursor.clone());
        Ok(cursor)
    }

    /// Requests a graceful stop.
    ///
    /// An idle consumer stops at once. A polling consumer finishes the page
    /// it is delivering, saves its cursor, then stops.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let mut state = self.state.write();
        if *state == ConsumerState::Idle {
            *state = ConsumerState::Stopped;
            info!(consumer = %self.config.consumer_id, "consumer stopped");
        }
    }

    /// Returns true if a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Returns a stopped or failed consumer to `Idle`.
    ///
    /// The cursor is reloaded from the store on the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidStateTransition`] while a poll is in
    /// progress.
    pub fn reset(&self) -> ConsumerResult<()> {
        let mut state = self.state.write();
        if state.is_active() {
            return Err(ConsumerError::InvalidStateTransition {
                from: state.to_string(),
                to: ConsumerState::Idle.to_string(),
            });
        }

        let from = *state;
        *state = ConsumerState::Idle;
        self.stop_requested.store(false, Ordering::SeqCst);
        *self.cursor.lock() = None;
        info!(consumer = %self.config.consumer_id, %from, "consumer reset");
        Ok(())
    }

    /// Runs one poll cycle: fetch a page, deliver its new entries, save the
    /// cursor.
    ///
    /// # Errors
    ///
    /// - [`ConsumerError::Stopped`] if the consumer is stopped
    /// - [`ConsumerError::ConsumerFailed`] if the retry budget ran out, or
    ///   the consumer already failed
    /// - [`ConsumerError::InvalidStateTransition`] if another poll is running
    /// - [`ConsumerError::InvalidConfig`] if the configuration is invalid;
    ///   the consumer moves to `Failed`
    /// - an entry error if the callback or codec failed; entries before it
    ///   were delivered and recorded
    pub fn poll_once(&self) -> ConsumerResult<PollOutcome> {
        self.begin_poll()?;
        self.stats.write().polls += 1;

        let result = self.config.validate().and_then(|()| self.poll_cycle());
        self.stats.write().last_poll = Some(Instant::now());

        match result {
            Ok(mut outcome) => {
                self.stats.write().last_error = None;
                if self.is_stop_requested() {
                    outcome.stopped = true;
                    self.set_state(ConsumerState::Stopped);
                    info!(consumer = %self.config.consumer_id, "consumer stopped");
                } else {
                    self.set_state(ConsumerState::Idle);
                }
                Ok(outcome)
            }
            Err(e) => Err(self.fail_poll(e)),
        }
    }

    /// Polls until the head page has been processed.
    ///
    /// Returns the number of entries delivered.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`poll_once`](Self::poll_once).
    pub fn run_until_caught_up(&self) -> ConsumerResult<u64> {
        let mut delivered = 0u64;
        loop {
            let outcome = self.poll_once()?;
            delivered += outcome.delivered as u64;
            if outcome.caught_up || outcome.stopped {
                info!(consumer = %self.config.consumer_id, delivered, "caught up");
                return Ok(delivered);
            }
        }
    }

    /// Polls until stopped.
    ///
    /// Catch-up pages are fetched back to back; once caught up the head is
    /// polled every `poll_interval`. Failures that leave the consumer idle
    /// are logged and retried after `poll_interval`.
    ///
    /// # Errors
    ///
    /// Returns the error that moved the consumer to `Failed`, or the entry
    /// error that stopped it under [`EntryErrorPolicy::Stop`].
    pub fn run(&self) -> ConsumerResult<()> {
        info!(consumer = %self.config.consumer_id, "consumer running");
        loop {
            match self.poll_once() {
                Ok(outcome) if outcome.stopped => return Ok(()),
                Ok(outcome) if outcome.caught_up => {
                    self.sleep_unless_stopped(self.config.poll_interval);
                }
                Ok(_) => {}
                Err(ConsumerError::Stopped) => return Ok(()),
                Err(e) if self.state() == ConsumerState::Idle => {
                    warn!(
                        consumer = %self.config.consumer_id,
                        error = %e,
                        "poll failed, retrying after poll interval"
                    );
                    self.sleep_unless_stopped(self.config.poll_interval);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn set_state(&self, state: ConsumerState) {
        *self.state.write() = state;
    }

    /// Moves `Idle` to `FetchingPage` atomically.
    fn begin_poll(&self) -> ConsumerResult<()> {
        let mut state = self.state.write();
        match *state {
            ConsumerState::Idle if self.is_stop_requested() => {
                *state = ConsumerState::Stopped;
                Err(ConsumerError::Stopped)
            }
            ConsumerState::Idle => {
                *state = ConsumerState::FetchingPage;
                Ok(())
            }
            ConsumerState::Stopped => Err(ConsumerError::Stopped),
            ConsumerState::Failed => Err(ConsumerError::ConsumerFailed {
                reason: "consumer has failed and must be reset".into(),
            }),
            other => Err(ConsumerError::InvalidStateTransition {
                from: other.to_string(),
                to: ConsumerState::FetchingPage.to_string(),
            }),
        }
    }

    /// Records a failed poll and picks the state it leaves the consumer in.
    fn fail_poll(&self, error: ConsumerError) -> ConsumerError {
        self.stats.write().last_error = Some(error.to_string());

        let next = match &error {
            ConsumerError::Stopped => ConsumerState::Stopped,
            e if e.is_entry_error() => match self.config.entry_error_policy {
                EntryErrorPolicy::Stop => ConsumerState::Stopped,
                EntryErrorPolicy::RetryNextPoll if self.is_stop_requested() => {
                    ConsumerState::Stopped
                }
                EntryErrorPolicy::RetryNextPoll => ConsumerState::Idle,
            },
            ConsumerError::CursorStore(_)
            | ConsumerError::Io(_)
            | ConsumerError::Serialization(_) => {
                if self.is_stop_requested() {
                    ConsumerState::Stopped
                } else {
                    ConsumerState::Idle
                }
            }
            _ => ConsumerState::Failed,
        };

        match next {
            ConsumerState::Failed => {
                warn!(consumer = %self.config.consumer_id, error = %error, "consumer failed");
            }
            ConsumerState::Stopped => {
                info!(consumer = %self.config.consumer_id, error = %error, "consumer stopped");
            }
            _ => {
                warn!(consumer = %self.config.consumer_id, error = %error, "poll failed");
            }
        }
        self.set_state(next);
        error
    }

    fn poll_cycle(&self) -> ConsumerResult<PollOutcome> {
        let mut cursor = self.cursor()?;
        let size = self.config.page_size;
        let mut page_ref = PageRef::new(cursor.page_index, size);
        let mut seeks = 0;

        let page = loop {
            let page = match self.fetch_with_retry(page_ref) {
                Ok(page) => page,
                Err(ConsumerError::NotFound(missing)) if missing.is_head() => {
                    debug!(consumer = %self.config.consumer_id, "head page not found");
                    let mut outcome = PollOutcome::empty(missing, 0);
                    outcome.caught_up = true;
                    return Ok(outcome);
                }
                Err(ConsumerError::NotFound(missing)) => {
                    return Err(ConsumerError::ArchiveNotFound(missing));
                }
                Err(e) => return Err(e),
            };

            if page.page != page_ref {
                return Err(ConsumerError::InvalidPage(format!(
                    "requested {page_ref}, received {}",
                    page.page
                )));
            }

            match seek_target(&page, &cursor) {
                Some(target) if target != page_ref.index => {
                    cursor.page_index = target;
                    if seeks == MAX_SEEKS_PER_POLL {
                        *self.cursor.lock() = Some(cursor);
                        return Ok(PollOutcome::empty(page_ref, target));
                    }
                    seeks += 1;
                    self.stats.write().seeks += 1;
                    debug!(
                        consumer = %self.config.consumer_id,
                        from = page_ref.index,
                        to = target,
                        next = %cursor.next_position(),
                        "seeking to page with next expected position"
                    );
                    page_ref = PageRef::new(target, size);
                }
                Some(_) => {
                    warn!(
                        consumer = %self.config.consumer_id,
                        page = %page_ref,
                        expected = %cursor.next_position(),
                        "positions missing before this page"
                    );
                    break page;
                }
                None => break page,
            }
        };

        self.process_page(page, cursor)
    }

    fn fetch_with_retry(&self, page: PageRef) -> ConsumerResult<FeedPage<Vec<u8>>> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            self.set_state(ConsumerState::FetchingPage);
            match self.source.fetch_page(page) {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    attempt += 1;
                    self.stats.write().retries += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        consumer = %self.config.consumer_id,
                        page = %page,
                        attempt,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "page fetch failed, retrying"
                    );

                    self.set_state(ConsumerState::RetryWait);
                    if !self.sleep_unless_stopped(delay) {
                        return Err(ConsumerError::Stopped);
                    }
                }
                Err(e) if e.is_retryable() => {
                    return Err(ConsumerError::ConsumerFailed {
                        reason: format!(
                            "page {page} failed {} times, last error: {e}",
                            attempt + 1
                        ),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn process_page(
        &self,
        page: FeedPage<Vec<u8>>,
        mut cursor: Cursor,
    ) -> ConsumerResult<PollOutcome> {
        self.set_state(ConsumerState::ProcessingEntries);

        let page_ref = page.page;
        let next_hop = page.page_ref(LinkRel::Next).map(|p| p.index);
        let mut delivered = 0usize;
        let mut skipped = 0usize;
        let mut failure = None;

        for entry in page.entries.into_iter().rev() {
            let Some(position) = entry.position else {
                failure = Some(ConsumerError::InvalidPage(format!(
                    "entry {} on page {page_ref} has no position",
                    entry.id
                )));
                break;
            };
            if cursor.has_processed(position) {
                skipped += 1;
                continue;
            }

            let decoded = match entry.try_map_content(|bytes| self.codec.decode(&bytes)) {
                Ok(decoded) => decoded,
                Err(source) => {
                    failure = Some(ConsumerError::Codec { position, source });
                    break;
                }
            };
            if let Err(source) = self.consumer.apply(decoded) {
                failure = Some(ConsumerError::Callback { position, source });
                break;
            }

            cursor.last_processed = Some(position);
            delivered += 1;
        }

        cursor.page_index = match (&failure, page_ref.index) {
            (Some(_), index) | (None, index @ 0) => index,
            (None, index) => next_hop.unwrap_or(index - 1),
        };

        self.set_state(ConsumerState::AdvancingCursor);
        self.save_cursor(cursor.clone())?;

        {
            let mut stats = self.stats.write();
            stats.entries_delivered += delivered as u64;
            stats.entries_skipped += skipped as u64;
            if failure.is_none() {
                stats.pages_visited += 1;
            }
        }

        debug!(
            consumer = %self.config.consumer_id,
            page = %page_ref,
            delivered,
            skipped,
            next_page = cursor.page_index,
            "page processed"
        );

        if let Some(e) = failure {
            return Err(e);
        }

        Ok(PollOutcome {
            page: page_ref,
            delivered,
            skipped,
            next_page: cursor.page_index,
            caught_up: page_ref.is_head(),
            stopped: false,
        })
    }

    /// Saves the cursor if it changed; the cached copy follows only a
    /// successful save.
    fn save_cursor(&self, cursor: Cursor) -> ConsumerResult<()> {
        let mut cached = self.cursor.lock();
        if cached.as_ref() == Some(&cursor) {
            return Ok(());
        }
        self.cursors.save(&cursor)?;
        *cached = Some(cursor);
        Ok(())
    }

    /// Sleeps for `duration`; returns false early if a stop is requested.
    fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stop_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
        }
    }
}
