// src/pipeline/driver.rs

//! Pagination driver.
//!
//! Drives one page source to exhaustion:
//!
//! ```text
//! Fetching ──► Accumulating ──► Flushing ──► Done
//!    ▲              │               │
//!    └──────────────┘◄──────────────┘
//!    ▲
//!    └── CoolingDown ◄── (any error while fetching or flushing)
//! ```
//!
//! A flush writes the batch to the sink and only then commits the cursor,
//! so a crash between the two re-fetches the batch instead of losing it.
//! After a failure the driver sleeps, lengthens the next cooldown and
//! resumes from the last committed cursor. Retries are unbounded.

use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::mapping::{aggregate_field_names, extend_field_names};
use crate::models::{BackoffConfig, CheckpointState, Config, Cursor, FollowerRecord, Page, Platform};
use crate::services::PageSource;
use crate::sink::RowSink;
use crate::storage::CheckpointStore;
use crate::utils::pause;

/// Cooldown applied after consecutive failures.
///
/// Grows by a fixed step on every failure and is never reset during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    cooldown_minutes: u64,
    step_minutes: u64,
}

impl Backoff {
    pub fn new(initial_minutes: u64, step_minutes: u64) -> Self {
        Self {
            cooldown_minutes: initial_minutes,
            step_minutes,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial_minutes, config.step_minutes)
    }

    pub fn cooldown_minutes(&self) -> u64 {
        self.cooldown_minutes
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes.saturating_mul(60))
    }

    pub fn advance(&mut self) {
        self.cooldown_minutes = self.cooldown_minutes.saturating_add(self.step_minutes);
    }
}

/// Tunables for one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    /// Pages accumulated before a flush
    pub pages_per_flush: usize,
    /// Pause between fetches
    pub page_delay: Duration,
    /// Start from the checkpointed cursor instead of the stream start
    pub resume: bool,
}

impl DriverSettings {
    pub fn from_config(config: &Config, platform: Platform, resume: bool) -> Self {
        let pacing = config.pacing(platform);
        Self {
            pages_per_flush: pacing.pages_per_flush,
            page_delay: pacing.page_delay,
            resume,
        }
    }
}

/// Driver state machine.
#[derive(Debug)]
enum DriverState {
    Fetching,
    Accumulating(Page),
    Flushing,
    CoolingDown(AppError),
    Done,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct DriverOutcome {
    /// State after the last successful commit
    pub checkpoint: CheckpointState,
    pub pages: usize,
    pub rows_written: usize,
    pub flushes: usize,
    /// Cooldowns slept, in minutes, in order
    pub cooldowns: Vec<u64>,
}

/// Drives a page source into a row sink, checkpointing after every flush.
pub struct PaginationDriver<'a> {
    source: &'a mut dyn PageSource,
    sink: &'a mut dyn RowSink,
    store: &'a dyn CheckpointStore,
    settings: DriverSettings,
    backoff: Backoff,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        source: &'a mut dyn PageSource,
        sink: &'a mut dyn RowSink,
        store: &'a dyn CheckpointStore,
        settings: DriverSettings,
        backoff: Backoff,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            settings,
            backoff,
        }
    }

    /// Run until the source is exhausted.
    ///
    /// Errors never escape: every failure is absorbed by a cooldown.
    pub async fn run(mut self, mut state: CheckpointState) -> DriverOutcome {
        let platform = self.source.platform();
        let durable = self.sink.is_durable();
        let pages_per_flush = self.settings.pages_per_flush.max(1);

        let mut committed = if self.settings.resume {
            state.cursor(platform)
        } else {
            None
        };
        match &committed {
            Some(cursor) => log::info!("Resuming {} followers from {}", platform, cursor),
            None => log::info!("Scraping {} followers from the start", platform),
        }

        let mut cursor = committed.clone();
        let mut batch: Vec<FollowerRecord> = Vec::new();
        let mut pages_in_batch = 0;
        let mut exhausted = false;

        let mut pages = 0;
        let mut rows_written = 0;
        let mut flushes = 0;
        let mut cooldowns = Vec::new();

        let mut current = DriverState::Fetching;
        loop {
            current = match current {
                DriverState::Fetching => match self.source.fetch_page(cursor.as_ref()).await {
                    Ok(page) => DriverState::Accumulating(page),
                    Err(e) => DriverState::CoolingDown(e),
                },

                DriverState::Accumulating(page) => {
                    pages += 1;
                    pages_in_batch += 1;
                    exhausted = page.is_last();
                    log::info!(
                        "Scraping page:\t{} ({} followers, {})",
                        pages,
                        page.records.len(),
                        page.next
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "no next cursor".to_string())
                    );

                    if let Some(next) = page.next {
                        cursor = Some(next);
                    }
                    batch.extend(page.records);

                    if exhausted || pages_in_batch >= pages_per_flush {
                        DriverState::Flushing
                    } else {
                        pause(self.settings.page_delay).await;
                        DriverState::Fetching
                    }
                }

                DriverState::Flushing => {
                    match self.flush(&mut batch, cursor.as_ref(), &mut state).await {
                        Ok(written) => {
                            rows_written += written;
                            flushes += 1;
                            pages_in_batch = 0;
                            if durable {
                                committed = cursor.clone();
                            }
                            if exhausted || !durable {
                                DriverState::Done
                            } else {
                                pause(self.settings.page_delay).await;
                                DriverState::Fetching
                            }
                        }
                        Err(e) => DriverState::CoolingDown(e),
                    }
                }

                DriverState::CoolingDown(error) => {
                    let minutes = self.backoff.cooldown_minutes();
                    log::warn!("{} error ({:?}): {}", platform, error.kind(), error);
                    log::warn!("Timed out. Sleeping for {} minutes...", minutes);
                    pause(self.backoff.cooldown()).await;
                    cooldowns.push(minutes);
                    self.backoff.advance();

                    if !batch.is_empty() {
                        log::warn!("Discarding {} unflushed followers", batch.len());
                    }
                    batch.clear();
                    pages_in_batch = 0;
                    exhausted = false;
                    cursor = committed.clone();
                    self.source.restart();
                    DriverState::Fetching
                }

                DriverState::Done => break,
            };
        }

        if durable {
            log::info!("Finished {} scraping. Stopping...", platform);
        }
        DriverOutcome {
            checkpoint: state,
            pages,
            rows_written,
            flushes,
            cooldowns,
        }
    }

    /// Enrich, write, then commit. The cursor is committed only after the
    /// sink accepted the batch.
    async fn flush(
        &mut self,
        batch: &mut Vec<FollowerRecord>,
        cursor: Option<&Cursor>,
        state: &mut CheckpointState,
    ) -> Result<usize> {
        let durable = self.sink.is_durable();

        if durable {
            self.source.enrich(batch.as_mut_slice()).await?;
        }
        let mut fields = aggregate_field_names(batch.iter());
        if durable {
            extend_field_names(&mut fields, self.source.detail_fields());
        }

        let written = self.sink.write_batch(&fields, batch).await?;
        batch.clear();

        if durable {
            if let Some(cursor) = cursor {
                self.commit(state, cursor).await?;
            }
        }
        Ok(written)
    }

    async fn commit(&self, state: &mut CheckpointState, cursor: &Cursor) -> Result<()> {
        let mut next = state.clone();
        next.set_cursor(self.source.platform(), cursor)?;
        next.updated_at = Some(Utc::now());
        self.store.save(&next).await?;
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FollowerRecord;
    use crate::sink::{CsvFileSink, InspectSink};
    use crate::storage::LocalCheckpointStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Write(usize),
        WriteFailed,
        Commit(Option<Cursor>),
    }

    type Events = Arc<Mutex<Vec<Event>>>;

    /// Source replaying scripted responses in call order.
    struct ScriptedSource {
        responses: VecDeque<Result<Page>>,
        requested: Vec<Option<Cursor>>,
        restarts: usize,
        enriched: usize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Page>>) -> Self {
            Self {
                responses: responses.into(),
                requested: Vec::new(),
                restarts: 0,
                enriched: 0,
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        fn platform(&self) -> Platform {
            Platform::Tiktok
        }

        async fn fetch_page(&mut self, cursor: Option<&Cursor>) -> Result<Page> {
            self.requested.push(cursor.cloned());
            self.responses
                .pop_front()
                .expect("no scripted response left")
        }

        async fn enrich(&mut self, records: &mut [FollowerRecord]) -> Result<()> {
            for record in records.iter_mut() {
                record.insert("follower_count", 7);
                self.enriched += 1;
            }
            Ok(())
        }

        fn detail_fields(&self) -> &'static [&'static str] {
            &["follower_count", "following_count"]
        }

        fn restart(&mut self) {
            self.restarts += 1;
        }
    }

    /// Sink wrapper that logs writes and can fail a number of times first.
    struct RecordingSink<K: RowSink> {
        inner: K,
        events: Events,
        failures_left: usize,
    }

    #[async_trait]
    impl<K: RowSink> RowSink for RecordingSink<K> {
        async fn write_batch(&mut self, fields: &[String], records: &[FollowerRecord]) -> Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                self.events.lock().unwrap().push(Event::WriteFailed);
                return Err(AppError::Io(std::io::Error::other("disk full")));
            }
            let written = self.inner.write_batch(fields, records).await?;
            self.events.lock().unwrap().push(Event::Write(records.len()));
            Ok(written)
        }

        fn is_durable(&self) -> bool {
            self.inner.is_durable()
        }
    }

    /// Store wrapper that logs commits.
    struct RecordingStore {
        inner: LocalCheckpointStore,
        events: Events,
    }

    #[async_trait]
    impl CheckpointStore for RecordingStore {
        async fn load(&self) -> CheckpointState {
            self.inner.load().await
        }

        async fn save(&self, state: &CheckpointState) -> Result<()> {
            self.inner.save(state).await?;
            self.events
                .lock()
                .unwrap()
                .push(Event::Commit(state.cursor(Platform::Tiktok)));
            Ok(())
        }
    }

    struct Harness {
        _tmp: TempDir,
        output: std::path::PathBuf,
        events: Events,
        sink: RecordingSink<CsvFileSink>,
        store: RecordingStore,
    }

    fn harness(sink_failures: usize) -> Harness {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("followers.csv");
        let events: Events = Arc::default();
        Harness {
            sink: RecordingSink {
                inner: CsvFileSink::new(&output),
                events: Arc::clone(&events),
                failures_left: sink_failures,
            },
            store: RecordingStore {
                inner: LocalCheckpointStore::new(tmp.path().join("session-data.tmp")),
                events: Arc::clone(&events),
            },
            output,
            events,
            _tmp: tmp,
        }
    }

    fn page(ids: &[u32], next: Option<i64>, has_more: bool) -> Result<Page> {
        Ok(Page {
            records: ids
                .iter()
                .map(|id| serde_json::from_value(json!({"uid": id.to_string(), "unique_id": format!("user{}", id)})).unwrap())
                .collect(),
            next: next.map(Cursor::Timestamp),
            has_more,
        })
    }

    fn transient() -> Result<Page> {
        Err(AppError::RateLimited {
            platform: "tiktok".into(),
        })
    }

    fn settings(pages_per_flush: usize) -> DriverSettings {
        DriverSettings {
            pages_per_flush,
            page_delay: Duration::from_secs(1),
            resume: false,
        }
    }

    fn ts(value: i64) -> Option<Cursor> {
        Some(Cursor::Timestamp(value))
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_pages_flushed_in_order() {
        let mut h = harness(0);
        let mut source = ScriptedSource::new(vec![
            page(&[1, 2, 3], Some(100), true),
            page(&[4, 5, 6], Some(50), false),
        ]);

        let start = tokio::time::Instant::now();
        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(1),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        assert_eq!(
            *h.events.lock().unwrap(),
            [
                Event::Write(3),
                Event::Commit(ts(100)),
                Event::Write(3),
                Event::Commit(ts(50)),
            ]
        );
        assert_eq!(source.requested, [None, ts(100)]);
        // One page delay between the two fetches, none after the last page.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.rows_written, 6);
        assert_eq!(outcome.flushes, 2);
        assert!(outcome.cooldowns.is_empty());
        assert_eq!(outcome.checkpoint.cursor(Platform::Tiktok), ts(50));

        let content = std::fs::read_to_string(&h.output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "uid,unique_id,follower_count,following_count");
        assert_eq!(lines[1], "1,user1,7,");
        assert_eq!(lines.iter().filter(|l| l.starts_with("uid,")).count(), 1);

        let persisted = h.store.load().await;
        assert_eq!(persisted.cursor(Platform::Tiktok), ts(50));
        assert!(persisted.updated_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_previous_checkpoint() {
        let mut h = harness(1);
        let mut source = ScriptedSource::new(vec![
            page(&[1, 2, 3], Some(100), true),
            page(&[1, 2, 3], Some(100), true),
            page(&[4], Some(50), false),
        ]);

        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(1),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        assert_eq!(
            *h.events.lock().unwrap(),
            [
                Event::WriteFailed,
                Event::Write(3),
                Event::Commit(ts(100)),
                Event::Write(1),
                Event::Commit(ts(50)),
            ]
        );
        assert_eq!(source.requested, [None, None, ts(100)]);
        assert_eq!(outcome.cooldowns, [60]);
        assert_eq!(source.restarts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumes_from_committed_not_in_memory_cursor() {
        let mut h = harness(0);
        let mut source = ScriptedSource::new(vec![
            page(&[1], Some(400), true),
            page(&[2], Some(300), true),
            page(&[3], Some(200), true),
            transient(),
            page(&[3], Some(200), true),
            page(&[4], Some(100), false),
        ]);

        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(2),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        // Page 3 advanced the in-memory cursor to 200, but only 300 was committed.
        assert_eq!(
            source.requested,
            [None, ts(400), ts(300), ts(200), ts(300), ts(200)]
        );
        assert_eq!(
            *h.events.lock().unwrap(),
            [
                Event::Write(2),
                Event::Commit(ts(300)),
                Event::Write(2),
                Event::Commit(ts(100)),
            ]
        );
        assert_eq!(outcome.cooldowns, [60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_grows_each_failure() {
        let mut h = harness(0);
        let mut source = ScriptedSource::new(vec![
            transient(),
            transient(),
            transient(),
            page(&[1], Some(10), false),
        ]);

        let start = tokio::time::Instant::now();
        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(1),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        assert_eq!(outcome.cooldowns, [60, 120, 180]);
        assert!(start.elapsed() >= Duration::from_secs((60 + 120 + 180) * 60));
        assert_eq!(outcome.rows_written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_not_reset_by_success() {
        let mut h = harness(0);
        let mut source = ScriptedSource::new(vec![
            transient(),
            page(&[1], Some(30), true),
            transient(),
            page(&[2], Some(20), false),
        ]);

        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(1),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        assert_eq!(outcome.cooldowns, [60, 120]);
        assert_eq!(source.requested, [None, None, ts(30), ts(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_batch_flushed_at_end() {
        let mut h = harness(0);
        let mut source = ScriptedSource::new(vec![
            page(&[1, 2], Some(20), true),
            page(&[3], None, true),
        ]);

        let start = tokio::time::Instant::now();
        let outcome = PaginationDriver::new(
            &mut source,
            &mut h.sink,
            &h.store,
            settings(5),
            Backoff::new(60, 60),
        )
        .run(CheckpointState::default())
        .await;

        assert_eq!(outcome.flushes, 1);
        assert_eq!(outcome.rows_written, 3);
        assert_eq!(source.enriched, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(
            *h.events.lock().unwrap(),
            [Event::Write(3), Event::Commit(ts(20))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_uses_checkpointed_cursor() {
        let mut h = harness(0);
        let mut state = CheckpointState::default();
        state.set_cursor(Platform::Tiktok, &Cursor::Timestamp(77)).unwrap();

        let mut source = ScriptedSource::new(vec![page(&[1], Some(70), false)]);
        let resume = DriverSettings {
            resume: true,
            ..settings(1)
        };
        PaginationDriver::new(&mut source, &mut h.sink, &h.store, resume, Backoff::new(60, 60))
            .run(state.clone())
            .await;
        assert_eq!(source.requested, [ts(77)]);

        let mut fresh = ScriptedSource::new(vec![page(&[1], Some(70), false)]);
        PaginationDriver::new(&mut fresh, &mut h.sink, &h.store, settings(1), Backoff::new(60, 60))
            .run(state)
            .await;
        assert_eq!(fresh.requested, [None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inspect_never_writes_or_commits() {
        for ids in [&[][..], &[1, 2, 3][..]] {
            let h = harness(0);
            let mut sink = InspectSink::new();
            let mut source = ScriptedSource::new(vec![page(ids, Some(5), true)]);

            let outcome = PaginationDriver::new(
                &mut source,
                &mut sink,
                &h.store,
                settings(1),
                Backoff::new(60, 60),
            )
            .run(CheckpointState::default())
            .await;

            assert_eq!(outcome.rows_written, 0);
            assert_eq!(outcome.flushes, 1);
            assert_eq!(source.enriched, 0);
            assert_eq!(sink.printed().len(), 1);
            assert!(h.events.lock().unwrap().is_empty());
            assert!(!h.output.exists());
        }
    }

    #[test]
    fn test_backoff_steps() {
        let mut backoff = Backoff::new(60, 60);
        assert_eq!(backoff.cooldown(), Duration::from_secs(3600));
        backoff.advance();
        backoff.advance();
        assert_eq!(backoff.cooldown_minutes(), 180);
    }
}
