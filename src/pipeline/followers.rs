// src/pipeline/followers.rs

//! Follower harvesting pipeline.

use std::path::PathBuf;

use chrono::Utc;

use crate::config::Credentials;
use crate::error::Result;
use crate::models::{Config, Platform};
use crate::pipeline::{Backoff, DriverOutcome, DriverSettings, PaginationDriver};
use crate::services::{InstagramSession, InstagramSource, PageSource, TiktokSource, TwitterSource};
use crate::sink::{CsvFileSink, InspectSink, RowSink};
use crate::storage::{CheckpointStore, LocalCheckpointStore};
use crate::utils::http;

/// Where flushed batches go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Append rows to a CSV file
    File(PathBuf),
    /// Print field names only
    Inspect,
}

/// One `<platform> followers <user_id>` invocation.
#[derive(Debug, Clone)]
pub struct FollowersRequest {
    pub platform: Platform,
    pub user_id: String,
    pub output: OutputMode,
    /// Resume from the saved cursor
    pub load_cursor: bool,
}

/// Run the follower harvester.
///
/// Setup failures (credentials, configuration, checkpoint writes during
/// session setup) are returned; everything after setup is retried by the
/// driver until the listing is exhausted.
pub async fn run_followers(
    config: &Config,
    credentials: &Credentials,
    request: &FollowersRequest,
) -> Result<DriverOutcome> {
    let start_time = Utc::now();
    let store = LocalCheckpointStore::new(&config.session.file);
    let mut state = store.load().await;
    let client = http::create_client(&config.http)?;

    let mut source: Box<dyn PageSource> = match request.platform {
        Platform::Instagram => {
            let (session, changed) =
                InstagramSession::establish(&mut state, credentials.instagram_session.clone())?;
            if changed {
                store.save(&state).await?;
            }
            Box::new(InstagramSource::new(
                client,
                &config.instagram,
                session,
                &request.user_id,
            )?)
        }
        Platform::Twitter => Box::new(TwitterSource::new(
            client,
            &config.twitter,
            credentials.require(Platform::Twitter)?,
            &request.user_id,
        )?),
        Platform::Tiktok => Box::new(TiktokSource::new(
            client,
            &config.tiktok,
            credentials.require(Platform::Tiktok)?,
            &request.user_id,
        )?),
    };

    let mut sink: Box<dyn RowSink> = match &request.output {
        OutputMode::File(path) => {
            log::info!("Writing followers to {}", path.display());
            Box::new(CsvFileSink::new(path))
        }
        OutputMode::Inspect => Box::new(InspectSink::new()),
    };

    if request.load_cursor && state.cursor(request.platform).is_none() {
        log::warn!(
            "No saved {} cursor found, starting from the beginning",
            request.platform
        );
    }

    let settings = DriverSettings::from_config(config, request.platform, request.load_cursor);
    let outcome = PaginationDriver::new(
        source.as_mut(),
        sink.as_mut(),
        &store,
        settings,
        Backoff::from_config(&config.backoff),
    )
    .run(state)
    .await;

    let elapsed = Utc::now() - start_time;
    log::info!(
        "{} followers of {}: {} pages, {} rows, {} flushes, {} cooldowns in {}s",
        request.platform,
        request.user_id,
        outcome.pages,
        outcome.rows_written,
        outcome.flushes,
        outcome.cooldowns.len(),
        elapsed.num_seconds()
    );
    Ok(outcome)
}
