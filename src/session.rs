use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::ingest;
use crate::store;

const DEFAULT_POLL_SECS: u64 = 5;
// Stop-flag granularity while waiting out the inter-poll delay.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub db_path: PathBuf,
    pub match_id: String,
    pub season: String,
    pub poll_interval: Duration,
}

impl SessionConfig {
    pub fn new(db_path: PathBuf, match_id: String, season: String) -> Self {
        Self {
            db_path,
            match_id,
            season,
            poll_interval: poll_interval_from_env(),
        }
    }
}

pub fn poll_interval_from_env() -> Duration {
    Duration::from_secs(
        std::env::var("PITCHSIDE_POLL_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_SECS)
            .max(1),
    )
}

/// One live-tracking run: owns the stop flag and the poll-thread handle.
/// The poll thread holds its own store connection; nothing here is ambient
/// process state, so dropping the session tears the loop down.
pub struct TrackingSession {
    config: SessionConfig,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TrackingSession {
    /// Clear any prior tracked state, run one synchronous poll (so an
    /// unreachable feed is reported immediately instead of silently looping),
    /// then start the recurring poll thread.
    pub fn start(config: SessionConfig) -> Result<TrackingSession> {
        let mut conn = store::open_db(&config.db_path)?;
        store::clear_all(&conn)?;
        ingest::poll_once(&mut conn, &config.match_id, &config.season)
            .context("initial ingest failed")?;
        drop(conn);

        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_poll_loop(config.clone(), stop.clone())?;
        info!(
            match_id = %config.match_id,
            interval_secs = config.poll_interval.as_secs(),
            "live tracking started"
        );
        Ok(TrackingSession {
            config,
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the loop, wait for it to observe the flag, then clear the
    /// store. The join guarantees the clear never overlaps an in-flight poll
    /// transaction.
    pub fn stop(mut self) -> Result<()> {
        self.signal_and_join();
        let conn = store::open_db(&self.config.db_path)?;
        store::clear_all(&conn)?;
        info!(match_id = %self.config.match_id, "live tracking stopped");
        Ok(())
    }

    fn signal_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("poll thread panicked");
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}

fn spawn_poll_loop(config: SessionConfig, stop: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("pitchside-poll".to_string())
        .spawn(move || run_poll_loop(config, stop))
        .context("spawn poll thread")
}

fn run_poll_loop(config: SessionConfig, stop: Arc<AtomicBool>) {
    let mut conn = match store::open_db(&config.db_path) {
        Ok(conn) => conn,
        Err(err) => {
            error!("poll loop could not open store: {err:#}");
            return;
        }
    };

    loop {
        // Cancellation is observed only here, between polls; an in-flight
        // poll always runs to its commit or rollback.
        if wait_or_stop(&stop, config.poll_interval) {
            break;
        }
        if let Err(err) = ingest::poll_once(&mut conn, &config.match_id, &config.season) {
            warn!(match_id = %config.match_id, "poll cycle failed: {err:#}");
        }
    }
    info!(match_id = %config.match_id, "poll loop exited");
}

/// Sleep out `interval` in small slices, returning true as soon as the stop
/// flag is raised.
fn wait_or_stop(stop: &AtomicBool, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
