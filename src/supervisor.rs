//! Top-level control loop.
//!
//! Acquire a master connection, reconcile once with a full rsync, then run
//! the watch/aggregate/plan/execute cycle until the session is lost, and
//! start over after a fixed delay. The loop has no terminal success state;
//! only an operator interrupt ends it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use crate::changes::ChangePool;
use crate::config::SyncConfig;
use crate::session::SshSession;
use crate::transfer::SyncExecutor;
use crate::watcher::{EventWatcher, WatchEvent, WatchPoll, POLL_WINDOW};

/// Wall-clock spacing of master-connection liveness probes, checked
/// opportunistically from the poll loop.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Fixed pause between supervisor cycles.
pub const RESTART_DELAY: Duration = Duration::from_secs(3);

/// One-shot cancellation signal shared with the interrupt handler.
///
/// The handler only sets it; the supervisor observes it at poll points and
/// runs the same teardown it uses for any other cycle end.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a watch cycle ended.
enum CycleEnd {
    SessionLost,
    WatcherClosed,
    Shutdown,
}

pub struct Supervisor {
    config: Arc<SyncConfig>,
    executor: SyncExecutor,
    shutdown: ShutdownFlag,
}

impl Supervisor {
    pub fn new(config: SyncConfig, shutdown: ShutdownFlag) -> Self {
        let config = Arc::new(config);
        Self {
            executor: SyncExecutor::new(config.clone()),
            config,
            shutdown,
        }
    }

    /// Run until an interrupt is observed. Transient failures of any kind
    /// restart the cycle after [`RESTART_DELAY`]; they never propagate.
    pub async fn run(self) -> Result<()> {
        while !self.shutdown.is_requested() {
            let mut session = SshSession::new(&self.config);

            match session.open().await {
                Ok(true) => match self.watch_cycle(&mut session).await {
                    Ok(CycleEnd::SessionLost) => info!("restarting master connection"),
                    Ok(CycleEnd::WatcherClosed) => warn!("filesystem monitor ended"),
                    Ok(CycleEnd::Shutdown) => {}
                    Err(err) => warn!("watch cycle failed: {:#}", err),
                },
                Ok(false) => {}
                Err(err) => warn!("could not open master connection: {:#}", err),
            }

            session.close().await;

            if self.shutdown.is_requested() {
                break;
            }
            info!("restarting ...");
            tokio::time::sleep(RESTART_DELAY).await;
        }

        info!("shutting down ...");
        Ok(())
    }

    /// One watch cycle against a live session: baseline resync, then poll
    /// the event stream, aggregating changes and flushing on idle windows,
    /// with periodic liveness probes of the master connection.
    async fn watch_cycle(&self, session: &mut SshSession) -> Result<CycleEnd> {
        info!("doing initial rsync ...");
        self.executor.full_resync().await;

        let mut watcher = EventWatcher::spawn(&self.config.local_dir)?;
        info!("started filesystem monitor");

        let mut pool = ChangePool::new(&self.config.local_dir, self.config.exclude.clone());
        let mut last_health_check = Instant::now();

        let end = loop {
            if self.shutdown.is_requested() {
                break CycleEnd::Shutdown;
            }

            if last_health_check.elapsed() >= HEALTH_CHECK_INTERVAL {
                if !session.is_alive() {
                    break CycleEnd::SessionLost;
                }
                last_health_check = Instant::now();
            }

            match watcher.poll(POLL_WINDOW).await {
                WatchPoll::Line(line) => {
                    if let Some(event) = WatchEvent::parse(&line) {
                        pool.accept(&event);
                    }
                }
                WatchPoll::Idle => {
                    if !pool.is_empty() {
                        self.executor.sync_batch(pool.take()).await;
                    }
                }
                WatchPoll::Closed => break CycleEnd::WatcherClosed,
            }
        };

        info!("closing filesystem monitor ...");
        watcher.shutdown().await;
        Ok(end)
    }
}
