//! The refresh cycle: fetch, parse, publish a snapshot.
//!
//! One orchestrator owns the "last known good" state for a meter. Each cycle
//! runs fetch → parse to completion and swaps the snapshot in atomically; a
//! failing cycle leaves the previous snapshot visible (stale but available)
//! and reports the reason to the scheduling loop, which owns retry timing.

use crate::error::{Error, FeedError};
use crate::model::Snapshot;
use crate::portal;
use chrono::Local;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a refresh cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Parsing,
    Ready,
    Failed,
}

pub struct Orchestrator {
    portal: Arc<portal::Client>,
    window_days: i64,
    state: RwLock<RefreshState>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl Orchestrator {
    pub fn new(portal: Arc<portal::Client>, window_days: i64) -> Self {
        Self {
            portal,
            window_days,
            state: RwLock::new(RefreshState::Idle),
            snapshot: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> RefreshState {
        *self.state.read().await
    }

    /// The current snapshot, if any cycle has ever succeeded.
    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Runs one full cycle. On success the new snapshot replaces the old one
    /// wholesale; on failure the old one stands.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, Error> {
        match self.run_cycle().await {
            Ok(snapshot) => {
                *self.snapshot.write().await = Some(Arc::clone(&snapshot));
                self.set_state(RefreshState::Ready).await;
                tracing::info!(
                    date = %snapshot.latest.date,
                    rows = snapshot.history.len(),
                    columns = ?snapshot.mapping,
                    "refresh complete"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.set_state(RefreshState::Failed).await;
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<Arc<Snapshot>, Error> {
        // pinned once per cycle: gap-fill bounds must not move if parsing or
        // reconciliation crosses midnight
        let fetched_at = Local::now();

        self.set_state(RefreshState::Fetching).await;
        let raw = self.portal.fetch_window(fetched_at, self.window_days).await?;

        self.set_state(RefreshState::Parsing).await;
        let (mapping, readings) = portal::feed::parse_feed(&raw)?;
        let snapshot = Snapshot::from_history(fetched_at, mapping, readings)
            .ok_or(FeedError::NoUsableRows)?;
        Ok(Arc::new(snapshot))
    }

    /// One fetch-and-parse cycle with nothing published, for validating
    /// credentials at setup time. Auth failures are distinguishable from
    /// every other failure via [`Error::is_auth`].
    pub async fn validate_credentials(&self) -> Result<(), Error> {
        let raw = self
            .portal
            .fetch_window(Local::now(), self.window_days)
            .await?;
        portal::feed::parse_feed(&raw)?;
        Ok(())
    }

    async fn set_state(&self, state: RefreshState) {
        *self.state.write().await = state;
    }
}
