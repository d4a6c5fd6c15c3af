use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::{DailySnapshot, Screen, ScopeFilter};
use crate::ports::{AnalyticsBackend, BackendError};

/// What a snapshot was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKey {
    pub screen: Screen,
    pub date: NaiveDate,
    pub scope: ScopeFilter,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum StoreState {
    #[default]
    Empty,
    Loaded(DailySnapshot),
    /// The last fetch failed. No stale data is kept around.
    Failed(BackendError),
}

/// Holds the last authoritative snapshot for one (date, scope).
#[derive(Debug, Clone, Default)]
pub struct DailySummaryStore {
    key: Option<SnapshotKey>,
    state: StoreState,
}

impl DailySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&SnapshotKey> {
        self.key.as_ref()
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&DailySnapshot> {
        match &self.state {
            StoreState::Loaded(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BackendError> {
        match &self.state {
            StoreState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Fetches `key` and replaces the held state wholesale with the outcome.
    pub async fn fetch<B>(&mut self, backend: &B, key: SnapshotKey) -> Result<(), BackendError>
    where
        B: AnalyticsBackend + ?Sized,
    {
        let result = backend
            .fetch_daily_summary(key.screen, key.date, &key.scope)
            .await;

        let outcome = match result {
            Ok(snapshot) => {
                info!(
                    screen = %key.screen,
                    date = %key.date,
                    scope = %key.scope,
                    records = snapshot.records().len(),
                    "loaded daily summary"
                );
                self.state = StoreState::Loaded(snapshot);
                Ok(())
            }
            Err(err) => {
                warn!(
                    screen = %key.screen,
                    date = %key.date,
                    scope = %key.scope,
                    error = %err,
                    "failed to load daily summary"
                );
                self.state = StoreState::Failed(err.clone());
                Err(err)
            }
        };
        self.key = Some(key);
        outcome
    }

    /// Re-fetches whatever was last requested.
    pub async fn refresh<B>(&mut self, backend: &B) -> Result<(), BackendError>
    where
        B: AnalyticsBackend + ?Sized,
    {
        let Some(key) = self.key.clone() else {
            return Err(BackendError::other("nothing has been loaded yet"));
        };
        self.fetch(backend, key).await
    }
}
