//! Caller-facing editing session for one screen.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{
    DailySnapshot, DisplayHour, HourlyRecord, MetricField, RecordId, Role, Screen, ScopeFilter,
    StorageHour, TimeShifter,
};
use crate::error::SyncError;
use crate::gate::{self, NotEditable};
use crate::overlay::{EditOverlay, FieldValue};
use crate::ports::{AnalyticsBackend, BackendError};
use crate::projector::{self, ProjectedTotals, TotalsScope};
use crate::store::{DailySummaryStore, SnapshotKey};
use crate::sync::{self, SavePlan, SaveReport, SyncState};
use crate::window::{self, DisplayWindow};

/// Per-screen presentation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub shifter: TimeShifter,
    pub window: DisplayWindow,
    pub totals: TotalsScope,
}

impl SessionSettings {
    pub fn for_screen(screen: Screen) -> Self {
        let (start, end) = screen.default_window();
        Self {
            shifter: TimeShifter::default(),
            window: DisplayWindow::new(start, end).unwrap_or_else(|_| DisplayWindow::full_day()),
            totals: TotalsScope::FullDay,
        }
    }
}

/// One field of a row as the UI should render it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellView {
    pub field: MetricField,
    pub original: Option<f64>,
    pub pending: Option<FieldValue>,
}

impl CellView {
    /// Text for the input box: the pending value if any, else the original.
    pub fn text(&self) -> String {
        match self.pending {
            Some(FieldValue::Cleared) => String::new(),
            Some(FieldValue::Number(n)) => self.field.render(n),
            None => self
                .original
                .map(|o| self.field.render(o))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub hour: DisplayHour,
    pub storage_hour: StorageHour,
    pub editable_id: Option<RecordId>,
    pub cells: Vec<CellView>,
    pub edited: bool,
    pub editable: Result<(), NotEditable>,
}

/// Hours written by a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSummary {
    pub settled: Vec<DisplayHour>,
}

/// A save whose plan is fixed and whose requests have not been sent yet.
///
/// Holds no borrow of the session, so it can be driven from another task.
pub struct PendingSave<B: ?Sized> {
    backend: Arc<B>,
    plan: SavePlan,
}

impl<B: AnalyticsBackend + ?Sized> PendingSave<B> {
    pub fn plan(&self) -> &SavePlan {
        &self.plan
    }

    pub async fn dispatch(self) -> SaveReport {
        sync::dispatch(self.backend.as_ref(), self.plan).await
    }
}

/// Snapshot, overlay and save state for one (date, scope) viewing session.
pub struct HourlyEditSession<B: ?Sized> {
    backend: Arc<B>,
    screen: Screen,
    role: Role,
    settings: SessionSettings,
    store: DailySummaryStore,
    overlay: EditOverlay,
    saving: bool,
}

impl<B: AnalyticsBackend + ?Sized> HourlyEditSession<B> {
    pub fn new(backend: Arc<B>, screen: Screen, role: Role, settings: SessionSettings) -> Self {
        Self {
            backend,
            screen,
            role,
            settings,
            store: DailySummaryStore::new(),
            overlay: EditOverlay::new(),
            saving: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn store(&self) -> &DailySummaryStore {
        &self.store
    }

    pub fn snapshot(&self) -> Option<&DailySnapshot> {
        self.store.snapshot()
    }

    pub fn overlay(&self) -> &EditOverlay {
        &self.overlay
    }

    /// Switches to a new (date, scope): pending edits are discarded and a fresh snapshot fetched.
    #[instrument(skip(self), fields(screen = %self.screen))]
    pub async fn load(&mut self, date: NaiveDate, scope: ScopeFilter) -> Result<(), SyncError> {
        if self.saving {
            return Err(SyncError::SaveInProgress);
        }
        self.overlay.clear();
        let key = SnapshotKey {
            screen: self.screen,
            date,
            scope,
        };
        self.store.fetch(self.backend.as_ref(), key).await?;
        Ok(())
    }

    fn record_at(&self, hour: DisplayHour) -> Option<&HourlyRecord> {
        self.store
            .snapshot()
            .and_then(|s| s.record(self.settings.shifter.to_storage(hour)))
    }

    /// Whether `record` may be edited now, and why not if it may not.
    pub fn can_edit_row(&self, record: &HourlyRecord) -> Result<(), NotEditable> {
        if self.saving {
            return Err(NotEditable::SaveInProgress);
        }
        let scope = match self.store.snapshot() {
            Some(snapshot) => snapshot.scope(),
            None => return Err(NotEditable::NoBackingRecord),
        };
        gate::check(self.role, scope, record)
    }

    /// Records a keystroke-level edit.
    ///
    /// `Ok(false)` means the input itself was rejected and nothing changed.
    pub fn set_field(
        &mut self,
        hour: DisplayHour,
        field: MetricField,
        raw: &str,
    ) -> Result<bool, NotEditable> {
        if self.saving {
            return Err(NotEditable::SaveInProgress);
        }
        let record = self.record_at(hour).ok_or(NotEditable::NoBackingRecord)?;
        self.can_edit_row(record)?;

        let Some(snapshot) = self.store.snapshot() else {
            return Err(NotEditable::NoBackingRecord);
        };
        Ok(self
            .overlay
            .set_field(snapshot, &self.settings.shifter, hour, field, raw))
    }

    /// Drops every pending edit. Has no effect while a save is in flight.
    pub fn cancel(&mut self) {
        if self.saving {
            return;
        }
        self.overlay.clear();
    }

    pub fn is_dirty(&self) -> bool {
        self.overlay.is_dirty()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn state(&self) -> SyncState {
        if self.saving {
            SyncState::Saving
        } else if self.overlay.is_dirty() {
            SyncState::Dirty
        } else {
            SyncState::Clean
        }
    }

    /// Rows inside the display window, with pending values and edit permission resolved.
    pub fn display_rows(&self) -> Vec<RowView> {
        let Some(snapshot) = self.store.snapshot() else {
            return Vec::new();
        };
        window::display_rows(snapshot, &self.settings.shifter, &self.settings.window)
            .into_iter()
            .map(|row| {
                let cells = self
                    .screen
                    .fields()
                    .iter()
                    .map(|field| CellView {
                        field: *field,
                        original: row.record.value(*field),
                        pending: self.overlay.value(row.hour, *field),
                    })
                    .collect();
                RowView {
                    hour: row.hour,
                    storage_hour: row.storage_hour(),
                    editable_id: row.record.editable_id,
                    cells,
                    edited: self.overlay.bucket(row.hour).is_some(),
                    editable: self.can_edit_row(row.record),
                }
            })
            .collect()
    }

    /// Totals with pending edits applied. Empty when nothing is loaded.
    pub fn projected_totals(&self) -> ProjectedTotals {
        match self.store.snapshot() {
            Some(snapshot) => projector::project(
                snapshot,
                &self.overlay,
                &self.settings.shifter,
                self.settings.totals,
                &self.settings.window,
            ),
            None => ProjectedTotals::new(),
        }
    }

    /// Freezes the pending edits into a plan and enters `Saving`.
    pub fn begin_save(&mut self) -> Result<PendingSave<B>, SyncError> {
        if self.saving {
            return Err(SyncError::SaveInProgress);
        }
        let snapshot = self.store.snapshot().ok_or(SyncError::NotLoaded)?;
        if !self.overlay.is_dirty() {
            return Err(SyncError::NothingToSave);
        }

        let plan = sync::plan_save(snapshot, &self.overlay, &self.settings.shifter);
        info!(
            screen = %self.screen,
            requests = plan.requests.len(),
            local_failures = plan.local_failures.len(),
            "saving hourly edits"
        );
        self.saving = true;
        Ok(PendingSave {
            backend: Arc::clone(&self.backend),
            plan,
        })
    }

    /// Applies a dispatched save: settles written buckets and refetches the snapshot.
    pub async fn finish_save(&mut self, report: SaveReport) -> Result<SaveSummary, SyncError> {
        if !self.saving {
            return Err(SyncError::NotSaving);
        }
        self.saving = false;

        for (hour, sent) in &report.settled {
            self.overlay.settle_bucket(*hour, sent);
        }

        if report.is_success() {
            self.overlay.clear();
            self.store.refresh(self.backend.as_ref()).await?;
            info!(screen = %self.screen, hours = report.settled.len(), "hourly edits saved");
            return Ok(SaveSummary {
                settled: report.settled_hours(),
            });
        }

        warn!(
            screen = %self.screen,
            failed = report.failed.len(),
            "some hourly edits were not saved"
        );
        let mut refetch = None;
        if !report.settled.is_empty() {
            if let Err(err) = self.refetch_keeping_edits().await {
                warn!(error = %err, "refetch after partial save failed");
                refetch = Some(err);
            }
        }
        Err(SyncError::PartialSaveFailure {
            failed: report.failed,
            refetch,
        })
    }

    /// Refetches the current (date, scope) without discarding pending edits.
    ///
    /// Edits that now match the fresh originals are dropped; the rest stay saveable.
    pub async fn reload(&mut self) -> Result<(), SyncError> {
        if self.saving {
            return Err(SyncError::SaveInProgress);
        }
        if self.store.key().is_none() {
            return Err(SyncError::NotLoaded);
        }
        self.refetch_keeping_edits().await?;
        Ok(())
    }

    async fn refetch_keeping_edits(&mut self) -> Result<(), BackendError> {
        self.store.refresh(self.backend.as_ref()).await?;
        if let Some(snapshot) = self.store.snapshot() {
            self.overlay.prune_against(snapshot, &self.settings.shifter);
        }
        Ok(())
    }

    /// Plans, dispatches and settles in one go.
    pub async fn save(&mut self) -> Result<SaveSummary, SyncError> {
        let pending = self.begin_save()?;
        let report = pending.dispatch().await;
        self.finish_save(report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_backend::DevBackend;
    use crate::sync::BucketFailure;

    fn dh(h: u8) -> DisplayHour {
        DisplayHour::new(h).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
    }

    fn flow_snapshot(scope: ScopeFilter, backed: bool) -> DailySnapshot {
        let id = |n| backed.then(|| RecordId::new(n));
        let mut snapshot = DailySnapshot::new(
            Screen::CustomerFlow,
            date(),
            scope,
            vec![
                HourlyRecord::new(StorageHour::new(6).unwrap(), id(60))
                    .with_metric(MetricField::Entered, 2.0)
                    .with_metric(MetricField::Exited, 1.0),
                HourlyRecord::new(StorageHour::new(7).unwrap(), id(70))
                    .with_metric(MetricField::Entered, 10.0)
                    .with_metric(MetricField::Exited, 4.0),
                HourlyRecord::new(StorageHour::new(8).unwrap(), id(80))
                    .with_metric(MetricField::Entered, 5.0)
                    .with_metric(MetricField::Exited, 7.0),
            ],
        )
        .unwrap();
        snapshot.overall_stats.insert(MetricField::Entered, 17.0);
        snapshot.overall_stats.insert(MetricField::Exited, 12.0);
        snapshot
    }

    async fn admin_session(backend: &Arc<DevBackend>) -> HourlyEditSession<DevBackend> {
        let mut session = HourlyEditSession::new(
            Arc::clone(backend),
            Screen::CustomerFlow,
            Role::Admin,
            SessionSettings::for_screen(Screen::CustomerFlow),
        );
        session
            .load(date(), ScopeFilter::entity("cam-1"))
            .await
            .unwrap();
        session
    }

    fn seeded_backend() -> Arc<DevBackend> {
        let backend = DevBackend::empty();
        backend.seed_snapshot("cam-1", &flow_snapshot(ScopeFilter::entity("cam-1"), true));
        Arc::new(backend)
    }

    #[tokio::test]
    async fn edit_then_save_sends_only_changed_field_and_refetches() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        let before = session.projected_totals()[&MetricField::Entered];

        assert_eq!(session.set_field(dh(10), MetricField::Entered, "15"), Ok(true));
        assert_eq!(
            session.projected_totals()[&MetricField::Entered],
            before + 5.0
        );
        assert_eq!(session.state(), SyncState::Dirty);

        let summary = session.save().await.unwrap();
        assert_eq!(summary.settled, vec![dh(10)]);

        let sent = backend.sent_updates();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, RecordId::new(70));
        assert_eq!(sent[0].2.to_json(), serde_json::json!({ "entering": 15 }));

        assert!(!session.is_dirty());
        assert_eq!(session.state(), SyncState::Clean);
        let refreshed = session
            .snapshot()
            .and_then(|s| s.record(StorageHour::new(7).unwrap()))
            .unwrap();
        assert_eq!(refreshed.value(MetricField::Entered), Some(15.0));
        assert_eq!(refreshed.value(MetricField::Exited), Some(4.0));
    }

    #[tokio::test]
    async fn partial_failure_keeps_only_failed_bucket() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        backend.fail_updates_for(RecordId::new(70));

        session.set_field(dh(10), MetricField::Entered, "15").unwrap();
        session.set_field(dh(11), MetricField::Exited, "9").unwrap();

        let err = session.save().await.unwrap_err();
        let SyncError::PartialSaveFailure { failed, refetch } = err else {
            panic!("expected partial failure, got {err:?}");
        };
        assert!(refetch.is_none());
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].hour, dh(10));
        assert!(matches!(failed[0].reason, BucketFailure::Remote(_)));

        assert!(session.overlay().bucket(dh(10)).is_some());
        assert!(session.overlay().bucket(dh(11)).is_none());
        assert_eq!(session.state(), SyncState::Dirty);

        // the succeeded bucket now shows the persisted value
        let rows = session.display_rows();
        let row = rows.iter().find(|r| r.hour == dh(11)).unwrap();
        assert_eq!(row.cells[1].original, Some(9.0));
        assert!(!row.edited);

        // retry after the backend recovers
        backend.clear_failures();
        session.save().await.unwrap();
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn cancel_clears_without_network() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;

        assert_eq!(session.set_field(dh(11), MetricField::Exited, "1"), Ok(true));
        assert!(session.is_dirty());
        session.cancel();

        assert!(!session.is_dirty());
        assert!(backend.sent_updates().is_empty());
        assert_eq!(session.projected_totals()[&MetricField::Exited], 12.0);
    }

    #[tokio::test]
    async fn second_save_is_refused_while_first_is_in_flight() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.set_field(dh(10), MetricField::Entered, "11").unwrap();

        let pending = session.begin_save().unwrap();
        assert!(session.is_saving());
        assert!(matches!(session.begin_save(), Err(SyncError::SaveInProgress)));
        assert_eq!(
            session.set_field(dh(11), MetricField::Entered, "1"),
            Err(NotEditable::SaveInProgress)
        );
        assert!(matches!(
            session.load(date(), ScopeFilter::All).await,
            Err(SyncError::SaveInProgress)
        ));

        // cancel does not touch an in-flight save
        session.cancel();
        assert!(session.is_dirty());

        let report = pending.dispatch().await;
        session.finish_save(report).await.unwrap();
        assert!(!session.is_saving());
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn save_without_edits_is_refused() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        assert!(matches!(session.save().await, Err(SyncError::NothingToSave)));
        assert!(!session.is_saving());
    }

    #[tokio::test]
    async fn switching_scope_discards_edits() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.set_field(dh(10), MetricField::Entered, "99").unwrap();

        session.load(date(), ScopeFilter::All).await.unwrap();
        assert!(!session.is_dirty());
        assert!(session.snapshot().unwrap().scope().is_aggregate());
    }

    #[tokio::test]
    async fn aggregate_scope_rows_explain_why_they_are_locked() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.load(date(), ScopeFilter::All).await.unwrap();

        let rows = session.display_rows();
        assert!(!rows.is_empty());
        assert!(rows
            .iter()
            .all(|r| r.editable == Err(NotEditable::AggregateScope)));
        assert_eq!(
            session.set_field(dh(10), MetricField::Entered, "1"),
            Err(NotEditable::AggregateScope)
        );
    }

    #[tokio::test]
    async fn non_admin_cannot_edit() {
        let backend = seeded_backend();
        let mut session = HourlyEditSession::new(
            Arc::clone(&backend),
            Screen::CustomerFlow,
            Role::User,
            SessionSettings::for_screen(Screen::CustomerFlow),
        );
        session
            .load(date(), ScopeFilter::entity("cam-1"))
            .await
            .unwrap();

        assert_eq!(
            session.set_field(dh(10), MetricField::Entered, "1"),
            Err(NotEditable::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn invalid_keystroke_leaves_state_unchanged() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        assert_eq!(session.set_field(dh(10), MetricField::Entered, "1x"), Ok(false));
        assert_eq!(session.state(), SyncState::Clean);
    }

    #[tokio::test]
    async fn display_rows_follow_window_and_show_pending_text() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.set_field(dh(10), MetricField::Entered, "").unwrap();

        let rows = session.display_rows();
        // storage 06 shifts to 09, outside the flow window
        assert_eq!(
            rows.iter().map(|r| r.hour.get()).collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert!(rows[0].edited);
        assert_eq!(rows[0].cells[0].text(), "");
        assert_eq!(rows[0].cells[1].text(), "4");
        assert_eq!(rows[0].editable, Ok(()));

        // full-day totals still include the hidden 09 row
        assert_eq!(session.projected_totals()[&MetricField::Entered], 17.0);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_no_stale_rows() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        backend.fail_fetches(true);

        let err = session
            .load(date(), ScopeFilter::entity("cam-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::FetchFailure(BackendError::Status { .. })));
        assert!(session.display_rows().is_empty());
        assert!(session.projected_totals().is_empty());
    }

    #[tokio::test]
    async fn refetch_failure_after_save_is_reported() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.set_field(dh(10), MetricField::Entered, "12").unwrap();

        let pending = session.begin_save().unwrap();
        let report = pending.dispatch().await;
        backend.fail_fetches(true);

        let err = session.finish_save(report).await.unwrap_err();
        assert!(matches!(err, SyncError::FetchFailure(_)));
        assert!(!session.is_dirty());
        assert!(session.snapshot().is_none());
    }

    #[tokio::test]
    async fn failed_reload_after_partial_save_keeps_failed_edits_saveable() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        backend.fail_updates_for(RecordId::new(70));

        session.set_field(dh(10), MetricField::Entered, "15").unwrap();
        session.set_field(dh(11), MetricField::Exited, "9").unwrap();

        let pending = session.begin_save().unwrap();
        let report = pending.dispatch().await;
        backend.fail_fetches(true);

        let err = session.finish_save(report).await.unwrap_err();
        let SyncError::PartialSaveFailure { failed, refetch } = err else {
            panic!("expected partial failure, got {err:?}");
        };
        assert_eq!(failed[0].hour, dh(10));
        assert!(matches!(refetch, Some(BackendError::Status { .. })));
        assert!(session.snapshot().is_none());
        assert!(session.overlay().bucket(dh(10)).is_some());
        assert!(session.overlay().bucket(dh(11)).is_none());

        backend.clear_failures();
        session.reload().await.unwrap();
        assert!(session.overlay().bucket(dh(10)).is_some());
        let rows = session.display_rows();
        let row = rows.iter().find(|r| r.hour == dh(11)).unwrap();
        assert_eq!(row.cells[1].original, Some(9.0));

        let summary = session.save().await.unwrap();
        assert_eq!(summary.settled, vec![dh(10)]);
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn reload_keeps_edits_that_still_differ() {
        let backend = seeded_backend();
        let mut session = admin_session(&backend).await;
        session.set_field(dh(10), MetricField::Entered, "15").unwrap();

        session.reload().await.unwrap();
        assert_eq!(
            session.overlay().value(dh(10), MetricField::Entered),
            Some(FieldValue::Number(15.0))
        );
        assert!(backend.sent_updates().is_empty());
    }

    #[tokio::test]
    async fn reload_before_load_is_refused() {
        let backend = seeded_backend();
        let mut session = HourlyEditSession::new(
            backend,
            Screen::CustomerFlow,
            Role::Admin,
            SessionSettings::for_screen(Screen::CustomerFlow),
        );
        assert!(matches!(session.reload().await, Err(SyncError::NotLoaded)));
    }
}
