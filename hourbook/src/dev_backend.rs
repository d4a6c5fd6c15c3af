//! In-memory analytics backend for `--dev` runs and tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::domain::{
    DailySnapshot, FieldKind, HourlyRecord, MetricField, RecordId, Screen, ScopeFilter,
    StorageHour,
};
use crate::ports::{AnalyticsBackend, BackendError, RecordPatch};

/// Rows are shared by every date; the dev data has no calendar.
#[derive(Debug, Clone, Default)]
pub struct DevBackend {
    store: Arc<Mutex<DevState>>,
}

#[derive(Debug, Default)]
struct DevState {
    rows: Vec<DevRow>,
    fail_fetches: bool,
    failing_ids: HashSet<RecordId>,
    sent: Vec<(Screen, RecordId, RecordPatch)>,
}

#[derive(Debug, Clone)]
struct DevRow {
    id: RecordId,
    screen: Screen,
    entity: String,
    hour: StorageHour,
    metrics: BTreeMap<MetricField, f64>,
}

impl DevBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(DevState {
                rows: seed_dev_rows(),
                ..DevState::default()
            })),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores every record of `snapshot` that has an id as a row of `entity`.
    pub fn seed_snapshot(&self, entity: &str, snapshot: &DailySnapshot) {
        let mut state = self.store.lock().expect("dev store lock poisoned");
        for record in snapshot.records() {
            let Some(id) = record.editable_id else {
                continue;
            };
            state.rows.retain(|row| row.id != id);
            state.rows.push(DevRow {
                id,
                screen: snapshot.screen(),
                entity: entity.to_string(),
                hour: record.hour,
                metrics: record.metrics.clone(),
            });
        }
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.store.lock().expect("dev store lock poisoned").fail_fetches = fail;
    }

    pub fn fail_updates_for(&self, id: RecordId) {
        self.store
            .lock()
            .expect("dev store lock poisoned")
            .failing_ids
            .insert(id);
    }

    pub fn clear_failures(&self) {
        let mut state = self.store.lock().expect("dev store lock poisoned");
        state.fail_fetches = false;
        state.failing_ids.clear();
    }

    /// Every update attempt so far, including rejected ones.
    pub fn sent_updates(&self) -> Vec<(Screen, RecordId, RecordPatch)> {
        self.store.lock().expect("dev store lock poisoned").sent.clone()
    }

    pub fn entities(&self, screen: Screen) -> Vec<String> {
        let state = self.store.lock().expect("dev store lock poisoned");
        entities_of(&state.rows, screen)
    }
}

fn entities_of(rows: &[DevRow], screen: Screen) -> Vec<String> {
    let mut entities: Vec<String> = rows
        .iter()
        .filter(|row| row.screen == screen)
        .map(|row| row.entity.clone())
        .collect();
    entities.sort();
    entities.dedup();
    entities
}

fn build_snapshot(
    rows: &[DevRow],
    screen: Screen,
    date: NaiveDate,
    scope: &ScopeFilter,
) -> Result<DailySnapshot, BackendError> {
    let selected: Vec<&DevRow> = rows
        .iter()
        .filter(|row| row.screen == screen)
        .filter(|row| scope.entity_id().map_or(true, |id| row.entity == id))
        .collect();

    let records = match scope {
        ScopeFilter::Entity(_) => selected
            .iter()
            .map(|row| HourlyRecord {
                hour: row.hour,
                metrics: row.metrics.clone(),
                editable_id: Some(row.id),
            })
            .collect(),
        ScopeFilter::All => aggregate_by_hour(&selected),
    };

    let mut snapshot = DailySnapshot::new(screen, date, scope.clone(), records)
        .map_err(|e| BackendError::Parse(e.to_string()))?;
    snapshot.overall_stats = overall_stats(screen, snapshot.records());
    snapshot.available_scopes = entities_of(rows, screen);
    if screen == Screen::Heatmap {
        snapshot.busiest_zone = busiest_entity(&selected, MetricField::TotalVisitors);
    }
    Ok(snapshot)
}

/// Counts are summed across entities and durations averaged; no row is addressable.
fn aggregate_by_hour(rows: &[&DevRow]) -> Vec<HourlyRecord> {
    let mut by_hour: BTreeMap<StorageHour, Vec<&DevRow>> = BTreeMap::new();
    for row in rows {
        by_hour.entry(row.hour).or_default().push(row);
    }

    by_hour
        .into_iter()
        .map(|(hour, rows)| {
            let mut record = HourlyRecord::new(hour, None);
            let fields: HashSet<MetricField> = rows
                .iter()
                .flat_map(|r| r.metrics.keys().copied())
                .collect();
            for field in fields {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r.metrics.get(&field))
                    .copied()
                    .collect();
                let sum: f64 = values.iter().sum();
                let value = match field.kind() {
                    FieldKind::Count => sum,
                    FieldKind::Duration => sum / values.len() as f64,
                };
                record.metrics.insert(field, value);
            }
            record
        })
        .collect()
}

fn overall_stats(screen: Screen, records: &[HourlyRecord]) -> BTreeMap<MetricField, f64> {
    let mut stats = BTreeMap::new();
    for field in screen.fields().iter().copied() {
        let values: Vec<f64> = records.iter().filter_map(|r| r.value(field)).collect();
        if values.is_empty() {
            continue;
        }
        let value = match (field, field.kind()) {
            (MetricField::MaxWaitTime, _) => values.iter().copied().fold(f64::MIN, f64::max),
            (MetricField::MinWaitTime, _) => values.iter().copied().fold(f64::MAX, f64::min),
            (_, FieldKind::Count) => values.iter().sum(),
            (_, FieldKind::Duration) => values.iter().sum::<f64>() / values.len() as f64,
        };
        stats.insert(field, value);
    }
    stats
}

fn busiest_entity(rows: &[&DevRow], field: MetricField) -> Option<String> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.entity.as_str()).or_default() +=
            row.metrics.get(&field).copied().unwrap_or(0.0);
    }
    totals
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(entity, _)| entity.to_string())
}

#[async_trait]
impl AnalyticsBackend for DevBackend {
    async fn fetch_daily_summary(
        &self,
        screen: Screen,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        let state = self.store.lock().expect("dev store lock poisoned");
        if state.fail_fetches {
            return Err(BackendError::Status {
                status: 500,
                message: "dev backend fetch failure".to_string(),
            });
        }
        build_snapshot(&state.rows, screen, date, scope)
    }

    async fn update_record(
        &self,
        screen: Screen,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), BackendError> {
        let mut state = self.store.lock().expect("dev store lock poisoned");
        state.sent.push((screen, id, patch.clone()));

        if state.failing_ids.contains(&id) {
            return Err(BackendError::Status {
                status: 500,
                message: format!("dev backend rejected record {id}"),
            });
        }
        if let Some((field, _)) = patch
            .iter()
            .find(|(f, _)| !screen.has_field(*f) || !f.is_editable())
        {
            return Err(BackendError::Status {
                status: 400,
                message: format!("{field} cannot be updated"),
            });
        }

        let Some(row) = state
            .rows
            .iter_mut()
            .find(|row| row.id == id && row.screen == screen)
        else {
            return Err(BackendError::Status {
                status: 404,
                message: "record not found".to_string(),
            });
        };
        for (field, value) in patch.iter() {
            row.metrics.insert(field, value);
        }
        debug!(%screen, %id, fields = patch.len(), "dev record updated");
        Ok(())
    }
}

fn seed_dev_rows() -> Vec<DevRow> {
    let entities = [
        (Screen::CustomerFlow, ["cam-1", "cam-2"]),
        (Screen::Heatmap, ["zone-entrance", "zone-checkout"]),
        (Screen::Queue, ["cashier-1", "cashier-2"]),
    ];

    let mut rows = Vec::new();
    for (screen_idx, (screen, names)) in entities.iter().enumerate() {
        for (entity_idx, entity) in names.iter().enumerate() {
            // storage 07..=19 covers display 10..=22 at the default offset
            for hour in 7u8..=19 {
                let Some(storage_hour) = StorageHour::new(hour) else {
                    continue;
                };
                let seed = f64::from(hour) + entity_idx as f64 * 3.0;
                let id = (screen_idx as i64 + 1) * 1000 + entity_idx as i64 * 100 + i64::from(hour);
                rows.push(DevRow {
                    id: RecordId::new(id),
                    screen: *screen,
                    entity: entity.to_string(),
                    hour: storage_hour,
                    metrics: seed_metrics(*screen, seed),
                });
            }
        }
    }
    rows
}

fn seed_metrics(screen: Screen, seed: f64) -> BTreeMap<MetricField, f64> {
    let busy = (seed * 7.0) % 40.0 + 5.0;
    match screen {
        Screen::CustomerFlow => BTreeMap::from([
            (MetricField::Entered, busy),
            (MetricField::Exited, (busy - 2.0).max(0.0)),
        ]),
        Screen::Heatmap => BTreeMap::from([
            (MetricField::TotalVisitors, busy * 2.0),
            (MetricField::AvgDwellTime, 30.0 + seed * 1.5),
        ]),
        Screen::Queue => BTreeMap::from([
            (MetricField::TotalCustomers, busy),
            (MetricField::AvgWaitTime, 60.0 + seed * 2.5),
            (MetricField::MinWaitTime, 10.0 + seed),
            (MetricField::MaxWaitTime, 120.0 + seed * 4.0),
        ]),
    }
}
