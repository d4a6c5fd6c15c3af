use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

use super::hour::StorageHour;
use super::metric::{MetricField, Screen};
use super::scope::ScopeFilter;

/// Identifier of the persisted row behind an hourly bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Metrics of one storage-hour bucket for one day and scope.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    pub hour: StorageHour,
    pub metrics: BTreeMap<MetricField, f64>,
    /// `None` when the bucket is an aggregate of several rows and cannot be edited directly.
    pub editable_id: Option<RecordId>,
}

impl HourlyRecord {
    pub fn new(hour: StorageHour, editable_id: Option<RecordId>) -> Self {
        Self {
            hour,
            metrics: BTreeMap::new(),
            editable_id,
        }
    }

    pub fn with_metric(mut self, field: MetricField, value: f64) -> Self {
        self.metrics.insert(field, value);
        self
    }

    pub fn value(&self, field: MetricField) -> Option<f64> {
        self.metrics.get(&field).copied()
    }
}

/// Period-over-period delta. `change_percent` is `None` when there was no valid baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonStat {
    pub period: String,
    pub change_percent: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("duplicate hour {0} in daily summary")]
    DuplicateHour(StorageHour),
    #[error("field {field} does not belong to the {screen} screen")]
    ForeignField { screen: Screen, field: MetricField },
}

/// Authoritative hourly records for one (date, scope), replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySnapshot {
    screen: Screen,
    date: NaiveDate,
    scope: ScopeFilter,
    records: Vec<HourlyRecord>,
    pub overall_stats: BTreeMap<MetricField, f64>,
    pub comparison_stats: BTreeMap<MetricField, Vec<ComparisonStat>>,
    /// Entities selectable as a scope on this day.
    pub available_scopes: Vec<String>,
    /// Heatmap only: label of the zone with the most visitors.
    pub busiest_zone: Option<String>,
}

impl DailySnapshot {
    /// Builds a snapshot, rejecting duplicate hours and fields that belong to another screen.
    pub fn new(
        screen: Screen,
        date: NaiveDate,
        scope: ScopeFilter,
        mut records: Vec<HourlyRecord>,
    ) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.hour) {
                return Err(SnapshotError::DuplicateHour(record.hour));
            }
            if let Some(field) = record.metrics.keys().find(|f| !screen.has_field(**f)) {
                return Err(SnapshotError::ForeignField {
                    screen,
                    field: *field,
                });
            }
        }
        records.sort_by_key(|r| r.hour);

        Ok(Self {
            screen,
            date,
            scope,
            records,
            overall_stats: BTreeMap::new(),
            comparison_stats: BTreeMap::new(),
            available_scopes: Vec::new(),
            busiest_zone: None,
        })
    }

    pub fn empty(screen: Screen, date: NaiveDate, scope: ScopeFilter) -> Self {
        Self {
            screen,
            date,
            scope,
            records: Vec::new(),
            overall_stats: BTreeMap::new(),
            comparison_stats: BTreeMap::new(),
            available_scopes: Vec::new(),
            busiest_zone: None,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn scope(&self) -> &ScopeFilter {
        &self.scope
    }

    /// Records ordered by storage hour.
    pub fn records(&self) -> &[HourlyRecord] {
        &self.records
    }

    pub fn record(&self, hour: StorageHour) -> Option<&HourlyRecord> {
        self.records
            .binary_search_by_key(&hour, |r| r.hour)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
