//! Outbound port to the analytics backend.
//!
//! Abstracts fetch and update calls so the engine can run against HTTP or in-memory data.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{DailySnapshot, FieldKind, MetricField, RecordId, Screen, ScopeFilter};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("request failed: {0}")]
    Request(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Partial update for one record. Only fields present here are changed server-side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch(BTreeMap<MetricField, f64>);

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: MetricField, value: f64) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: MetricField) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn contains(&self, field: MetricField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricField, f64)> + '_ {
        self.0.iter().map(|(f, v)| (*f, *v))
    }

    /// JSON body keyed by the update endpoint's field names; counts go out as integers.
    pub fn to_json(&self) -> serde_json::Value {
        let body: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(field, value)| {
                let json = match field.kind() {
                    FieldKind::Count => serde_json::Value::from(value.round() as i64),
                    FieldKind::Duration => serde_json::Value::from(*value),
                };
                (field.payload_key().to_string(), json)
            })
            .collect();
        serde_json::Value::Object(body)
    }
}

impl Serialize for RecordPatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl FromIterator<(MetricField, f64)> for RecordPatch {
    fn from_iter<I: IntoIterator<Item = (MetricField, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Analytics backend the engine reads snapshots from and writes edits to.
///
/// For the `All` scope, implementations must return records with `editable_id: None`.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    async fn fetch_daily_summary(
        &self,
        screen: Screen,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError>;

    /// Updates exactly the fields in `patch`; everything else on the record stays untouched.
    async fn update_record(
        &self,
        screen: Screen,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), BackendError>;
}

#[async_trait]
impl<T: AnalyticsBackend + ?Sized> AnalyticsBackend for std::sync::Arc<T> {
    async fn fetch_daily_summary(
        &self,
        screen: Screen,
        date: NaiveDate,
        scope: &ScopeFilter,
    ) -> Result<DailySnapshot, BackendError> {
        (**self).fetch_daily_summary(screen, date, scope).await
    }

    async fn update_record(
        &self,
        screen: Screen,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), BackendError> {
        (**self).update_record(screen, id, patch).await
    }
}
