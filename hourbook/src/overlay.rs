//! Pending, not-yet-saved hourly edits laid over a fetched snapshot.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{DailySnapshot, DisplayHour, FieldKind, MetricField, TimeShifter};

/// A pending value for one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// The user emptied the input; not a number yet.
    Cleared,
    Number(f64),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Cleared => None,
            FieldValue::Number(n) => Some(*n),
        }
    }
}

/// Validates raw keystroke input for `field`. `None` means the input is rejected.
pub fn parse_field_input(field: MetricField, raw: &str) -> Option<FieldValue> {
    if !field.is_editable() {
        return None;
    }
    if raw.is_empty() {
        return Some(FieldValue::Cleared);
    }

    match field.kind() {
        FieldKind::Count => {
            if !raw.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // digits-only input that overflows i64 is still rejected
            raw.parse::<i64>().ok().map(|n| FieldValue::Number(n as f64))
        }
        FieldKind::Duration => {
            let dots = raw.bytes().filter(|b| *b == b'.').count();
            if dots > 1 || !raw.bytes().all(|b| b.is_ascii_digit() || b == b'.') || raw == "." {
                return None;
            }
            raw.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(FieldValue::Number)
        }
    }
}

pub type OverlayBucket = BTreeMap<MetricField, FieldValue>;

/// Sparse map of field edits keyed by display hour.
///
/// A bucket is present only while at least one of its fields differs from the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditOverlay {
    buckets: BTreeMap<DisplayHour, OverlayBucket>,
}

impl EditOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one keystroke-level edit. Returns `false` when the input is rejected,
    /// in which case the overlay is unchanged.
    pub fn set_field(
        &mut self,
        snapshot: &DailySnapshot,
        shifter: &TimeShifter,
        hour: DisplayHour,
        field: MetricField,
        raw: &str,
    ) -> bool {
        if !snapshot.screen().has_field(field) {
            debug!(%hour, %field, "field not on this screen, ignoring input");
            return false;
        }
        let Some(value) = parse_field_input(field, raw) else {
            debug!(%hour, %field, raw, "rejected input");
            return false;
        };

        let original = snapshot
            .record(shifter.to_storage(hour))
            .and_then(|r| r.value(field));

        if original.is_some_and(|o| field.render(o) == raw) {
            self.remove_field(hour, field);
        } else {
            self.buckets.entry(hour).or_default().insert(field, value);
        }
        true
    }

    fn remove_field(&mut self, hour: DisplayHour, field: MetricField) {
        if let Some(bucket) = self.buckets.get_mut(&hour) {
            bucket.remove(&field);
            if bucket.is_empty() {
                self.buckets.remove(&hour);
            }
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    pub fn is_dirty(&self) -> bool {
        !self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket(&self, hour: DisplayHour) -> Option<&OverlayBucket> {
        self.buckets.get(&hour)
    }

    pub fn value(&self, hour: DisplayHour, field: MetricField) -> Option<FieldValue> {
        self.buckets.get(&hour).and_then(|b| b.get(&field)).copied()
    }

    pub fn buckets(&self) -> impl Iterator<Item = (DisplayHour, &OverlayBucket)> {
        self.buckets.iter().map(|(hour, bucket)| (*hour, bucket))
    }

    /// Drops the fields of `hour` that still hold exactly `sent`.
    ///
    /// Fields edited again after `sent` was captured are kept.
    pub(crate) fn settle_bucket(&mut self, hour: DisplayHour, sent: &OverlayBucket) {
        let Some(bucket) = self.buckets.get_mut(&hour) else {
            return;
        };
        bucket.retain(|field, value| sent.get(field) != Some(value));
        if bucket.is_empty() {
            self.buckets.remove(&hour);
        }
    }

    /// Re-applies the pruning invariant against a freshly fetched snapshot.
    pub fn prune_against(&mut self, snapshot: &DailySnapshot, shifter: &TimeShifter) {
        self.buckets.retain(|hour, bucket| {
            let record = snapshot.record(shifter.to_storage(*hour));
            bucket.retain(|field, value| {
                let original = record.and_then(|r| r.value(*field));
                match (original, value) {
                    (Some(o), FieldValue::Number(n)) => field.render(o) != field.render(*n),
                    _ => true,
                }
            });
            !bucket.is_empty()
        });
    }
}
