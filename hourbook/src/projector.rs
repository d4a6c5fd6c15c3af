//! Live totals recomputed from snapshot + overlay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{DailySnapshot, MetricField, TimeShifter};
use crate::overlay::EditOverlay;
use crate::window::DisplayWindow;

/// Which hours feed the on-screen totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TotalsScope {
    /// Every record in the snapshot, whether shown or not.
    #[default]
    FullDay,
    /// Only records inside the display window.
    Window,
}

pub type ProjectedTotals = BTreeMap<MetricField, f64>;

/// Sums every summed field of the snapshot's screen, preferring numeric overlay values.
///
/// A cleared overlay value falls back to the record's original; a missing original counts as zero.
pub fn project(
    snapshot: &DailySnapshot,
    overlay: &EditOverlay,
    shifter: &TimeShifter,
    scope: TotalsScope,
    window: &DisplayWindow,
) -> ProjectedTotals {
    let mut totals: ProjectedTotals = snapshot
        .screen()
        .summed_fields()
        .map(|field| (field, 0.0))
        .collect();

    for record in snapshot.records() {
        let hour = shifter.to_display(record.hour);
        if scope == TotalsScope::Window && !window.contains(hour) {
            continue;
        }
        for (field, total) in totals.iter_mut() {
            let value = overlay
                .value(hour, *field)
                .and_then(|v| v.as_number())
                .or_else(|| record.value(*field))
                .unwrap_or(0.0);
            *total += value;
        }
    }

    totals
}
