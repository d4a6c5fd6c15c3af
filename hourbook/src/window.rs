//! Selection and ordering of the hours shown on screen.

use thiserror::Error;

use crate::domain::{DailySnapshot, DisplayHour, HourlyRecord, StorageHour, TimeShifter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("display window start {start} is after its end {end}")]
    Inverted { start: DisplayHour, end: DisplayHour },
}

/// Inclusive business-hour window, expressed in display hours.
///
/// Storage-hour bounds are always derived through a [`TimeShifter`], never configured separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    start: DisplayHour,
    end: DisplayHour,
}

impl DisplayWindow {
    pub fn new(start: DisplayHour, end: DisplayHour) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// The whole day.
    pub fn full_day() -> Self {
        Self {
            start: DisplayHour::MIN,
            end: DisplayHour::MAX,
        }
    }

    pub fn start(&self) -> DisplayHour {
        self.start
    }

    pub fn end(&self) -> DisplayHour {
        self.end
    }

    pub fn contains(&self, hour: DisplayHour) -> bool {
        self.start <= hour && hour <= self.end
    }

    /// Storage hours that land inside the window, ascending by display hour.
    pub fn storage_hours(&self, shifter: &TimeShifter) -> Vec<StorageHour> {
        DisplayHour::all()
            .filter(|h| self.contains(*h))
            .map(|h| shifter.to_storage(h))
            .collect()
    }
}

/// A snapshot record projected onto its display hour. The snapshot itself is untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRow<'a> {
    pub hour: DisplayHour,
    pub record: &'a HourlyRecord,
}

impl DisplayRow<'_> {
    pub fn storage_hour(&self) -> StorageHour {
        self.record.hour
    }
}

/// Records whose shifted hour falls inside `window`, sorted by display hour.
///
/// Recomputed from scratch on every call.
pub fn display_rows<'a>(
    snapshot: &'a DailySnapshot,
    shifter: &TimeShifter,
    window: &DisplayWindow,
) -> Vec<DisplayRow<'a>> {
    let mut rows: Vec<DisplayRow<'a>> = snapshot
        .records()
        .iter()
        .map(|record| DisplayRow {
            hour: shifter.to_display(record.hour),
            record,
        })
        .filter(|row| window.contains(row.hour))
        .collect();
    rows.sort_by_key(|row| row.hour);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricField, RecordId, Screen, ScopeFilter};
    use chrono::NaiveDate;

    fn dh(h: u8) -> DisplayHour {
        DisplayHour::new(h).unwrap()
    }

    fn full_day_snapshot() -> DailySnapshot {
        let records = StorageHour::all()
            .map(|h| {
                HourlyRecord::new(h, Some(RecordId::new(i64::from(h.get()) + 100)))
                    .with_metric(MetricField::Entered, f64::from(h.get()))
            })
            .collect();
        DailySnapshot::new(
            Screen::CustomerFlow,
            NaiveDate::from_ymd_opt(2024, 5, 14).unwrap(),
            ScopeFilter::entity("cam-1"),
            records,
        )
        .unwrap()
    }

    #[test]
    fn keeps_only_window_hours_in_display_order() {
        let snapshot = full_day_snapshot();
        let window = DisplayWindow::new(dh(10), dh(22)).unwrap();
        let rows = display_rows(&snapshot, &TimeShifter::new(3), &window);

        let hours: Vec<u8> = rows.iter().map(|r| r.hour.get()).collect();
        assert_eq!(hours, (10..=22).collect::<Vec<_>>());
        assert_eq!(rows[0].storage_hour().get(), 7);
        assert_eq!(rows.last().unwrap().storage_hour().get(), 19);
    }

    #[test]
    fn hour_shifted_to_nine_is_excluded_but_stays_in_snapshot() {
        let snapshot = full_day_snapshot();
        let window = DisplayWindow::new(dh(10), dh(22)).unwrap();
        let rows = display_rows(&snapshot, &TimeShifter::new(3), &window);

        assert!(rows.iter().all(|r| r.hour != dh(9)));
        assert!(snapshot.record(StorageHour::new(6).unwrap()).is_some());
    }

    #[test]
    fn sorts_by_display_hour_across_midnight() {
        let snapshot = full_day_snapshot();
        let rows = display_rows(&snapshot, &TimeShifter::new(3), &DisplayWindow::full_day());

        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].hour, dh(0));
        assert_eq!(rows[0].storage_hour().get(), 21);
        assert!(rows.windows(2).all(|w| w[0].hour < w[1].hour));
    }

    #[test]
    fn shifted_hours_are_unique_keys() {
        let snapshot = full_day_snapshot();
        for offset in -26..=26 {
            let rows = display_rows(&snapshot, &TimeShifter::new(offset), &DisplayWindow::full_day());
            let mut hours: Vec<_> = rows.iter().map(|r| r.hour).collect();
            hours.dedup();
            assert_eq!(hours.len(), 24, "offset {offset}");
        }
    }

    #[test]
    fn storage_bounds_follow_the_offset() {
        let window = DisplayWindow::new(dh(10), dh(21)).unwrap();
        let storage = window.storage_hours(&TimeShifter::new(3));
        assert_eq!(storage.first().map(|h| h.get()), Some(7));
        assert_eq!(storage.last().map(|h| h.get()), Some(18));

        let storage = window.storage_hours(&TimeShifter::new(2));
        assert_eq!(storage.first().map(|h| h.get()), Some(8));
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(DisplayWindow::new(dh(22), dh(10)).is_err());
    }
}
